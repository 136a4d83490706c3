//! Error taxonomy.
//!
//! One `thiserror` enum per collaborator: the model service, memory, tools
//! and decision parsing. Inside an agent run all of them are recoverable and
//! become observations; [`Error`] is what a command finally reports.

use thiserror::Error;

/// Any failure a stepwise command can end with.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Decision(#[from] DecisionParseError),

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("cannot encode or decode JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Every endpoint in the fallback chain failed.
    #[error("provider unavailable at {endpoint}: {reason}")]
    Unavailable { endpoint: String, reason: String },

    /// The model service answered with a non-success status.
    #[error("model service returned HTTP {status_code}: {message}")]
    ApiError { status_code: u16, message: String },

    #[error("model '{0}' is not available on the model service")]
    ModelNotFound(String),

    #[error("unexpected model service reply: {0}")]
    MalformedResponse(String),

    #[error("model service is not configured: {0}")]
    NotConfigured(String),

    #[error("model service timed out: {0}")]
    Timeout(String),

    #[error("cannot reach the model service: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("memory store error: {0}")]
    Storage(String),

    #[error("memory query failed: {0}")]
    QueryFailed(String),

    #[error("cannot embed text: {0}")]
    EmbeddingFailed(String),

    #[error("schema bootstrap failed: {0}")]
    MigrationFailed(String),

    /// An embedding disagrees with the configured dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("no tool named '{0}'")]
    NotFound(String),

    #[error("{tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("{tool_name} gave no result within {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("bad tool input: {0}")]
    InvalidArguments(String),
}

impl ToolError {
    pub fn failed(tool_name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// The model's reply could not be turned into a tool call or a final answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionParseError {
    #[error("reply contained no JSON object")]
    NoJson,

    #[error("reply JSON is malformed: {0}")]
    Malformed(String),

    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("decision is missing required field '{0}'")]
    MissingField(&'static str),
}
