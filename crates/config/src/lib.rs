//! Configuration loading and validation for stepwise.
//!
//! Loads configuration from `~/.stepwise/config.toml` (or an explicit path)
//! and then applies environment variable overrides. The result is validated
//! once at startup and passed by reference into every component; nothing
//! below the CLI reads the environment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.stepwise/config.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model service (chat + embeddings)
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Memory backend selection
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Chunking and retrieval
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Web search tool
    #[serde(default)]
    pub search: SearchConfig,

    /// ETL tool
    #[serde(default)]
    pub etl: EtlConfig,

    /// External MCP servers
    #[serde(default)]
    pub mcp: McpConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("agent", &self.agent)
            .field("memory", &self.memory)
            .field("retrieval", &self.retrieval)
            .field("search", &self.search)
            .field("etl", &self.etl)
            .field("mcp", &self.mcp)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the model service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_embed_model")]
    pub embed_model: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Bearer token for hosted OpenAI-compatible endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_chat_model() -> String {
    "llama3.1:8b".into()
}
fn default_embed_model() -> String {
    "nomic-embed-text".into()
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            embed_model: default_embed_model(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("embed_model", &self.embed_model)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Step budget per run
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Observations longer than this are truncated before entering the conversation
    #[serde(default = "default_observation_chars")]
    pub observation_chars: usize,
}

fn default_max_steps() -> usize {
    8
}
fn default_temperature() -> f32 {
    0.2
}
fn default_observation_chars() -> usize {
    1500
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            temperature: default_temperature(),
            observation_chars: default_observation_chars(),
        }
    }
}

/// Which memory backend to construct at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBackendKind {
    /// In-process substring store (nothing persisted)
    InMemory,
    /// SQLite file with embeddings ranked in-process
    #[default]
    Sqlite,
    /// PostgreSQL with pgvector
    Postgres,
}

impl std::str::FromStr for MemoryBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(Self::InMemory),
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" | "pgvector" => Ok(Self::Postgres),
            other => Err(ConfigError::ValidationError(format!(
                "unknown memory backend '{other}' (expected in_memory, sqlite or postgres)"
            ))),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub backend: MemoryBackendKind,

    /// SQLite file path or `sqlite:` URL (`sqlite::memory:` for tests)
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,

    /// PostgreSQL connection string (required for the postgres backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Record table name
    #[serde(default = "default_table")]
    pub table: String,

    /// Embedding dimension; every stored and queried vector must match it
    #[serde(default = "default_embed_dim")]
    pub embed_dim: usize,
}

fn default_sqlite_path() -> String {
    AppConfig::config_dir()
        .join("memory.sqlite")
        .to_string_lossy()
        .into_owned()
}
fn default_table() -> String {
    "docs".into()
}
fn default_embed_dim() -> usize {
    768
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: MemoryBackendKind::default(),
            sqlite_path: default_sqlite_path(),
            database_url: None,
            table: default_table(),
            embed_dim: default_embed_dim(),
        }
    }
}

impl std::fmt::Debug for MemoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConfig")
            .field("backend", &self.backend)
            .field("sqlite_path", &self.sqlite_path)
            .field("database_url", &redact(&self.database_url))
            .field("table", &self.table)
            .field("embed_dim", &self.embed_dim)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Window size in words
    #[serde(default = "default_chunk_words")]
    pub chunk_words: usize,

    /// Words shared by adjacent windows
    #[serde(default = "default_overlap_words")]
    pub overlap_words: usize,

    /// Glob patterns for `ingest`
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,

    /// Default result count for `show` and `ask`
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_chunk_words() -> usize {
    800
}
fn default_overlap_words() -> usize {
    150
}
fn default_patterns() -> Vec<String> {
    vec!["**/*.md".into(), "**/*.txt".into()]
}
fn default_top_k() -> usize {
    6
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_words: default_chunk_words(),
            overlap_words: default_overlap_words(),
            patterns: default_patterns(),
            top_k: default_top_k(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Results per query
    #[serde(default = "default_search_num")]
    pub num: usize,
}

fn default_search_endpoint() -> String {
    "https://google.serper.dev/search".into()
}
fn default_search_num() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key: None,
            num: default_search_num(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &redact(&self.api_key))
            .field("num", &self.num)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Where `etl` writes when no output path is given
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    /// Server used when a call names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
}

/// One MCP server: either an HTTP façade (`url`) or a stdio child (`command`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl AppConfig {
    /// Load configuration from `path`, or from `STEPWISE_CONFIG`, or from
    /// `~/.stepwise/config.toml`, then apply environment overrides:
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `OLLAMA_BASE_URL` | `provider.base_url` |
    /// | `MODEL` | `provider.chat_model` |
    /// | `EMBED_MODEL` | `provider.embed_model` |
    /// | `AGENT_MAX_STEPS` / `MAX_STEPS` | `agent.max_steps` |
    /// | `TEMPERATURE` | `agent.temperature` |
    /// | `MEMORY_BACKEND` | `memory.backend` |
    /// | `AGENT_EMBED_DIM` | `memory.embed_dim` |
    /// | `AGENT_DB_URL` | `memory.database_url` (or `sqlite_path` for `sqlite:` URLs) |
    /// | `SERPER_API_KEY` | `search.api_key` |
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => std::env::var("STEPWISE_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| Self::config_dir().join("config.toml")),
        };
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse `path` without environment overrides. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::ReadError {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };

        let config: Self = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OLLAMA_BASE_URL") {
            self.provider.base_url = v;
        }
        if let Some(v) = get("MODEL") {
            self.provider.chat_model = v;
        }
        if let Some(v) = get("EMBED_MODEL") {
            self.provider.embed_model = v;
        }
        if let Some(v) = get("AGENT_MAX_STEPS").or_else(|| get("MAX_STEPS")) {
            self.agent.max_steps = parse_var("AGENT_MAX_STEPS", &v)?;
        }
        if let Some(v) = get("TEMPERATURE") {
            self.agent.temperature = parse_var("TEMPERATURE", &v)?;
        }
        if let Some(v) = get("MEMORY_BACKEND") {
            self.memory.backend = v.parse()?;
        }
        if let Some(v) = get("AGENT_EMBED_DIM") {
            self.memory.embed_dim = parse_var("AGENT_EMBED_DIM", &v)?;
        }
        if let Some(v) = get("AGENT_DB_URL") {
            if v.starts_with("sqlite:") {
                self.memory.sqlite_path = v;
            } else {
                self.memory.database_url = Some(v);
            }
        }
        if let Some(v) = get("SERPER_API_KEY") {
            self.search.api_key = Some(v);
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".stepwise")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.into()));

        if self.provider.base_url.trim().is_empty() {
            return invalid("provider.base_url must not be empty");
        }
        if self.provider.chat_model.trim().is_empty() || self.provider.embed_model.trim().is_empty() {
            return invalid("provider.chat_model and provider.embed_model must not be empty");
        }
        if self.agent.max_steps < 1 {
            return invalid("agent.max_steps must be at least 1");
        }
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return invalid("agent.temperature must be between 0.0 and 2.0");
        }
        if self.retrieval.chunk_words == 0 {
            return invalid("retrieval.chunk_words must be at least 1");
        }
        if self.retrieval.overlap_words >= self.retrieval.chunk_words {
            return invalid("retrieval.overlap_words must be smaller than retrieval.chunk_words");
        }
        if self.memory.embed_dim == 0 {
            return invalid("memory.embed_dim must be at least 1");
        }
        if self.memory.backend == MemoryBackendKind::Postgres && self.memory.database_url.is_none() {
            return invalid("memory.database_url (or AGENT_DB_URL) is required for the postgres backend");
        }
        for server in &self.mcp.servers {
            if server.url.is_none() && server.command.is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "mcp server '{}' needs either url or command",
                    server.name
                )));
            }
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::ValidationError(format!("{key} has an invalid value: '{value}'"))
    })
}

/// `$HOME` (`%USERPROFILE%` on Windows), falling back to the working directory.
fn dirs_home() -> PathBuf {
    let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    std::env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Raised only at startup; a command never begins with a bad config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("{path} is not valid TOML: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    ValidationError(String),
}
