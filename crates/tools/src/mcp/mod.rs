//! MCP (Model Context Protocol) client side.
//!
//! Servers are reached either through an HTTP façade ([`http`]) or, with the
//! `mcp-stdio` feature, as child processes ([`stdio`]). [`McpManager`] keeps
//! them by name and [`McpTool`] exposes them to the agent as the `mcp`
//! namespace, so `mcp:<server>:<tool>` and `<server>:<tool>` resolve here.

pub mod http;
pub mod manager;
#[cfg(feature = "mcp-stdio")]
pub mod stdio;
pub mod tool;

pub use http::McpHttpClient;
pub use manager::{McpManager, ServerInfo};
pub use tool::McpTool;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("no default MCP server set")]
    NoDefault,

    #[error("no such MCP server: {0}")]
    UnknownServer(String),

    #[error("MCP transport error: {0}")]
    Transport(String),

    #[error("MCP server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Unsupported(String),
}

/// Pull the tool list out of the shapes servers answer `/tools` with:
/// `{"tools": [...]}`, `{"content": [{"type": "json", "value": {"tools": [...]}}]}`
/// or a plain list. Non-object entries are dropped.
pub fn normalize_tool_list(value: &Value) -> Vec<Value> {
    let list = match value {
        Value::Array(items) => Some(items),
        Value::Object(obj) => obj.get("tools").and_then(Value::as_array).or_else(|| {
            obj.get("content")
                .and_then(Value::as_array)?
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("json"))
                .find_map(|item| item.get("value")?.get("tools")?.as_array())
        }),
        _ => None,
    };
    list.map(|items| items.iter().filter(|t| t.is_object()).cloned().collect())
        .unwrap_or_default()
}

/// Tool names from any of the shapes [`normalize_tool_list`] accepts.
pub fn tool_names(value: &Value) -> Vec<String> {
    normalize_tool_list(value)
        .iter()
        .filter_map(|t| t.get("name").and_then(Value::as_str).map(str::to_string))
        .collect()
}
