//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! search the web, fetch a page, reshape a table, remember a fact,
//! or call out to an external MCP server.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ToolError;

/// The core Tool trait.
///
/// Every tool takes one JSON input and produces one JSON output. Tools are
/// registered in the [`ToolRegistry`] at startup and made available to the
/// agent loop by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "search", "etl").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// An example input, shown to the model in the system prompt.
    fn input_example(&self) -> Value;

    /// Invoke the tool with the given input.
    async fn invoke(&self, input: Value) -> Result<Value, ToolError>;
}

/// Where a tool name resolves to.
#[derive(Clone)]
pub enum Route {
    /// A tool registered under exactly this name.
    Direct(Arc<dyn Tool>),
    /// A `<server>:<tool>` name handled by the namespace tool.
    Namespaced {
        tool: Arc<dyn Tool>,
        server: Option<String>,
        name: String,
    },
}

/// A registry of available tools.
///
/// Populated once at startup and only read afterwards. Names of the form
/// `mcp:<server>:<tool>` or `<server>:<tool>` are routed to the namespace
/// tool, when one is registered, with the input wrapped as
/// `{"server", "tool", "arguments"}`.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    namespace: Option<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            namespace: None,
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Register a tool that also receives every qualified `<server>:<tool>` name.
    pub fn register_namespace(&mut self, tool: Arc<dyn Tool>) {
        self.namespace = Some(tool.name().to_string());
        self.register(tool);
    }

    /// Get a tool by its exact name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Resolve a name the model produced, including qualified names.
    pub fn resolve(&self, name: &str) -> Option<Route> {
        if let Some(tool) = self.tools.get(name) {
            return Some(Route::Direct(tool.clone()));
        }
        let prefix = self.namespace.as_deref()?;
        let tool = self.tools.get(prefix)?.clone();

        let rest = name
            .strip_prefix(prefix)
            .and_then(|r| r.strip_prefix(':'))
            .unwrap_or(name);
        let (server, inner) = match rest.split_once(':') {
            Some((server, inner)) => (Some(server.to_string()), inner),
            // "mcp:<tool>" targets the default server; a bare unknown name is not ours
            None if rest.len() != name.len() => (None, rest),
            None => return None,
        };
        if inner.is_empty() || server.as_deref() == Some("") {
            return None;
        }
        Some(Route::Namespaced {
            tool,
            server,
            name: inner.to_string(),
        })
    }

    /// Whether a name resolves to any tool.
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Invoke a tool by name.
    pub async fn invoke(&self, name: &str, input: Value) -> Result<Value, ToolError> {
        match self.resolve(name) {
            Some(Route::Direct(tool)) => tool.invoke(input).await,
            Some(Route::Namespaced { tool, server, name }) => {
                tool.invoke(json!({ "server": server, "tool": name, "arguments": input }))
                    .await
            }
            None => Err(ToolError::NotFound(name.to_string())),
        }
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// One line per tool for the system prompt.
    pub fn describe(&self) -> String {
        self.tools
            .values()
            .map(|t| format!("- {}: {} Example input: {}", t.name(), t.description(), t.input_example()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
