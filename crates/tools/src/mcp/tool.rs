use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use stepwise_core::error::ToolError;
use stepwise_core::tool::Tool;

use super::McpManager;

const NAME: &str = "mcp";

/// The `mcp` namespace tool. Input is `{server?, tool, arguments}`; the
/// registry also routes `mcp:<server>:<tool>` names here in that shape.
/// `{"op": "list_tools", "server"?}` lists a server's tools.
pub struct McpTool {
    manager: Arc<McpManager>,
}

impl McpTool {
    pub fn new(manager: Arc<McpManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Call a tool on an external MCP server. Use {server, tool, arguments}, or name the \
         tool directly as mcp:<server>:<tool>. {op: \"list_tools\", server} lists a server's tools."
    }

    fn input_example(&self) -> Value {
        json!({ "server": "fs", "tool": "read_file", "arguments": { "path": "README.md" } })
    }

    async fn invoke(&self, input: Value) -> Result<Value, ToolError> {
        let server = input.get("server").and_then(Value::as_str).filter(|s| !s.is_empty());

        if input.get("op").and_then(Value::as_str) == Some("list_tools") {
            return self
                .manager
                .list_tools(server)
                .await
                .map_err(|e| ToolError::failed(NAME, e));
        }

        let tool = input
            .get("tool")
            .or_else(|| input.get("name"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("mcp requires a 'tool' name".into()))?;
        let arguments = input
            .get("arguments")
            .or_else(|| input.get("args"))
            .cloned()
            .unwrap_or_else(|| json!({}));

        self.manager
            .call(tool, &arguments, server)
            .await
            .map_err(|e| ToolError::failed(format!("{NAME}:{}", server.unwrap_or("default")), e))
    }
}
