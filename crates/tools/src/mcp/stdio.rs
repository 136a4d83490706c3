//! MCP servers spawned as child processes, spoken to over stdio.

use rmcp::ServiceExt;
use rmcp::model::CallToolRequestParams;
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::TokioChildProcess;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use super::McpError;

pub struct McpStdioClient {
    service: RunningService<RoleClient, ()>,
}

impl McpStdioClient {
    /// Spawn `command` and complete the MCP handshake within `timeout`.
    pub async fn spawn(
        name: &str,
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, McpError> {
        let mut cmd = Command::new(command);
        cmd.args(args);
        for (k, v) in env {
            cmd.env(k, v);
        }

        let transport = TokioChildProcess::new(cmd)
            .map_err(|e| McpError::Transport(format!("failed to spawn MCP server '{name}': {e}")))?;
        let service = tokio::time::timeout(timeout, ().serve(transport))
            .await
            .map_err(|_| {
                McpError::Transport(format!(
                    "MCP server '{name}' handshake timed out after {}s",
                    timeout.as_secs()
                ))
            })?
            .map_err(|e| McpError::Protocol(format!("MCP server '{name}' handshake failed: {e}")))?;

        info!(server = name, command, "MCP stdio server connected");
        Ok(Self { service })
    }

    /// Tools as `{"tools": [{name, description, inputSchema}]}`, the façade shape.
    pub async fn list_tools(&self) -> Result<Value, McpError> {
        let tools = self
            .service
            .list_all_tools()
            .await
            .map_err(|e| McpError::Protocol(format!("list tools: {e}")))?;
        let tools = serde_json::to_value(tools).map_err(|e| McpError::Protocol(e.to_string()))?;
        Ok(json!({ "tools": tools }))
    }

    pub async fn call(&self, tool: &str, arguments: &Value) -> Result<Value, McpError> {
        let arguments = match arguments {
            Value::Null => json!({}),
            other => other.clone(),
        };
        let params: CallToolRequestParams =
            serde_json::from_value(json!({ "name": tool, "arguments": arguments }))
                .map_err(|e| McpError::Protocol(format!("tool arguments must be an object: {e}")))?;
        let result = self
            .service
            .call_tool(params)
            .await
            .map_err(|e| McpError::Protocol(format!("call {tool}: {e}")))?;
        serde_json::to_value(result).map_err(|e| McpError::Protocol(e.to_string()))
    }

    pub async fn close(self) {
        if let Err(e) = self.service.cancel().await {
            warn!(error = %e, "error cancelling MCP stdio server");
        }
    }
}
