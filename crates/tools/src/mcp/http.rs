//! Client for an HTTP façade in front of an MCP server.
//!
//! The façade exposes `GET /health`, `GET /tools` and `POST /call`. Façades
//! disagree on the `/call` payload, so [`McpHttpClient::call`] tries the
//! known shapes in turn.

use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::McpError;

pub struct McpHttpClient {
    base: String,
    client: reqwest::Client,
}

impl McpHttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, McpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| McpError::Transport(e.to_string()))?;
        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub async fn health(&self) -> Result<Value, McpError> {
        self.get_json("health").await
    }

    pub async fn list_tools(&self) -> Result<Value, McpError> {
        self.get_json("tools").await
    }

    /// Call `tool`, trying `{name, arguments}`, then `{tool, arguments}`,
    /// then `{tool, args}`.
    ///
    /// A 400/422 or a transport failure moves on to the next shape; any
    /// other HTTP error is returned at once. When every shape fails the last
    /// error is returned.
    pub async fn call(&self, tool: &str, arguments: &Value) -> Result<Value, McpError> {
        let attempts = [
            ("name_arguments", json!({ "name": tool, "arguments": arguments })),
            ("tool_arguments", json!({ "tool": tool, "arguments": arguments })),
            ("tool_args", json!({ "tool": tool, "args": arguments })),
        ];

        let url = format!("{}/call", self.base);
        let mut last_err = McpError::Transport("no payload shape attempted".into());
        for (label, payload) in attempts {
            let resp = match self.client.post(&url).json(&payload).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    debug!(shape = label, error = %e, "MCP call transport error");
                    last_err = McpError::Transport(e.to_string());
                    continue;
                }
            };

            let status = resp.status();
            if status.is_success() {
                return resp
                    .json()
                    .await
                    .map_err(|e| McpError::Protocol(format!("invalid JSON from /call: {e}")));
            }

            let body = resp.text().await.unwrap_or_default();
            let err = McpError::Status {
                status: status.as_u16(),
                body: format!("payload shape '{label}': {body}"),
            };
            if matches!(status.as_u16(), 400 | 422) {
                debug!(shape = label, status = status.as_u16(), "MCP call shape rejected");
                last_err = err;
                continue;
            }
            return Err(err);
        }
        Err(last_err)
    }

    async fn get_json(&self, path: &str) -> Result<Value, McpError> {
        let resp = self
            .client
            .get(format!("{}/{path}", self.base))
            .send()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(McpError::Status {
                status: status.as_u16(),
                body,
            });
        }
        resp.json()
            .await
            .map_err(|e| McpError::Protocol(format!("invalid JSON from /{path}: {e}")))
    }
}
