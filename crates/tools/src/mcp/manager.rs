use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use stepwise_config::McpConfig;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::http::McpHttpClient;
#[cfg(feature = "mcp-stdio")]
use super::stdio::McpStdioClient;
use super::{McpError, normalize_tool_list};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

enum McpServer {
    Http(McpHttpClient),
    #[cfg(feature = "mcp-stdio")]
    Stdio(McpStdioClient),
}

impl McpServer {
    fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            #[cfg(feature = "mcp-stdio")]
            Self::Stdio(_) => "stdio",
        }
    }

    async fn list_tools(&self) -> Result<Value, McpError> {
        match self {
            Self::Http(c) => c.list_tools().await,
            #[cfg(feature = "mcp-stdio")]
            Self::Stdio(c) => c.list_tools().await,
        }
    }

    async fn call(&self, tool: &str, arguments: &Value) -> Result<Value, McpError> {
        match self {
            Self::Http(c) => c.call(tool, arguments).await,
            #[cfg(feature = "mcp-stdio")]
            Self::Stdio(c) => c.call(tool, arguments).await,
        }
    }

    async fn close(self) {
        match self {
            Self::Http(_) => {}
            #[cfg(feature = "mcp-stdio")]
            Self::Stdio(c) => c.close().await,
        }
    }
}

/// Named MCP servers plus a default used when a call names none.
///
/// Re-adding a name replaces the old connection. The first server added
/// becomes the default; removing the default hands it to the first
/// remaining name in sorted order.
#[derive(Default)]
pub struct McpManager {
    servers: RwLock<BTreeMap<String, McpServer>>,
    default: RwLock<Option<String>>,
}

/// A row of `list_servers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub kind: &'static str,
    pub is_default: bool,
}

impl McpManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect every server in the config. A server that fails to connect
    /// is logged and skipped.
    pub async fn from_config(config: &McpConfig) -> Self {
        let manager = Self::new();
        for server in &config.servers {
            let added = match (&server.url, &server.command) {
                (Some(url), _) => manager.add_http(&server.name, url).await,
                (None, Some(command)) => {
                    manager
                        .add_stdio(&server.name, command, &server.args, &server.env)
                        .await
                }
                (None, None) => Err(McpError::Unsupported(format!(
                    "server '{}' has neither url nor command",
                    server.name
                ))),
            };
            if let Err(e) = added {
                warn!(server = %server.name, error = %e, "Skipping MCP server");
            }
        }
        if let Some(name) = &config.default {
            if let Err(e) = manager.set_default(name).await {
                warn!(server = %name, error = %e, "Configured default MCP server is not available");
            }
        }
        manager
    }

    pub async fn add_http(&self, name: &str, base_url: &str) -> Result<(), McpError> {
        let client = McpHttpClient::new(base_url, DEFAULT_TIMEOUT)?;
        info!(server = name, url = base_url, "Added MCP HTTP server");
        self.insert(name, McpServer::Http(client)).await;
        Ok(())
    }

    #[cfg(feature = "mcp-stdio")]
    pub async fn add_stdio(
        &self,
        name: &str,
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<(), McpError> {
        let client = McpStdioClient::spawn(name, command, args, env, DEFAULT_TIMEOUT).await?;
        self.insert(name, McpServer::Stdio(client)).await;
        Ok(())
    }

    #[cfg(not(feature = "mcp-stdio"))]
    pub async fn add_stdio(
        &self,
        name: &str,
        _command: &str,
        _args: &[String],
        _env: &BTreeMap<String, String>,
    ) -> Result<(), McpError> {
        Err(McpError::Unsupported(format!(
            "server '{name}' needs the stdio transport; rebuild with the `mcp-stdio` feature"
        )))
    }

    async fn insert(&self, name: &str, server: McpServer) {
        let previous = self.servers.write().await.insert(name.to_string(), server);
        if let Some(old) = previous {
            old.close().await;
        }
        let mut default = self.default.write().await;
        if default.is_none() {
            *default = Some(name.to_string());
        }
    }

    pub async fn remove(&self, name: &str) -> Result<(), McpError> {
        let (removed, next) = {
            let mut servers = self.servers.write().await;
            let removed = servers
                .remove(name)
                .ok_or_else(|| McpError::UnknownServer(name.to_string()))?;
            (removed, servers.keys().next().cloned())
        };
        removed.close().await;

        let mut default = self.default.write().await;
        if default.as_deref() == Some(name) {
            *default = next;
        }
        Ok(())
    }

    pub async fn list_servers(&self) -> Vec<ServerInfo> {
        let servers = self.servers.read().await;
        let default = self.default.read().await;
        servers
            .iter()
            .map(|(name, server)| ServerInfo {
                name: name.clone(),
                kind: server.kind(),
                is_default: default.as_deref() == Some(name.as_str()),
            })
            .collect()
    }

    pub async fn default_server(&self) -> Option<String> {
        self.default.read().await.clone()
    }

    pub async fn set_default(&self, name: &str) -> Result<(), McpError> {
        if !self.servers.read().await.contains_key(name) {
            return Err(McpError::UnknownServer(name.to_string()));
        }
        *self.default.write().await = Some(name.to_string());
        Ok(())
    }

    async fn resolve(&self, server: Option<&str>) -> Result<String, McpError> {
        match server {
            Some(name) => Ok(name.to_string()),
            None => self.default.read().await.clone().ok_or(McpError::NoDefault),
        }
    }

    pub async fn list_tools(&self, server: Option<&str>) -> Result<Value, McpError> {
        let name = self.resolve(server).await?;
        let servers = self.servers.read().await;
        let server = servers.get(&name).ok_or(McpError::UnknownServer(name.clone()))?;
        server.list_tools().await
    }

    pub async fn call(&self, tool: &str, arguments: &Value, server: Option<&str>) -> Result<Value, McpError> {
        let name = self.resolve(server).await?;
        let servers = self.servers.read().await;
        let server = servers.get(&name).ok_or(McpError::UnknownServer(name.clone()))?;
        server.call(tool, arguments).await
    }

    /// Number of tools a server reports; a connectivity check.
    pub async fn ping(&self, server: Option<&str>) -> Result<usize, McpError> {
        let tools = self.list_tools(server).await?;
        Ok(normalize_tool_list(&tools).len())
    }

    pub async fn close_all(&self) {
        let servers = std::mem::take(&mut *self.servers.write().await);
        for (_, server) in servers {
            server.close().await;
        }
        *self.default.write().await = None;
    }
}
