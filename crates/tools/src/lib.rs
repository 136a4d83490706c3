//! Built-in tools for stepwise.
//!
//! - `search`: web search via Serper
//! - `fetch`: download a page and extract readable text
//! - `etl`: load, reshape and save CSV/JSON tables
//! - `memory`: remember / recall / dump over the configured store
//! - `mcp`: tools on external MCP servers, addressed as `mcp:<server>:<tool>`
//!
//! With the `mcp-stdio` feature, MCP servers can also be spawned as child
//! processes instead of reached over an HTTP façade.

pub mod etl;
pub mod fetch;
pub mod mcp;
pub mod memory_tool;
pub mod search;

pub use etl::EtlTool;
pub use fetch::FetchTool;
pub use mcp::{McpManager, McpTool};
pub use memory_tool::MemoryTool;
pub use search::SearchTool;

use std::sync::Arc;
use stepwise_config::AppConfig;
use stepwise_core::error::ToolError;
use stepwise_core::memory::Memory;
use stepwise_core::tool::ToolRegistry;

/// Build the registry with every built-in tool. The `mcp` tool is the
/// namespace for qualified `<server>:<tool>` names.
pub fn default_registry(
    config: &AppConfig,
    memory: Arc<dyn Memory>,
    mcp: Arc<McpManager>,
) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SearchTool::new(&config.search)?));
    registry.register(Arc::new(FetchTool::new()?));
    registry.register(Arc::new(EtlTool::new(config.etl.output_dir.clone())?));
    registry.register(Arc::new(MemoryTool::new(memory)));
    registry.register_namespace(Arc::new(McpTool::new(mcp)));
    Ok(registry)
}
