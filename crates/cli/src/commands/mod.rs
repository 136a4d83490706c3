//! Command handlers and the shared runtime they operate on.

pub mod doctor;
pub mod etl;
pub mod knowledge;
pub mod mcp;
pub mod repl;
pub mod research;
pub mod task;

use std::sync::Arc;
use stepwise_agent::{AgentLoop, Researcher};
use stepwise_config::AppConfig;
use stepwise_core::event::EventBus;
use stepwise_core::memory::Memory;
use stepwise_core::provider::Provider;
use stepwise_core::tool::ToolRegistry;
use stepwise_retrieval::Retriever;
use stepwise_tools::McpManager;
use tracing::debug;

use crate::Command;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Everything a command needs, built once from the config.
pub struct App {
    pub config: AppConfig,
    pub provider: Arc<dyn Provider>,
    pub memory: Arc<dyn Memory>,
    pub mcp: Arc<McpManager>,
    pub tools: Arc<ToolRegistry>,
}

impl App {
    pub async fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let provider = stepwise_providers::from_config(&config.provider)?;
        let memory = stepwise_memory::from_config(&config.memory, provider.clone())
            .await
            .map_err(|e| format!("Failed to open {:?} memory: {e}", config.memory.backend))?;
        let mcp = Arc::new(McpManager::from_config(&config.mcp).await);
        let tools = Arc::new(stepwise_tools::default_registry(&config, memory.clone(), mcp.clone())?);
        debug!(
            provider = provider.name(),
            memory = memory.name(),
            tools = tools.len(),
            "Runtime ready"
        );

        Ok(Self {
            config,
            provider,
            memory,
            mcp,
            tools,
        })
    }

    pub fn retriever(&self) -> Retriever {
        Retriever::new(self.memory.clone(), self.provider.clone(), self.config.retrieval.clone())
    }

    pub fn researcher(&self) -> Result<Researcher, Box<dyn std::error::Error>> {
        let search = self.tools.get("search").ok_or("search tool is not registered")?;
        let fetch = self.tools.get("fetch").ok_or("fetch tool is not registered")?;
        Ok(Researcher::new(self.memory.clone(), self.provider.clone(), search, fetch))
    }

    pub fn agent(&self, event_bus: Arc<EventBus>) -> AgentLoop {
        AgentLoop::new(
            self.provider.clone(),
            self.tools.clone(),
            self.config.agent.clone(),
            event_bus,
        )
    }

    pub async fn shutdown(&self) {
        self.mcp.close_all().await;
    }
}

/// Run one command. `repl` and `doctor` are handled by the caller.
pub async fn dispatch(app: &App, command: Command) -> CmdResult {
    match command {
        Command::Task { task } => task::run(app, &task.join(" ")).await,
        Command::Ingest { path, globs } => knowledge::ingest(app, &path, &globs).await,
        Command::Add { text, source, uri } => {
            knowledge::add(app, &text.join(" "), source.as_deref(), uri.as_deref()).await
        }
        Command::Show { query, k } => knowledge::show(app, &query.join(" "), k).await,
        Command::Ask { question, k } => knowledge::ask(app, &question.join(" "), k).await,
        Command::Research { question } => research::run(app, &question.join(" ")).await,
        Command::Etl {
            path,
            transform,
            location,
        } => etl::run(app, &path, &transform, location.as_deref()).await,
        Command::Mcp { command } => mcp::run(app, command).await,
        Command::Dump { n } => knowledge::dump(app, n).await,
        Command::Repl | Command::Doctor => Err("not available from inside the REPL".into()),
    }
}
