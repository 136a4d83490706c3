//! `stepwise mcp list | add-http | add-stdio | use | remove | tools | call | ping`
//!
//! Servers added here live as long as the `App`: one command line, or the
//! whole REPL session.

use serde_json::Value;
use std::collections::BTreeMap;
use stepwise_tools::mcp::tool_names;

use super::{App, CmdResult};
use crate::McpCommand;

pub async fn run(app: &App, command: McpCommand) -> CmdResult {
    match command {
        McpCommand::List => {
            let servers = app.mcp.list_servers().await;
            if servers.is_empty() {
                println!("No MCP servers. Try: /mcp add-http -n fs -u http://localhost:8765");
            }
            for server in servers {
                let marker = if server.is_default { " (default)" } else { "" };
                println!("  {} [{}]{marker}", server.name, server.kind);
            }
        }
        McpCommand::AddHttp { name, url } => {
            app.mcp.add_http(&name, &url).await?;
            println!("MCP HTTP server '{name}' connected at {url}.");
        }
        McpCommand::AddStdio { name, command, env } => {
            let (program, args) = split_command(&command)?;
            let env = parse_env(&env)?;
            app.mcp.add_stdio(&name, &program, &args, &env).await?;
            println!("MCP stdio server '{name}' launched.");
        }
        McpCommand::Use { name } => {
            app.mcp.set_default(&name).await?;
            println!("Default MCP server set to {name}.");
        }
        McpCommand::Remove { name } => {
            app.mcp.remove(&name).await?;
            println!("Removed MCP server '{name}'.");
        }
        McpCommand::Tools { server } => {
            let tools = app.mcp.list_tools(server.as_deref()).await?;
            for name in tool_names(&tools) {
                println!("  {name}");
            }
        }
        McpCommand::Call { tool, args, server } => {
            let arguments: Value = serde_json::from_str(&args).map_err(|e| format!("--args is not valid JSON: {e}"))?;
            if !arguments.is_object() {
                return Err("--args must be a JSON object".into());
            }
            let result = app.mcp.call(&tool, &arguments, server.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        McpCommand::Ping { server } => {
            let count = app.mcp.ping(server.as_deref()).await?;
            let name = match server {
                Some(name) => name,
                None => app.mcp.default_server().await.unwrap_or_default(),
            };
            println!("{name}: ok ({count} tools)");
        }
    }
    Ok(())
}

/// Program and arguments from a shell-style command line.
fn split_command(command: &str) -> Result<(String, Vec<String>), String> {
    let mut words = shlex::split(command).ok_or_else(|| format!("unbalanced quotes in '{command}'"))?;
    if words.is_empty() {
        return Err("--command is empty".into());
    }
    let program = words.remove(0);
    Ok((program, words))
}

fn parse_env(pairs: &[String]) -> Result<BTreeMap<String, String>, String> {
    pairs
        .iter()
        .map(|pair| pair.trim())
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
            _ => Err(format!("--env expects KEY=VAL, got '{pair}'")),
        })
        .collect()
}
