//! `stepwise doctor`: diagnose configuration and connectivity.

use std::path::Path;
use stepwise_config::AppConfig;
use stepwise_tools::McpManager;

use super::CmdResult;

pub async fn run(config_path: Option<&Path>) -> CmdResult {
    println!("stepwise doctor");
    println!("===============\n");

    let mut issues = 0;

    let shown_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    let config = match AppConfig::load(config_path) {
        Ok(config) => {
            if shown_path.exists() {
                println!("  ✅ Config file valid ({})", shown_path.display());
            } else {
                println!("  ⚠️  No config file at {}, using defaults", shown_path.display());
            }
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  1 issue found. Fix the config and run doctor again.");
            return Ok(());
        }
    };

    // Model service
    let provider = match stepwise_providers::from_config(&config.provider) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => {
                println!(
                    "  ✅ Model service reachable at {} (chat: {}, embed: {})",
                    config.provider.base_url, config.provider.chat_model, config.provider.embed_model
                );
                Some(provider)
            }
            Ok(false) | Err(_) => {
                println!("  ❌ Model service not reachable at {}", config.provider.base_url);
                issues += 1;
                Some(provider)
            }
        },
        Err(e) => {
            println!("  ❌ Model client could not be built: {e}");
            issues += 1;
            None
        }
    };

    // Memory
    if let Some(provider) = provider {
        match stepwise_memory::from_config(&config.memory, provider).await {
            Ok(memory) => match memory.count().await {
                Ok(n) => println!("  ✅ Memory backend {} ({n} records)", memory.name()),
                Err(e) => {
                    println!("  ❌ Memory backend {} failed a count: {e}", memory.name());
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Memory backend {:?} unavailable: {e}", config.memory.backend);
                issues += 1;
            }
        }
    }

    // Web search
    if config.search.api_key.is_some() {
        println!("  ✅ Search API key configured");
    } else {
        println!("  ⚠️  SERPER_API_KEY not set; search and web research are disabled");
        issues += 1;
    }

    println!("  ✅ ETL output directory: {}", config.etl.output_dir.display());

    // MCP
    if config.mcp.servers.is_empty() {
        println!("  ✅ No MCP servers configured");
    } else {
        let manager = McpManager::from_config(&config.mcp).await;
        for server in manager.list_servers().await {
            match manager.ping(Some(&server.name)).await {
                Ok(n) => println!("  ✅ MCP server {} [{}]: {n} tools", server.name, server.kind),
                Err(e) => {
                    println!("  ❌ MCP server {}: {e}", server.name);
                    issues += 1;
                }
            }
        }
        let connected = manager.list_servers().await.len();
        if connected < config.mcp.servers.len() {
            println!(
                "  ❌ {} MCP server(s) could not be started",
                config.mcp.servers.len() - connected
            );
            issues += 1;
        }
        manager.close_all().await;
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
