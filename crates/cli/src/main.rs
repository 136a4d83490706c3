//! stepwise CLI, the main entry point.
//!
//! Commands:
//! - `task`      Run the agent loop on one task
//! - `repl`      Interactive shell (the default)
//! - `ingest`    Chunk files into memory
//! - `add`       Store a single note
//! - `show`      Top-k matching chunks
//! - `ask`       Answer only from retrieved context
//! - `research`  Memory/web research with citations
//! - `etl`       Load, reshape and save a CSV/JSON table
//! - `mcp`       Inspect and call configured MCP servers
//! - `dump`      Most recent records
//! - `doctor`    Diagnose configuration and connectivity

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

#[derive(Parser)]
#[command(
    name = "stepwise",
    about = "stepwise: a local research and data agent",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines (stderr)
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (default: ~/.stepwise/config.toml)
    #[arg(long, global = true, env = "STEPWISE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run the agent on a task
    Task {
        #[arg(required = true, num_args = 1..)]
        task: Vec<String>,
    },

    /// Interactive shell
    Repl,

    /// Chunk and store every matching file under a path
    Ingest {
        path: PathBuf,

        /// Include glob, repeatable or comma-separated (default from config)
        #[arg(long = "glob")]
        globs: Vec<String>,
    },

    /// Store a single note
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        #[arg(long)]
        source: Option<String>,

        #[arg(long)]
        uri: Option<String>,
    },

    /// Show the top-k chunks for a query
    Show {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        #[arg(short)]
        k: Option<usize>,
    },

    /// Answer a question from retrieved context only
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        #[arg(short)]
        k: Option<usize>,
    },

    /// Research a question across memory and the web
    Research {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Load a table, apply a transform and save it
    Etl {
        /// Local path or http(s) URL of a .csv/.json file
        #[arg(short, long)]
        path: String,

        /// e.g. "reorder:b,a; rename:b->B; limit:2"
        #[arg(short, long)]
        transform: String,

        /// Output path (default: <etl.output_dir>/transformed_<basename>)
        #[arg(short = 'l', long = "location")]
        location: Option<PathBuf>,
    },

    /// Work with configured MCP servers
    Mcp {
        #[command(subcommand)]
        command: McpCommand,
    },

    /// Show the most recent records
    Dump {
        #[arg(short, default_value_t = 10)]
        n: usize,
    },

    /// Diagnose configuration and connectivity
    Doctor,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum McpCommand {
    /// Connected servers, default marked
    List,

    /// Connect an MCP HTTP façade for this session
    AddHttp {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        url: String,
    },

    /// Launch an MCP server over stdio for this session
    #[command(alias = "add")]
    AddStdio {
        #[arg(short, long)]
        name: String,

        /// Command line, split like a shell would
        #[arg(short, long)]
        command: String,

        /// KEY=VAL pairs, comma-separated or repeated
        #[arg(long, value_delimiter = ',')]
        env: Vec<String>,
    },

    /// Make a server the default
    #[command(alias = "default")]
    Use { name: String },

    /// Disconnect and forget a server
    Remove { name: String },

    /// Tools offered by a server
    Tools {
        #[arg(long)]
        server: Option<String>,
    },

    /// Call a tool
    Call {
        tool: String,

        /// JSON object of arguments
        #[arg(long, default_value = "{}")]
        args: String,

        #[arg(long)]
        server: Option<String>,
    },

    /// Check a server answers
    Ping {
        #[arg(long)]
        server: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env first so clap's `env` attributes and config overrides see it
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> commands::CmdResult {
    let command = cli.command.unwrap_or(Command::Repl);
    if command == Command::Doctor {
        return commands::doctor::run(cli.config.as_deref()).await;
    }

    let config = stepwise_config::AppConfig::load(cli.config.as_deref())
        .map_err(|e| format!("Failed to load config: {e}"))?;
    let app = commands::App::build(config).await?;

    let result = match command {
        Command::Repl => commands::repl::run(&app).await,
        other => commands::dispatch(&app, other).await,
    };
    app.shutdown().await;
    result
}
