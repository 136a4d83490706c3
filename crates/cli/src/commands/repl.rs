//! `stepwise repl`: line-oriented shell.
//!
//! Slash commands take the same arguments as the subcommands
//! (`/ask -k 3 what is quartz?`); any other line runs an agent task.

use clap::Parser;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{App, CmdResult, dispatch, task};
use crate::Command;

const PROMPT: &str = "stepwise> ";

const HELP: &str = "\
Commands:
  <task>                               run the agent on a task
  /research <question>                 cited answer from memory and the web
  /ask [-k N] <question>               answer only from stored context
  /show [-k N] <query>                 top-k matching chunks
  /ingest <path> [--glob P]...         chunk files into memory
  /add <text> [--source S] [--uri U]   store a note
  /etl -p <path|url> -t <transform> [-l <out>]
  /mcp list                            connected servers
  /mcp add-http -n NAME -u URL         connect an HTTP façade
  /mcp add-stdio -n NAME -c \"CMD\" [--env K=V,...]
  /mcp use NAME | remove NAME          set default / disconnect
  /mcp tools | call <tool> --args '{...}' | ping [--server S]
  /dump [-n N]                         most recent records
  /help                                this text
  exit()                               leave";

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_subcommand = true)]
struct ReplLine {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq)]
pub enum ReplInput {
    Empty,
    Exit,
    Help,
    Command(Command),
    Task(String),
    Invalid(String),
}

pub fn parse_line(line: &str) -> ReplInput {
    let line = line.trim();
    match line {
        "" => return ReplInput::Empty,
        "exit()" | "exit" | "quit" | "/exit" | "/quit" => return ReplInput::Exit,
        _ => {}
    }
    let Some(rest) = line.strip_prefix('/') else {
        return ReplInput::Task(line.to_string());
    };

    let Some(words) = shlex::split(rest) else {
        return ReplInput::Invalid("unbalanced quotes".into());
    };
    if words.first().is_none_or(|w| w == "help") {
        return ReplInput::Help;
    }
    match ReplLine::try_parse_from(words) {
        Ok(ReplLine {
            command: Command::Repl | Command::Doctor,
        }) => ReplInput::Invalid("not available from inside the REPL".into()),
        Ok(ReplLine { command }) => ReplInput::Command(command),
        Err(e) => ReplInput::Invalid(e.to_string().trim_end().to_string()),
    }
}

pub async fn run(app: &App) -> CmdResult {
    println!();
    println!("  stepwise: {} via {}", app.config.provider.chat_model, app.config.provider.base_url);
    println!("  Memory: {}   Tools: {}", app.memory.name(), app.tools.names().join(", "));
    println!("  Type a task, /help for commands, exit() to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{PROMPT}");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let result = match parse_line(&line) {
            ReplInput::Empty => continue,
            ReplInput::Exit => break,
            ReplInput::Help => {
                println!("{HELP}");
                continue;
            }
            ReplInput::Invalid(message) => {
                eprintln!("{message}");
                continue;
            }
            ReplInput::Task(text) => task::run(app, &text).await,
            ReplInput::Command(command) => {
                tokio::select! {
                    result = dispatch(app, command) => result,
                    _ = tokio::signal::ctrl_c() => {
                        eprintln!("  Interrupted.");
                        Ok(())
                    }
                }
            }
        };
        if let Err(e) = result {
            eprintln!("  [error] {e}");
        }
        println!();
    }

    println!();
    println!("  Bye.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::McpCommand;
    use std::path::PathBuf;

    #[test]
    fn plain_lines_are_tasks() {
        assert_eq!(
            parse_line("  who founded NVIDIA? "),
            ReplInput::Task("who founded NVIDIA?".into())
        );
        assert_eq!(parse_line("   "), ReplInput::Empty);
        assert_eq!(parse_line("exit()"), ReplInput::Exit);
        assert_eq!(parse_line("/help"), ReplInput::Help);
        assert_eq!(parse_line("/"), ReplInput::Help);
    }

    #[test]
    fn slash_commands_parse_like_subcommands() {
        assert_eq!(
            parse_line("/ask -k 3 what is quartz?"),
            ReplInput::Command(Command::Ask {
                question: vec!["what".into(), "is".into(), "quartz?".into()],
                k: Some(3),
            })
        );
        assert_eq!(
            parse_line(r#"/etl -p data/in.csv -t "reorder:b,a; limit:2""#),
            ReplInput::Command(Command::Etl {
                path: "data/in.csv".into(),
                transform: "reorder:b,a; limit:2".into(),
                location: None,
            })
        );
        assert_eq!(
            parse_line("/ingest ./kb --glob *.md --glob *.txt"),
            ReplInput::Command(Command::Ingest {
                path: PathBuf::from("./kb"),
                globs: vec!["*.md".into(), "*.txt".into()],
            })
        );
        assert_eq!(
            parse_line(r#"/mcp call read_file --args '{"path": "a.txt"}' --server fs"#),
            ReplInput::Command(Command::Mcp {
                command: McpCommand::Call {
                    tool: "read_file".into(),
                    args: r#"{"path": "a.txt"}"#.into(),
                    server: Some("fs".into()),
                },
            })
        );
    }

    #[test]
    fn runtime_mcp_server_commands_parse() {
        assert_eq!(
            parse_line("/mcp add-http -n fs -u http://localhost:8765"),
            ReplInput::Command(Command::Mcp {
                command: McpCommand::AddHttp {
                    name: "fs".into(),
                    url: "http://localhost:8765".into(),
                },
            })
        );
        assert_eq!(
            parse_line(r#"/mcp add -n git -c "uvx mcp-server-git --repository ." --env GIT_DIR=.git,DEBUG=1"#),
            ReplInput::Command(Command::Mcp {
                command: McpCommand::AddStdio {
                    name: "git".into(),
                    command: "uvx mcp-server-git --repository .".into(),
                    env: vec!["GIT_DIR=.git".into(), "DEBUG=1".into()],
                },
            })
        );
        assert_eq!(
            parse_line("/mcp use git"),
            ReplInput::Command(Command::Mcp {
                command: McpCommand::Use { name: "git".into() },
            })
        );
        assert_eq!(
            parse_line("/mcp default fs"),
            ReplInput::Command(Command::Mcp {
                command: McpCommand::Use { name: "fs".into() },
            })
        );
        assert_eq!(
            parse_line("/mcp remove fs"),
            ReplInput::Command(Command::Mcp {
                command: McpCommand::Remove { name: "fs".into() },
            })
        );
        assert!(matches!(parse_line("/mcp add-http -n fs"), ReplInput::Invalid(_)));
    }

    #[test]
    fn bad_slash_commands_are_reported() {
        assert!(matches!(parse_line("/teleport now"), ReplInput::Invalid(_)));
        assert!(matches!(parse_line("/add \"unterminated"), ReplInput::Invalid(_)));
        assert!(matches!(parse_line("/repl"), ReplInput::Invalid(_)));
        assert!(matches!(parse_line("/ask"), ReplInput::Invalid(_)));
    }
}
