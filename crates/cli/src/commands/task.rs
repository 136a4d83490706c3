//! `stepwise task`: run the agent loop and show its step trace.

use std::sync::Arc;
use stepwise_core::event::{AgentEvent, EventBus};
use stepwise_core::StepState;
use tokio::sync::broadcast::{self, error::RecvError};

use super::{App, CmdResult};

const TRACE_PREVIEW: usize = 240;

pub async fn run(app: &App, task: &str) -> CmdResult {
    let task = task.trim();
    if task.is_empty() {
        return Err("task must not be empty".into());
    }

    let bus = Arc::new(EventBus::default());
    let trace = tokio::spawn(render_trace(bus.subscribe()));
    let agent = app.agent(bus.clone());

    let outcome = tokio::select! {
        outcome = agent.run(task) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    // Dropping every sender closes the trace stream.
    drop(agent);
    drop(bus);
    let _ = trace.await;

    match outcome {
        Some(outcome) => {
            if outcome.state == StepState::DoneByLimit {
                eprintln!("  (step limit reached)");
            }
            println!("{}", outcome.answer);
            Ok(())
        }
        None => {
            eprintln!("  Interrupted.");
            Ok(())
        }
    }
}

async fn render_trace(mut rx: broadcast::Receiver<Arc<AgentEvent>>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Some(line) = format_event(&event) {
                    eprintln!("{line}");
                }
            }
            Err(RecvError::Lagged(n)) => eprintln!("  ... {n} trace events skipped"),
            Err(RecvError::Closed) => break,
        }
    }
}

/// One trace line per event; raw model replies are only logged.
pub fn format_event(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::StepStarted { index, max_steps } => Some(format!("[step {index}/{max_steps}]")),
        AgentEvent::ModelReplied { index, reply } => {
            tracing::debug!(step = index, reply = %reply, "Model reply");
            None
        }
        AgentEvent::ToolCalled { tool, input, .. } => Some(format!("  → {tool} {input}")),
        AgentEvent::Observation { text, is_error, .. } => {
            let marker = if *is_error { "✗" } else { "←" };
            Some(format!("  {marker} {}", preview(text)))
        }
        AgentEvent::Finished { state, steps, .. } => Some(match state {
            StepState::DoneByLimit => format!("  done: step limit after {steps} step(s)"),
            _ => format!("  done in {steps} step(s)"),
        }),
    }
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(TRACE_PREVIEW) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat,
    }
}
