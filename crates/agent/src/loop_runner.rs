//! The bounded decide → act → observe loop.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use stepwise_config::AgentConfig;
use stepwise_core::agent::{Decision, RunOutcome, StepResult, StepState};
use stepwise_core::event::{AgentEvent, EventBus};
use stepwise_core::message::Message;
use stepwise_core::provider::{ChatOptions, Provider};
use stepwise_core::tool::ToolRegistry;
use tracing::{debug, info, warn};

use crate::decision::parse_decision;
use crate::notes::Scratchpad;
use crate::prompt::{render_tool_result, system_prompt, truncate};

const DECISION_HINT: &str = r#"Reply with exactly one JSON object: {"tool": "<name>", "input": {...}} or {"final": "<answer>"}."#;

/// What one step produced before it is recorded.
struct Observation {
    tool: Option<String>,
    text: String,
    is_error: bool,
}

/// Drives one task to a final answer or to the step limit.
///
/// Every step asks the model for a decision and, for a tool call, runs the
/// tool. Parse failures, provider failures and tool failures all become
/// observations that cost one step, so a run always ends within
/// `max_steps` steps.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
            event_bus,
        }
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn max_steps(&self) -> usize {
        self.config.max_steps.max(1)
    }

    /// Run `task` to completion.
    ///
    /// Dropping the returned future between steps abandons the run; nothing
    /// but the in-memory conversation is lost.
    pub async fn run(&self, task: &str) -> RunOutcome {
        let max_steps = self.max_steps();
        let mut history = vec![Message::user(task)];
        let mut notes = Scratchpad::new();
        let mut steps: Vec<StepResult> = Vec::with_capacity(max_steps);
        info!(max_steps, "Starting agent run");

        for index in 1..=max_steps {
            self.event_bus.publish(AgentEvent::StepStarted { index, max_steps });
            debug!(step = index, state = ?StepState::AwaitingDecision, "Asking model for a decision");

            let mut messages = Vec::with_capacity(history.len() + 1);
            messages.push(Message::system(system_prompt(&self.tools, &notes)));
            messages.extend(history.iter().cloned());

            let reply = self
                .provider
                .chat(&messages, ChatOptions::with_temperature(self.config.temperature))
                .await;

            let observation = match reply {
                Err(e) => {
                    warn!(step = index, error = %e, "Model call failed");
                    Observation {
                        tool: None,
                        text: format!("MODEL ERROR: {e}"),
                        is_error: true,
                    }
                }
                Ok(reply) => {
                    self.event_bus.publish(AgentEvent::ModelReplied {
                        index,
                        reply: reply.clone(),
                    });
                    let decision = parse_decision(&reply, &self.tools);
                    history.push(Message::assistant(reply));

                    match decision {
                        Ok(Decision::Final(answer)) => {
                            info!(step = index, "Final answer");
                            steps.push(StepResult {
                                index,
                                tool: None,
                                observation: answer,
                                terminal: true,
                            });
                            return self.finish(StepState::Done, steps);
                        }
                        Ok(Decision::ToolCall(call)) => self.execute(index, call.tool, Value::Object(call.input)).await,
                        Err(e) => {
                            warn!(step = index, error = %e, "Unusable model reply");
                            Observation {
                                tool: None,
                                text: format!("DECISION ERROR: {e}. {DECISION_HINT}"),
                                is_error: true,
                            }
                        }
                    }
                }
            };

            let text = truncate(&observation.text, self.config.observation_chars);
            notes.add(text.clone());
            history.push(Message::tool(observation.tool.as_deref(), text.clone()));
            self.event_bus.publish(AgentEvent::Observation {
                index,
                tool: observation.tool.clone(),
                text: text.clone(),
                is_error: observation.is_error,
            });

            let terminal = index == max_steps;
            steps.push(StepResult {
                index,
                tool: observation.tool,
                observation: if terminal { limit_answer(max_steps, &notes) } else { text },
                terminal,
            });
        }

        warn!(max_steps, "Step limit reached without a final answer");
        self.finish(StepState::DoneByLimit, steps)
    }

    async fn execute(&self, index: usize, tool: String, input: Value) -> Observation {
        debug!(step = index, tool = %tool, state = ?StepState::ExecutingTool, "Invoking tool");
        self.event_bus.publish(AgentEvent::ToolCalled {
            index,
            tool: tool.clone(),
            input: input.clone(),
        });

        match self.tools.invoke(&tool, input).await {
            Ok(result) => Observation {
                text: render_tool_result(&tool, &result),
                tool: Some(tool),
                is_error: false,
            },
            Err(e) => {
                warn!(step = index, tool = %tool, error = %e, "Tool failed");
                Observation {
                    text: format!("tool {tool} failed: {e}"),
                    tool: Some(tool),
                    is_error: true,
                }
            }
        }
    }

    fn finish(&self, state: StepState, steps: Vec<StepResult>) -> RunOutcome {
        self.event_bus.publish(AgentEvent::Finished {
            state,
            steps: steps.len(),
            timestamp: Utc::now(),
        });
        RunOutcome::from_steps(state, steps)
    }
}

/// The answer of a run that ran out of steps.
fn limit_answer(max_steps: usize, notes: &Scratchpad) -> String {
    match notes.last() {
        Some(last) => format!("Stopped after {max_steps} steps without a final answer. Last observation: {last}"),
        None => format!("Stopped after {max_steps} steps without a final answer. No observations were recorded."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_answer_quotes_last_observation() {
        let mut notes = Scratchpad::new();
        assert_eq!(
            limit_answer(3, &notes),
            "Stopped after 3 steps without a final answer. No observations were recorded."
        );
        notes.add("SEARCH RESULT:\n- a — b");
        assert_eq!(
            limit_answer(3, &notes),
            "Stopped after 3 steps without a final answer. Last observation: SEARCH RESULT:\n- a — b"
        );
    }
}
