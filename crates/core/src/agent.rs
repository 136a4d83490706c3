//! Agent run types: decisions, steps, and outcomes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A model-issued request to run a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke
    pub tool: String,

    /// Tool input
    #[serde(default)]
    pub input: Map<String, Value>,
}

/// What the model decided to do on one step.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    ToolCall(ToolCall),
    Final(String),
}

/// Loop state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepState {
    AwaitingDecision,
    ExecutingTool,
    Done,
    DoneByLimit,
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Done | StepState::DoneByLimit)
    }
}

/// The record of one decision-then-act cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// 1-based step index
    pub index: usize,

    /// Tool invoked, if the step got that far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// Observation text, or the final answer on a terminal step
    pub observation: String,

    pub terminal: bool,
}

/// The result of one agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Content of the last terminal step
    pub answer: String,

    /// `Done` or `DoneByLimit`
    pub state: StepState,

    pub steps: Vec<StepResult>,
}

impl RunOutcome {
    /// Build an outcome, taking the answer from the last terminal step.
    pub fn from_steps(state: StepState, steps: Vec<StepResult>) -> Self {
        let answer = steps
            .iter()
            .rev()
            .find(|s| s.terminal)
            .map(|s| s.observation.clone())
            .unwrap_or_default();
        Self { answer, state, steps }
    }
}
