//! Agent event bus: the visible step trace.
//!
//! The agent loop publishes an event at each transition. The CLI subscribes
//! to render progress; nothing in the loop depends on anyone listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::agent::StepState;

/// Events published during an agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    /// A new step started; the model is being asked for a decision
    StepStarted { index: usize, max_steps: usize },

    /// The model replied (raw text)
    ModelReplied { index: usize, reply: String },

    /// A tool is about to be invoked
    ToolCalled {
        index: usize,
        tool: String,
        input: serde_json::Value,
    },

    /// An observation was appended (tool result or recoverable error)
    Observation {
        index: usize,
        tool: Option<String>,
        text: String,
        is_error: bool,
    },

    /// The run reached a terminal state
    Finished {
        state: StepState,
        steps: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
