//! # stepwise core
//!
//! Domain types, traits, and error definitions for the stepwise agent.
//! This crate has **no I/O** of its own: it defines the model that the
//! provider, memory, retrieval, tool and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the agent loop is a trait here:
//! - [`Provider`] for chat completions and embeddings
//! - [`Tool`] for the capabilities the model may invoke
//! - [`Memory`] for the document store behind recall and retrieval
//!
//! Implementations are chosen once at startup from configuration and handed
//! around as `Arc<dyn Trait>`, so calling code never branches on which
//! backend is active.

pub mod agent;
pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tool;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

// Re-export key types at crate root for ergonomics
pub use agent::{Decision, RunOutcome, StepResult, StepState, ToolCall};
pub use error::{DecisionParseError, Error, MemoryError, ProviderError, Result, ToolError};
pub use event::{AgentEvent, EventBus};
pub use memory::{Document, Memory, MemoryRecord};
pub use message::{Message, Role};
pub use provider::{ChatOptions, Provider};
pub use tool::{Tool, ToolRegistry};
