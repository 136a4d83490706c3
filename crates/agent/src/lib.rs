//! The stepwise agent: a bounded **decide → act → observe** loop.
//!
//! 1. **Decide**: the model sees the system prompt (tools + recent notes)
//!    and the conversation, and replies with one JSON decision
//! 2. **Act**: a tool call runs through the [`ToolRegistry`](stepwise_core::ToolRegistry)
//! 3. **Observe**: the result, or the error, is appended to the conversation
//!    and the notes
//!
//! The loop ends on a `{"final": ...}` decision or after `max_steps` steps,
//! whichever comes first. [`Researcher`] is the fixed recall/search/answer
//! pipeline behind the `research` command.

pub mod decision;
pub mod loop_runner;
pub mod notes;
pub mod prompt;
pub mod research;

pub use decision::{extract_json, parse_decision};
pub use loop_runner::AgentLoop;
pub use notes::Scratchpad;
pub use research::{Origin, ResearchReport, Researcher};
