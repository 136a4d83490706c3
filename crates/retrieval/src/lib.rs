//! # stepwise retrieval
//!
//! Turns files and notes into overlapping word-window chunks, stores them
//! through a [`stepwise_core::Memory`] backend, and answers questions from
//! the top-ranked chunks.
//!
//! ```text
//! ingest ─▶ discover ─▶ chunk_words ─▶ Memory::upsert (embeds + stores)
//! show   ─▶ Memory::query (embeds query, ranks by cosine similarity)
//! ask    ─▶ show ─▶ build_context ─▶ Provider::chat (answer ONLY from CONTEXT)
//! ```

pub mod chunk;
pub mod engine;
pub mod ingest;

pub use chunk::{WordChunk, chunk_words};
pub use engine::{ASK_SYSTEM_PROMPT, Answer, REFUSAL, Retriever, build_context, render_records};
pub use ingest::{IngestReport, discover, split_patterns};

use std::path::PathBuf;
use stepwise_core::error::{MemoryError, ProviderError};

/// Errors from retrieval commands.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("cannot read {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("invalid glob pattern {0}")]
    Pattern(String),
}
