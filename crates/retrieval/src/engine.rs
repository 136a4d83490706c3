//! The retrieval engine: ingest, add, show, and ask-from-context.

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::path::Path;
use std::sync::Arc;
use stepwise_config::RetrievalConfig;
use stepwise_core::memory::{Document, Memory, MemoryRecord};
use stepwise_core::message::Message;
use stepwise_core::provider::{ChatOptions, Provider};
use tracing::{debug, info, warn};

use crate::RetrievalError;
use crate::chunk::chunk_words;
use crate::ingest::{IngestReport, discover};

/// The exact phrase the model is told to use when the context lacks the answer.
pub const REFUSAL: &str = "I don't know.";

pub const ASK_SYSTEM_PROMPT: &str = "You are a precise assistant. Answer ONLY from CONTEXT. \
If the answer is not in CONTEXT, reply exactly: I don't know.";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// A grounded answer plus the records it was built from.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<MemoryRecord>,
}

/// Chunks documents into memory and answers questions from what it retrieves.
pub struct Retriever {
    memory: Arc<dyn Memory>,
    provider: Arc<dyn Provider>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(memory: Arc<dyn Memory>, provider: Arc<dyn Provider>, config: RetrievalConfig) -> Self {
        Self {
            memory,
            provider,
            config,
        }
    }

    pub fn memory(&self) -> &Arc<dyn Memory> {
        &self.memory
    }

    pub fn default_k(&self) -> usize {
        self.config.top_k
    }

    /// Split one text into chunk documents keyed by `<uri>#<word offset>`.
    pub fn chunk_document(&self, source: &str, uri: &str, text: &str) -> Vec<Document> {
        let chunks = chunk_words(text, self.config.chunk_words, self.config.overlap_words);
        let total = chunks.len();
        chunks
            .into_iter()
            .map(|c| {
                let mut meta = Map::new();
                meta.insert("chunk".into(), json!(c.index + 1));
                meta.insert("chunks".into(), json!(total));
                meta.insert("offset".into(), json!(c.offset));
                Document::new(source, format!("{uri}#{}", c.offset), c.text).with_meta(meta)
            })
            .collect()
    }

    /// Ingest every file under `path` matching `patterns` (or the configured defaults).
    ///
    /// Files that are not valid UTF-8 text are skipped with a warning. Every
    /// chunk is stored in one upsert, so any memory error (including a
    /// dimension mismatch) aborts the ingest with nothing written.
    pub async fn ingest(&self, path: &Path, patterns: Option<&[String]>) -> Result<IngestReport, RetrievalError> {
        let patterns = patterns
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.config.patterns);
        let files = discover(path, patterns)?;
        info!(root = %path.display(), files = files.len(), "Ingesting");

        let mut report = IngestReport::default();
        let mut docs = Vec::new();
        for file in files {
            let text = match tokio::fs::read_to_string(&file).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Skipping unreadable file");
                    report.skipped.push(file);
                    continue;
                }
            };

            let source = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            let chunks = self.chunk_document(&source, &file.display().to_string(), &text);
            if chunks.is_empty() {
                debug!(file = %file.display(), "Empty file, nothing to store");
            }
            docs.extend(chunks);
            report.files += 1;
        }

        report.chunks = self.memory.upsert(docs).await?;
        Ok(report)
    }

    /// Store a single note. The uri defaults to a timestamped `note-<ms>`.
    pub async fn add(&self, text: &str, source: Option<&str>, uri: Option<&str>) -> Result<usize, RetrievalError> {
        let uri = uri
            .map(str::to_string)
            .unwrap_or_else(|| format!("note-{}", Utc::now().timestamp_millis()));
        let source = source.unwrap_or("note");
        Ok(self.memory.add(text, source, &uri, Map::new()).await?)
    }

    /// The `k` best-matching records for `query`.
    pub async fn show(&self, query: &str, k: usize) -> Result<Vec<MemoryRecord>, RetrievalError> {
        Ok(self.memory.query(query, k).await?)
    }

    /// Answer `question` using only the top-`k` retrieved chunks as context.
    pub async fn ask(&self, question: &str, k: usize) -> Result<Answer, RetrievalError> {
        let sources = self.show(question, k).await?;
        let context = build_context(&sources);
        debug!(question, sources = sources.len(), "Asking from context");

        let messages = vec![
            Message::system(ASK_SYSTEM_PROMPT),
            Message::user(format!("QUESTION:\n{question}\n\nCONTEXT:\n{context}")),
        ];
        let answer = self
            .provider
            .chat(&messages, ChatOptions::with_temperature(0.0))
            .await?;

        Ok(Answer {
            answer: answer.trim().to_string(),
            sources,
        })
    }
}

/// Join records as `[source] text` blocks in ranked order.
pub fn build_context(records: &[MemoryRecord]) -> String {
    records
        .iter()
        .map(|r| format!("[{}] {}", r.source, r.content))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Render records for the terminal: rank, score, source, uri, and a preview.
pub fn render_records(records: &[MemoryRecord], preview_chars: usize) -> Value {
    Value::Array(
        records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let preview: String = r.content.chars().take(preview_chars).collect();
                json!({
                    "rank": i + 1,
                    "score": (r.score * 1000.0).round() / 1000.0,
                    "source": r.source,
                    "uri": r.uri,
                    "preview": preview,
                })
            })
            .collect(),
    )
}
