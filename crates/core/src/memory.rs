//! Memory trait: the document store behind recall and retrieval.
//!
//! Two kinds of backend implement it: an in-process store ranked by
//! substring occurrence, and vector stores ranked by cosine similarity.
//! Both return [`MemoryRecord`]s in the same shape.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MemoryError;

/// A unit of text to store, identified by `(source, uri)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Free-text tag (file name, "web", "note", ...)
    #[serde(default = "default_source")]
    pub source: String,

    /// Identifying string, unique within a source
    #[serde(default)]
    pub uri: String,

    /// Arbitrary metadata
    #[serde(default)]
    pub meta: Map<String, Value>,

    /// The text itself
    pub content: String,
}

fn default_source() -> String {
    "note".into()
}

impl Document {
    pub fn new(source: impl Into<String>, uri: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            uri: uri.into(),
            meta: Map::new(),
            content: content.into(),
        }
    }

    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = meta;
        self
    }
}

/// A stored document as returned by queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: i64,
    pub source: String,
    pub uri: String,
    #[serde(default)]
    pub meta: Map<String, Value>,
    pub content: String,

    /// Relevance score (similarity or occurrence count); 0 for dumps
    #[serde(default)]
    pub score: f64,

    /// Set on insert and refreshed on replace
    pub inserted_at: DateTime<Utc>,
}

/// The capability set every memory backend provides.
#[async_trait]
pub trait Memory: Send + Sync {
    /// Backend name, used in logs and `doctor`.
    fn name(&self) -> &str;

    /// Insert or replace documents keyed by `(source, uri)`. Returns how many were written.
    async fn upsert(&self, docs: Vec<Document>) -> Result<usize, MemoryError>;

    /// Top-`k` records for `text`, best first; ties go to the most recent insertion.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// Convenience single-document upsert.
    async fn add(
        &self,
        content: &str,
        source: &str,
        uri: &str,
        meta: Map<String, Value>,
    ) -> Result<usize, MemoryError> {
        let doc = Document::new(source, uri, content).with_meta(meta);
        self.upsert(vec![doc]).await
    }

    /// The `n` most recently inserted records, newest first.
    async fn dump(&self, n: usize) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// Total record count.
    async fn count(&self) -> Result<usize, MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_defaults_when_deserialized() {
        let doc: Document = serde_json::from_value(serde_json::json!({
            "content": "remember this"
        }))
        .unwrap();
        assert_eq!(doc.source, "note");
        assert_eq!(doc.uri, "");
        assert!(doc.meta.is_empty());
    }

    #[test]
    fn record_serializes_score() {
        let record = MemoryRecord {
            id: 1,
            source: "a.md".into(),
            uri: "kb/a.md#0".into(),
            meta: Map::new(),
            content: "text".into(),
            score: 0.5,
            inserted_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["score"], 0.5);
        assert_eq!(json["uri"], "kb/a.md#0");
    }
}
