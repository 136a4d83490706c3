//! In-memory backend: useful for tests and sessions without a database.
//!
//! Relevance is the case-insensitive occurrence count of the query text in
//! a record's content; no embeddings are involved.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use stepwise_core::error::MemoryError;
use stepwise_core::memory::{Document, Memory, MemoryRecord};
use tokio::sync::RwLock;

/// An in-memory store. Records are kept oldest first; a replaced record
/// moves to the end, so position doubles as recency.
pub struct InMemoryMemory {
    records: Arc<RwLock<Vec<MemoryRecord>>>,
    next_id: AtomicI64,
}

impl InMemoryMemory {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Memory for InMemoryMemory {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn upsert(&self, docs: Vec<Document>) -> Result<usize, MemoryError> {
        let mut records = self.records.write().await;
        let count = docs.len();
        for doc in docs {
            let id = match records
                .iter()
                .position(|r| r.source == doc.source && r.uri == doc.uri)
            {
                Some(pos) => records.remove(pos).id,
                None => self.next_id.fetch_add(1, Ordering::SeqCst),
            };
            records.push(MemoryRecord {
                id,
                source: doc.source,
                uri: doc.uri,
                meta: doc.meta,
                content: doc.content,
                score: 0.0,
                inserted_at: Utc::now(),
            });
        }
        Ok(count)
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return self.dump(k).await;
        }

        let records = self.records.read().await;
        // Newest first, so the stable sort below keeps recency order among equal counts
        let mut hits: Vec<MemoryRecord> = records
            .iter()
            .rev()
            .filter_map(|r| {
                let count = r.content.to_lowercase().matches(&needle).count();
                (count > 0).then(|| MemoryRecord {
                    score: count as f64,
                    ..r.clone()
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    async fn dump(&self, n: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        let records = self.records.read().await;
        Ok(records.iter().rev().take(n).cloned().collect())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn doc(uri: &str, content: &str) -> Document {
        Document::new("notes", uri, content)
    }

    #[tokio::test]
    async fn upsert_and_count() {
        let mem = InMemoryMemory::new();
        let n = mem
            .upsert(vec![doc("a", "alpha"), doc("b", "beta")])
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(mem.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn upsert_same_key_replaces() {
        let mem = InMemoryMemory::new();
        mem.upsert(vec![doc("a", "first")]).await.unwrap();
        mem.upsert(vec![doc("a", "second")]).await.unwrap();

        assert_eq!(mem.count().await.unwrap(), 1);
        let all = mem.dump(10).await.unwrap();
        assert_eq!(all[0].content, "second");
        assert_eq!(all[0].id, 1);
    }

    #[tokio::test]
    async fn query_ranks_by_occurrence_then_recency() {
        let mem = InMemoryMemory::new();
        mem.upsert(vec![
            doc("once-old", "Rust is fast"),
            doc("twice", "rust RUST"),
            doc("none", "python"),
            doc("once-new", "I like rust"),
        ])
        .await
        .unwrap();

        let hits = mem.query("Rust", 10).await.unwrap();
        let uris: Vec<&str> = hits.iter().map(|r| r.uri.as_str()).collect();
        assert_eq!(uris, vec!["twice", "once-new", "once-old"]);
        assert_eq!(hits[0].score, 2.0);
    }

    #[tokio::test]
    async fn query_respects_k() {
        let mem = InMemoryMemory::new();
        let docs = (0..10).map(|i| doc(&format!("d{i}"), "shared word")).collect();
        mem.upsert(docs).await.unwrap();
        assert_eq!(mem.query("shared", 3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn empty_query_returns_recent() {
        let mem = InMemoryMemory::new();
        mem.upsert(vec![doc("a", "first"), doc("b", "second")]).await.unwrap();
        let hits = mem.query("  ", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].uri, "b");
    }

    #[tokio::test]
    async fn replaced_record_becomes_most_recent() {
        let mem = InMemoryMemory::new();
        mem.upsert(vec![doc("a", "x"), doc("b", "y")]).await.unwrap();
        mem.add("x again", "notes", "a", Map::new()).await.unwrap();
        let recent = mem.dump(2).await.unwrap();
        assert_eq!(recent[0].uri, "a");
        assert_eq!(recent[1].uri, "b");
    }
}
