//! Vector similarity utilities shared by the vector-backed stores.
//!
//! - Cosine similarity
//! - Dimension validation (every vector must match the configured dimension)
//! - Top-k ranking with most-recent-first tie-breaking
//! - Embedding documents and queries through a [`Provider`]

use std::cmp::Ordering;

use stepwise_core::error::MemoryError;
use stepwise_core::memory::{Document, MemoryRecord};
use stepwise_core::provider::Provider;

/// Inputs per embedding request.
pub const EMBED_BATCH: usize = 32;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the lengths differ, either vector is empty, or either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    dot / denom
}

/// Fail with `DimensionMismatch` unless `vector` has exactly `expected` components.
pub fn ensure_dim(expected: usize, vector: &[f32]) -> Result<(), MemoryError> {
    if vector.len() == expected {
        Ok(())
    } else {
        Err(MemoryError::DimensionMismatch {
            expected,
            actual: vector.len(),
        })
    }
}

/// Order records best first: score descending, then most recent insertion, then id.
pub fn compare_ranked(a: &MemoryRecord, b: &MemoryRecord) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.inserted_at.cmp(&a.inserted_at))
        .then_with(|| b.id.cmp(&a.id))
}

/// Rank stored records against a query embedding and keep the top `k`.
///
/// Every stored vector is checked against `dim` before any scoring, so a
/// store holding vectors of another dimension fails as a whole instead of
/// returning a partially garbled ranking.
pub fn rank_by_similarity(
    candidates: Vec<(MemoryRecord, Vec<f32>)>,
    query: &[f32],
    dim: usize,
    k: usize,
) -> Result<Vec<MemoryRecord>, MemoryError> {
    ensure_dim(dim, query)?;
    for (_, embedding) in &candidates {
        ensure_dim(dim, embedding)?;
    }

    let mut scored: Vec<MemoryRecord> = candidates
        .into_iter()
        .map(|(mut record, embedding)| {
            record.score = cosine_similarity(&embedding, query);
            record
        })
        .collect();

    scored.sort_by(compare_ranked);
    scored.truncate(k);
    Ok(scored)
}

/// Embed the content of each document, checking every vector's dimension.
pub async fn embed_documents(
    provider: &dyn Provider,
    docs: &[Document],
    dim: usize,
) -> Result<Vec<Vec<f32>>, MemoryError> {
    let mut vectors = Vec::with_capacity(docs.len());
    for batch in docs.chunks(EMBED_BATCH) {
        let inputs: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
        let embedded = provider
            .embed(&inputs)
            .await
            .map_err(|e| MemoryError::EmbeddingFailed(e.to_string()))?;
        if embedded.len() != inputs.len() {
            return Err(MemoryError::EmbeddingFailed(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                embedded.len()
            )));
        }
        vectors.extend(embedded);
    }
    for v in &vectors {
        ensure_dim(dim, v)?;
    }
    Ok(vectors)
}

/// Embed a query text, checking its dimension.
pub async fn embed_query(provider: &dyn Provider, text: &str, dim: usize) -> Result<Vec<f32>, MemoryError> {
    let vector = stepwise_core::provider::embed_one(provider, text)
        .await
        .map_err(|e| MemoryError::EmbeddingFailed(e.to_string()))?;
    ensure_dim(dim, &vector)?;
    Ok(vector)
}

/// Serialize an embedding vector to little-endian bytes.
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize little-endian bytes into an embedding vector.
pub fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Render an embedding as a pgvector literal: `[0.1,0.2,...]`.
pub fn to_pgvector(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}
