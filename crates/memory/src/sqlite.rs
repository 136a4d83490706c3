//! SQLite vector store.
//!
//! A single table keyed by `(source, uri)` holding content, JSON metadata,
//! and the embedding as a little-endian `f32` blob. Similarity ranking is
//! done in-process with [`vector::rank_by_similarity`], which is fine for
//! the knowledge-base sizes a local agent deals with.
//!
//! Every write embeds first and validates dimensions for the whole batch,
//! then commits in one transaction, so a mismatch never leaves a partial
//! batch behind.

use crate::vector;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use stepwise_core::error::MemoryError;
use stepwise_core::memory::{Document, Memory, MemoryRecord};
use stepwise_core::provider::Provider;
use tracing::{debug, info};

const MIGRATION: &str = include_str!("../migrations/sqlite/001_create_docs.sql");

/// A SQLite-backed vector store.
pub struct SqliteMemory {
    pool: SqlitePool,
    table: String,
    dim: usize,
    provider: Arc<dyn Provider>,
}

impl SqliteMemory {
    /// Open (creating if needed) a store at `path`.
    ///
    /// `path` is either a filesystem path or a `sqlite:` URL; pass
    /// `"sqlite::memory:"` for an ephemeral database (useful for tests).
    pub async fn open(
        path: &str,
        table: &str,
        dim: usize,
        provider: Arc<dyn Provider>,
    ) -> Result<Self, MemoryError> {
        let in_memory = path.contains(":memory:");
        let options = if path.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(path)
                .map_err(|e| MemoryError::Storage(format!("Invalid SQLite URL: {e}")))?
        } else {
            if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .map_err(|e| MemoryError::Storage(format!("Failed to create {}: {e}", parent.display())))?;
            }
            SqliteConnectOptions::new().filename(path)
        };
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Each connection to :memory: is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 4 })
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self::from_pool(pool, table, dim, provider).await?;
        info!(path, table, dim, "SQLite memory backend initialized");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(
        pool: SqlitePool,
        table: &str,
        dim: usize,
        provider: Arc<dyn Provider>,
    ) -> Result<Self, MemoryError> {
        crate::validate_table_name(table)?;
        let store = Self {
            pool,
            table: table.to_string(),
            dim,
            provider,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create the record table and its index.
    async fn run_migrations(&self) -> Result<(), MemoryError> {
        let sql = MIGRATION
            .replace("{table}", &self.table)
            .replace("{dim}", &self.dim.to_string());
        sqlx::raw_sql(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::MigrationFailed(format!("{} table: {e}", self.table)))?;
        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Parse a record and its embedding from a row.
    fn row_to_record(row: &SqliteRow) -> Result<(MemoryRecord, Vec<f32>), MemoryError> {
        let col = |name: &str, e: sqlx::Error| MemoryError::QueryFailed(format!("{name} column: {e}"));

        let id: i64 = row.try_get("id").map_err(|e| col("id", e))?;
        let source: String = row.try_get("source").map_err(|e| col("source", e))?;
        let uri: String = row.try_get("uri").map_err(|e| col("uri", e))?;
        let meta_json: String = row.try_get("meta").map_err(|e| col("meta", e))?;
        let content: String = row.try_get("content").map_err(|e| col("content", e))?;
        let blob: Vec<u8> = row.try_get("embedding").map_err(|e| col("embedding", e))?;
        let inserted_at_str: String = row.try_get("inserted_at").map_err(|e| col("inserted_at", e))?;

        let meta: Map<String, Value> = serde_json::from_str(&meta_json).unwrap_or_default();
        let inserted_at = DateTime::parse_from_rfc3339(&inserted_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| MemoryError::QueryFailed(format!("inserted_at '{inserted_at_str}': {e}")))?;

        let record = MemoryRecord {
            id,
            source,
            uri,
            meta,
            content,
            score: 0.0,
            inserted_at,
        };
        Ok((record, vector::blob_to_embedding(&blob)))
    }

    async fn write(&self, docs: &[Document], embeddings: &[Vec<f32>]) -> Result<(), MemoryError> {
        let sql = format!(
            r#"
            INSERT INTO {t} (source, uri, meta, content, embedding, dim, inserted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(source, uri) DO UPDATE SET
                meta = excluded.meta,
                content = excluded.content,
                embedding = excluded.embedding,
                dim = excluded.dim,
                inserted_at = excluded.inserted_at
            "#,
            t = self.table
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MemoryError::Storage(format!("BEGIN failed: {e}")))?;

        for (doc, embedding) in docs.iter().zip(embeddings) {
            let meta = serde_json::to_string(&doc.meta)
                .map_err(|e| MemoryError::Storage(format!("Meta serialization: {e}")))?;
            let inserted_at = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
            sqlx::query(&sql)
                .bind(&doc.source)
                .bind(&doc.uri)
                .bind(&meta)
                .bind(&doc.content)
                .bind(vector::embedding_to_blob(embedding))
                .bind(embedding.len() as i64)
                .bind(&inserted_at)
                .execute(&mut *tx)
                .await
                .map_err(|e| MemoryError::Storage(format!("INSERT failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| MemoryError::Storage(format!("COMMIT failed: {e}")))
    }

    async fn fetch_all(&self, sql: &str, limit: Option<i64>) -> Result<Vec<SqliteRow>, MemoryError> {
        let mut query = sqlx::query(sql);
        if let Some(limit) = limit {
            query = query.bind(limit);
        }
        query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(e.to_string()))
    }
}

#[async_trait]
impl Memory for SqliteMemory {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn upsert(&self, docs: Vec<Document>) -> Result<usize, MemoryError> {
        if docs.is_empty() {
            return Ok(0);
        }
        let embeddings = vector::embed_documents(self.provider.as_ref(), &docs, self.dim).await?;
        self.write(&docs, &embeddings).await?;
        debug!(count = docs.len(), "Upserted documents");
        Ok(docs.len())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        let query_embedding = vector::embed_query(self.provider.as_ref(), text, self.dim).await?;

        let sql = format!(
            "SELECT id, source, uri, meta, content, embedding, inserted_at FROM {}",
            self.table
        );
        let candidates = self
            .fetch_all(&sql, None)
            .await?
            .iter()
            .map(Self::row_to_record)
            .collect::<Result<Vec<_>, _>>()?;

        vector::rank_by_similarity(candidates, &query_embedding, self.dim, k)
    }

    async fn dump(&self, n: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        let sql = format!(
            "SELECT id, source, uri, meta, content, embedding, inserted_at FROM {} \
             ORDER BY inserted_at DESC, id DESC LIMIT ?1",
            self.table
        );
        self.fetch_all(&sql, Some(n as i64))
            .await?
            .iter()
            .map(|row| Self::row_to_record(row).map(|(record, _)| record))
            .collect()
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        let sql = format!("SELECT COUNT(*) AS n FROM {}", self.table);
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("Count failed: {e}")))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| MemoryError::QueryFailed(e.to_string()))?;
        Ok(n as usize)
    }
}
