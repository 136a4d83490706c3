//! PostgreSQL + pgvector store.
//!
//! Ranking happens inside the database with pgvector's cosine distance
//! operator (`<=>`); similarity is reported as `1 - distance`.
//!
//! # Setup
//!
//! The `vector` extension must be installable by the connecting role. The
//! schema in `migrations/postgres/001_create_docs.sql` is applied on open.
//!
//! # Feature gate
//!
//! This module is behind the `postgres` feature flag:
//!
//! ```toml
//! stepwise-memory = { workspace = true, features = ["postgres"] }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::sync::Arc;
use tracing::{debug, info};

use crate::vector;
use stepwise_core::error::MemoryError;
use stepwise_core::memory::{Document, Memory, MemoryRecord};
use stepwise_core::provider::Provider;

const MIGRATION: &str = include_str!("../migrations/postgres/001_create_docs.sql");

/// PostgreSQL memory backend.
pub struct PostgresMemory {
    pool: PgPool,
    table: String,
    dim: usize,
    provider: Arc<dyn Provider>,
}

impl PostgresMemory {
    /// Connect, apply the schema, and check the stored vector dimension.
    pub async fn connect(
        database_url: &str,
        table: &str,
        dim: usize,
        provider: Arc<dyn Provider>,
    ) -> Result<Self, MemoryError> {
        crate::validate_table_name(table)?;
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| MemoryError::Storage(format!("PostgreSQL connection failed: {e}")))?;

        let store = Self {
            pool,
            table: table.to_string(),
            dim,
            provider,
        };
        store.migrate().await?;
        store.check_column_dim().await?;
        info!(table, dim, "Connected to PostgreSQL for memory backend");
        Ok(store)
    }

    /// Run the schema migration.
    pub async fn migrate(&self) -> Result<(), MemoryError> {
        let sql = MIGRATION
            .replace("{table}", &self.table)
            .replace("{dim}", &self.dim.to_string());

        sqlx::raw_sql(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::MigrationFailed(format!("Migration failed: {e}")))?;

        debug!("Memory schema migration complete");
        Ok(())
    }

    /// A table created under another dimension cannot hold our vectors.
    async fn check_column_dim(&self) -> Result<(), MemoryError> {
        let row = sqlx::query(
            "SELECT atttypmod FROM pg_attribute \
             WHERE attrelid = $1::regclass AND attname = 'embedding'",
        )
        .bind(&self.table)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("embedding column lookup: {e}")))?;

        let typmod: i32 = row
            .try_get("atttypmod")
            .map_err(|e| MemoryError::QueryFailed(e.to_string()))?;
        if typmod > 0 && typmod as usize != self.dim {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dim,
                actual: typmod as usize,
            });
        }
        Ok(())
    }

    fn row_to_record(row: &PgRow) -> Result<MemoryRecord, MemoryError> {
        let col = |name: &str, e: sqlx::Error| MemoryError::QueryFailed(format!("{name} column: {e}"));

        let meta_json: String = row.try_get("meta").map_err(|e| col("meta", e))?;
        let meta: Map<String, Value> = serde_json::from_str(&meta_json).unwrap_or_default();
        let inserted_at: DateTime<Utc> = row.try_get("inserted_at").map_err(|e| col("inserted_at", e))?;

        Ok(MemoryRecord {
            id: row.try_get("id").map_err(|e| col("id", e))?,
            source: row.try_get("source").map_err(|e| col("source", e))?,
            uri: row.try_get("uri").map_err(|e| col("uri", e))?,
            meta,
            content: row.try_get("content").map_err(|e| col("content", e))?,
            score: row.try_get::<Option<f64>, _>("score").ok().flatten().unwrap_or(0.0),
            inserted_at,
        })
    }
}

#[async_trait]
impl Memory for PostgresMemory {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn upsert(&self, docs: Vec<Document>) -> Result<usize, MemoryError> {
        if docs.is_empty() {
            return Ok(0);
        }
        let embeddings = vector::embed_documents(self.provider.as_ref(), &docs, self.dim).await?;

        let sql = format!(
            r#"
            INSERT INTO {t} (source, uri, meta, content, embedding, inserted_at)
            VALUES ($1, $2, $3::jsonb, $4, $5::vector, clock_timestamp())
            ON CONFLICT (source, uri) DO UPDATE SET
                meta = EXCLUDED.meta,
                content = EXCLUDED.content,
                embedding = EXCLUDED.embedding,
                inserted_at = clock_timestamp()
            "#,
            t = self.table
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MemoryError::Storage(format!("BEGIN failed: {e}")))?;

        for (doc, embedding) in docs.iter().zip(&embeddings) {
            let meta = serde_json::to_string(&doc.meta)
                .map_err(|e| MemoryError::Storage(format!("Meta serialization: {e}")))?;
            sqlx::query(&sql)
                .bind(&doc.source)
                .bind(&doc.uri)
                .bind(&meta)
                .bind(&doc.content)
                .bind(vector::to_pgvector(embedding))
                .execute(&mut *tx)
                .await
                .map_err(|e| MemoryError::Storage(format!("INSERT failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| MemoryError::Storage(format!("COMMIT failed: {e}")))?;
        debug!(count = docs.len(), "Upserted documents");
        Ok(docs.len())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        let query_embedding = vector::embed_query(self.provider.as_ref(), text, self.dim).await?;

        let sql = format!(
            r#"
            SELECT id, source, uri, meta::text AS meta, content, inserted_at,
                   (1 - (embedding <=> $1::vector))::float8 AS score
            FROM {t}
            ORDER BY embedding <=> $1::vector, inserted_at DESC, id DESC
            LIMIT $2
            "#,
            t = self.table
        );

        let rows = sqlx::query(&sql)
            .bind(vector::to_pgvector(&query_embedding))
            .bind(k as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("Vector search failed: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn dump(&self, n: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        let sql = format!(
            "SELECT id, source, uri, meta::text AS meta, content, inserted_at \
             FROM {} ORDER BY inserted_at DESC, id DESC LIMIT $1",
            self.table
        );
        let rows = sqlx::query(&sql)
            .bind(n as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("Dump failed: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
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
