//! Memory backends for stepwise.
//!
//! All backends implement `stepwise_core::Memory`. [`from_config`] picks one
//! at startup; callers only ever see `Arc<dyn Memory>`.

pub mod in_memory;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryMemory;
pub use vector::{cosine_similarity, rank_by_similarity};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteMemory;

#[cfg(feature = "postgres")]
pub use postgres::PostgresMemory;

use std::sync::Arc;
use stepwise_config::{MemoryBackendKind, MemoryConfig};
use stepwise_core::error::MemoryError;
use stepwise_core::memory::Memory;
use stepwise_core::provider::Provider;

/// Build the configured memory backend.
///
/// The provider is used by vector backends to embed documents and queries.
pub async fn from_config(
    config: &MemoryConfig,
    provider: Arc<dyn Provider>,
) -> Result<Arc<dyn Memory>, MemoryError> {
    match config.backend {
        MemoryBackendKind::InMemory => {
            let _ = provider;
            Ok(Arc::new(InMemoryMemory::new()))
        }
        #[cfg(feature = "sqlite")]
        MemoryBackendKind::Sqlite => Ok(Arc::new(
            SqliteMemory::open(&config.sqlite_path, &config.table, config.embed_dim, provider).await?,
        )),
        #[cfg(feature = "postgres")]
        MemoryBackendKind::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| MemoryError::Storage("memory.database_url is not set".into()))?;
            Ok(Arc::new(
                PostgresMemory::connect(url, &config.table, config.embed_dim, provider).await?,
            ))
        }
        #[allow(unreachable_patterns)]
        other => Err(MemoryError::Storage(format!(
            "memory backend {other:?} is not compiled in (enable the matching cargo feature)"
        ))),
    }
}

/// Table names are interpolated into SQL, so only plain identifiers are allowed.
pub(crate) fn validate_table_name(name: &str) -> Result<(), MemoryError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(MemoryError::Storage(format!("invalid table name '{name}'")))
    }
}
