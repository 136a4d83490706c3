//! Model provider implementations for stepwise.
//!
//! All providers implement the `stepwise_core::Provider` trait.

pub mod ollama;

pub use ollama::OllamaProvider;

use std::sync::Arc;
use stepwise_config::ProviderConfig;
use stepwise_core::{Provider, ProviderError};

/// Build the configured provider.
pub fn from_config(config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    Ok(Arc::new(OllamaProvider::new(config)?))
}
