//! Provider trait: the abstraction over the model service.
//!
//! A Provider knows how to send a conversation to a chat model and get the
//! reply text back, and how to turn texts into embedding vectors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// Per-request chat options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Temperature (0.0 = deterministic). `None` leaves the server default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
        }
    }
}

/// The core Provider trait.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name, used in logs.
    fn name(&self) -> &str;

    /// Send the full message sequence and return the reply text.
    async fn chat(&self, messages: &[Message], options: ChatOptions) -> Result<String, ProviderError>;

    /// Embed each input. The result has exactly one vector per input, in order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let _ = inputs;
        Err(ProviderError::NotConfigured(format!(
            "Provider '{}' does not support embeddings",
            self.name()
        )))
    }

    /// List model names the service reports as available.
    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    /// Check if the service is reachable.
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}

/// Embed a single text.
pub async fn embed_one(provider: &dyn Provider, text: &str) -> Result<Vec<f32>, ProviderError> {
    let mut vectors = provider.embed(&[text.to_string()]).await?;
    vectors
        .pop()
        .ok_or_else(|| ProviderError::MalformedResponse("no embedding returned".into()))
}
