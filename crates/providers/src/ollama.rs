//! Ollama provider implementation.
//!
//! Talks to a local (or remote) Ollama server. Every call first tries the
//! OpenAI-compatible endpoint and falls back to Ollama's native API:
//!
//! | Operation | First | Fallback |
//! |---|---|---|
//! | chat | `POST /v1/chat/completions` | `POST /api/chat` |
//! | embed | `POST /v1/embeddings` | `POST /api/embed` |
//!
//! Any OpenAI-compatible server that implements only the first column
//! works as well. When both attempts fail the caller sees a single
//! [`ProviderError::Unavailable`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use stepwise_config::ProviderConfig;
use stepwise_core::error::ProviderError;
use stepwise_core::message::Message;
use stepwise_core::provider::{ChatOptions, Provider};
use tracing::{debug, warn};

/// A chat + embedding provider backed by an Ollama server.
pub struct OllamaProvider {
    base_url: String,
    chat_model: String,
    embed_model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a provider from the `[provider]` config section.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            embed_model: config.embed_model.clone(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect()
    }

    /// POST a JSON body and return the parsed JSON reply, mapping HTTP failures.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(format!("{url}: {e}"))
            } else {
                ProviderError::Network(format!("{url}: {e}"))
            }
        })?;

        let status = response.status().as_u16();
        if status == 404 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ModelNotFound(format!("{path}: {error_body}")));
        }
        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, path, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("{path}: {e}")))
    }

    async fn chat_openai(&self, messages: &[Message], options: ChatOptions) -> Result<String, ProviderError> {
        let mut body = json!({
            "model": self.chat_model,
            "messages": Self::to_api_messages(messages),
            "stream": false,
        });
        if let Some(t) = options.temperature {
            body["temperature"] = json!(t);
        }

        let reply: ApiResponse = serde_json::from_value(self.post_json("/v1/chat/completions", &body).await?)
            .map_err(|e| ProviderError::MalformedResponse(format!("chat completion: {e}")))?;

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse("no choices in chat completion".into()))
    }

    async fn chat_native(&self, messages: &[Message], options: ChatOptions) -> Result<String, ProviderError> {
        let mut body = json!({
            "model": self.chat_model,
            "messages": Self::to_api_messages(messages),
            "stream": false,
        });
        if let Some(t) = options.temperature {
            body["options"] = json!({ "temperature": t });
        }

        let reply = self.post_json("/api/chat", &body).await?;
        reply
            .pointer("/message/content")
            .or_else(|| reply.get("content"))
            .or_else(|| reply.get("response"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::MalformedResponse("no message content in /api/chat reply".into()))
    }

    async fn embed_openai(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let body = json!({
            "model": self.embed_model,
            "input": inputs,
            "encoding_format": "float",
        });
        let reply: EmbeddingApiResponse = serde_json::from_value(self.post_json("/v1/embeddings", &body).await?)
            .map_err(|e| ProviderError::MalformedResponse(format!("embeddings: {e}")))?;
        Ok(reply.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn embed_native(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let body = json!({
            "model": self.embed_model,
            "input": inputs,
        });
        let reply: NativeEmbedResponse = serde_json::from_value(self.post_json("/api/embed", &body).await?)
            .map_err(|e| ProviderError::MalformedResponse(format!("/api/embed: {e}")))?;
        Ok(reply.embeddings)
    }

    fn unavailable(&self, first: (&str, ProviderError), second: (&str, ProviderError)) -> ProviderError {
        ProviderError::Unavailable {
            endpoint: self.base_url.clone(),
            reason: format!("{}: {}; {}: {}", first.0, first.1, second.0, second.1),
        }
    }
}

fn check_count(vectors: Vec<Vec<f32>>, expected: usize) -> Result<Vec<Vec<f32>>, ProviderError> {
    if vectors.len() == expected {
        Ok(vectors)
    } else {
        Err(ProviderError::MalformedResponse(format!(
            "expected {expected} embeddings, got {}",
            vectors.len()
        )))
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(&self, messages: &[Message], options: ChatOptions) -> Result<String, ProviderError> {
        debug!(model = %self.chat_model, messages = messages.len(), "Sending chat request");

        let first = match self.chat_openai(messages, options).await {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };
        debug!(error = %first, "OpenAI-compatible chat failed, trying /api/chat");

        self.chat_native(messages, options)
            .await
            .map_err(|second| self.unavailable(("/v1/chat/completions", first), ("/api/chat", second)))
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.embed_model, count = inputs.len(), "Sending embedding request");

        let first = match self
            .embed_openai(inputs)
            .await
            .and_then(|v| check_count(v, inputs.len()))
        {
            Ok(vectors) => return Ok(vectors),
            Err(e) => e,
        };
        debug!(error = %first, "OpenAI-compatible embeddings failed, trying /api/embed");

        self.embed_native(inputs)
            .await
            .and_then(|v| check_count(v, inputs.len()))
            .map_err(|second| self.unavailable(("/v1/embeddings", first), ("/api/embed", second)))
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable {
                endpoint: self.base_url.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Ok(Vec::new());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let models = body["models"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable {
                endpoint: self.base_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(response.status().is_success())
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct NativeEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = ProviderConfig {
            base_url: "http://localhost:11434/".into(),
            ..ProviderConfig::default()
        };
        let provider = OllamaProvider::new(&config).unwrap();
        assert_eq!(provider.base_url(), "http://localhost:11434");
    }

    #[test]
    fn api_messages_use_lowercase_roles() {
        let messages = vec![Message::system("rules"), Message::tool(Some("search"), "obs")];
        let api = serde_json::to_value(OllamaProvider::to_api_messages(&messages)).unwrap();
        assert_eq!(api[0]["role"], "system");
        assert_eq!(api[1]["role"], "tool");
        assert_eq!(api[1]["content"], "obs");
    }

    #[test]
    fn embedding_count_is_checked() {
        assert!(check_count(vec![vec![0.0]], 1).is_ok());
        let err = check_count(vec![vec![0.0]], 2).unwrap_err();
        assert!(err.to_string().contains("expected 2"));
    }
}
