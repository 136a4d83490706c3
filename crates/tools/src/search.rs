//! Web search through the Serper API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use stepwise_config::SearchConfig;
use stepwise_core::error::ToolError;
use stepwise_core::tool::Tool;
use tracing::debug;

const NAME: &str = "search";

/// One organic search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub struct SearchTool {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    num: usize,
}

impl SearchTool {
    pub fn new(config: &SearchConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ToolError::failed(NAME, e))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            num: config.num.max(1),
        })
    }

    /// Run one query and return at most `num` hits in the order Serper ranked them.
    pub async fn search(&self, query: &str, num: usize) -> Result<Vec<SearchHit>, ToolError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ToolError::failed(NAME, "SERPER_API_KEY not set"))?;

        debug!(query, num, "Searching");
        let resp = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", api_key)
            .json(&json!({ "q": query, "num": num }))
            .send()
            .await
            .map_err(|e| ToolError::failed(NAME, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ToolError::failed(NAME, format!("HTTP {status}: {body}")));
        }
        let data: Value = resp.json().await.map_err(|e| ToolError::failed(NAME, e))?;
        Ok(parse_organic(&data, num))
    }
}

/// Map Serper's `organic` array onto [`SearchHit`]s.
fn parse_organic(data: &Value, num: usize) -> Vec<SearchHit> {
    let text = |item: &Value, keys: &[&str]| {
        keys.iter()
            .filter_map(|k| item.get(*k).and_then(Value::as_str))
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string()
    };

    data.get("organic")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| SearchHit {
                    title: text(item, &["title"]),
                    url: text(item, &["link", "url"]),
                    snippet: text(item, &["snippet", "snippetHighlighted"]),
                })
                .take(num)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Search the web. Returns a list of {title, url, snippet}."
    }

    fn input_example(&self) -> Value {
        json!({ "query": "rust async runtimes", "num": 5 })
    }

    async fn invoke(&self, input: Value) -> Result<Value, ToolError> {
        let query = input
            .get("query")
            .or_else(|| input.get("q"))
            .and_then(Value::as_str)
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("search requires a 'query' string".into()))?;
        let num = input
            .get("num")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(self.num);

        let hits = self.search(query, num).await?;
        serde_json::to_value(hits).map_err(|e| ToolError::failed(NAME, e))
    }
}
