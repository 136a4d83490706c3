//! The `memory` tool: remember, recall and dump over the configured store.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use stepwise_core::error::ToolError;
use stepwise_core::memory::{Document, Memory};
use stepwise_core::tool::Tool;

const NAME: &str = "memory";
const DEFAULT_RECALL_K: usize = 5;
const DEFAULT_DUMP_LIMIT: usize = 50;

pub struct MemoryTool {
    memory: Arc<dyn Memory>,
}

impl MemoryTool {
    pub fn new(memory: Arc<dyn Memory>) -> Self {
        Self { memory }
    }

    async fn remember(&self, input: &Value) -> Result<Value, ToolError> {
        let docs = input
            .get("docs")
            .and_then(Value::as_array)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("remember requires a non-empty 'docs' list".into()))?;
        let docs: Vec<Document> = docs
            .iter()
            .map(|d| serde_json::from_value(d.clone()))
            .collect::<Result<_, _>>()
            .map_err(|e| ToolError::InvalidArguments(format!("bad document: {e}")))?;

        let count = self
            .memory
            .upsert(docs)
            .await
            .map_err(|e| ToolError::failed(NAME, e))?;
        Ok(json!({ "ok": true, "count": count }))
    }

    async fn recall(&self, input: &Value) -> Result<Value, ToolError> {
        let query = input.get("query").and_then(Value::as_str).unwrap_or_default();
        let k = usize_arg(input, "k").unwrap_or(DEFAULT_RECALL_K);
        let records = self
            .memory
            .query(query, k)
            .await
            .map_err(|e| ToolError::failed(NAME, e))?;
        serde_json::to_value(records).map_err(|e| ToolError::failed(NAME, e))
    }

    async fn dump(&self, input: &Value) -> Result<Value, ToolError> {
        let limit = usize_arg(input, "limit").unwrap_or(DEFAULT_DUMP_LIMIT);
        let records = self
            .memory
            .dump(limit)
            .await
            .map_err(|e| ToolError::failed(NAME, e))?;
        serde_json::to_value(records).map_err(|e| ToolError::failed(NAME, e))
    }
}

fn usize_arg(input: &Value, key: &str) -> Option<usize> {
    input.get(key).and_then(Value::as_u64).map(|n| n as usize)
}

#[async_trait]
impl Tool for MemoryTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Long-term memory. ops: remember {docs:[{content, source, uri, meta}]}, \
         recall {query, k}, dump {limit}."
    }

    fn input_example(&self) -> Value {
        json!({ "op": "recall", "query": "quartz batch results", "k": 5 })
    }

    async fn invoke(&self, input: Value) -> Result<Value, ToolError> {
        match input.get("op").and_then(Value::as_str) {
            Some("remember") => self.remember(&input).await,
            Some("recall") => self.recall(&input).await,
            Some("dump") => self.dump(&input).await,
            Some(other) => Err(ToolError::InvalidArguments(format!("unknown memory op: {other}"))),
            None => Err(ToolError::InvalidArguments("memory requires an 'op'".into())),
        }
    }
}
