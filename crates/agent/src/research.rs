//! Research: answer a question from memory, the web, or both, with
//! numbered citations.
//!
//! ```text
//! recall (k=5) ─▶ overlap gate ─┬─ nothing relevant ─▶ search + fetch            (web)
//!                               ├─ WH-question       ─▶ memory + 2 fetched pages  (mixed)
//!                               └─ otherwise         ─▶ memory only              (memory)
//!                  ─▶ numbered CONTEXT blocks ─▶ Provider::chat (cite [n] or refuse)
//! ```

use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use stepwise_core::error::Result;
use stepwise_core::memory::{Document, Memory, MemoryRecord};
use stepwise_core::message::Message;
use stepwise_core::provider::{ChatOptions, Provider};
use stepwise_core::tool::Tool;
use stepwise_retrieval::REFUSAL;
use tracing::{debug, info, warn};

pub const MIN_TOKEN_LEN: usize = 4;
/// Share of the question's tokens a memory hit must contain to count as relevant.
pub const MIN_OVERLAP: f64 = 0.2;
pub const MAX_CONTEXT_DOCS: usize = 5;
pub const SEARCH_RESULTS: usize = 5;
pub const FETCH_TOP: usize = 3;

const OVERLAP_CONTENT_CHARS: usize = 1500;
const BLOCK_CHARS: usize = 2000;
const BLEND_SEARCH: usize = 4;
const BLEND_FETCH: usize = 2;
const WH_WORDS: &[&str] = &[
    "who", "what", "when", "where", "which", "how", "is", "are", "did", "does",
];

pub const RESEARCH_SYSTEM_PROMPT: &str = "You are a precise research assistant. Answer the QUESTION using only the CONTEXT. \
Include bracketed citation numbers like [1], [2] that map to the provided context blocks. \
If the answer is not supported by CONTEXT, reply exactly: \"I don't know.\"";

/// Where the context of an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Web,
    Memory,
    Mixed,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Web => write!(f, "web"),
            Self::Memory => write!(f, "memory"),
            Self::Mixed => write!(f, "mixed"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchReport {
    pub origin: Origin,
    pub answer: String,
    /// `[n] <source or uri>`, one per context block
    pub citations: Vec<String>,
    pub used_docs: Vec<Document>,
}

pub struct Researcher {
    memory: Arc<dyn Memory>,
    provider: Arc<dyn Provider>,
    search: Arc<dyn Tool>,
    fetch: Arc<dyn Tool>,
}

impl Researcher {
    pub fn new(
        memory: Arc<dyn Memory>,
        provider: Arc<dyn Provider>,
        search: Arc<dyn Tool>,
        fetch: Arc<dyn Tool>,
    ) -> Self {
        Self {
            memory,
            provider,
            search,
            fetch,
        }
    }

    /// Research `question`.
    ///
    /// Search and fetch failures only shrink the context. With no context at
    /// all the answer is the refusal phrase and the model is not called.
    pub async fn research(&self, question: &str) -> Result<ResearchReport> {
        let hits = self.memory.query(question, MAX_CONTEXT_DOCS).await?;
        let relevant = relevant_hits(&hits, question);
        debug!(hits = hits.len(), relevant = relevant.len(), "Memory recall");

        let (origin, mut docs) = if relevant.is_empty() {
            (Origin::Web, self.search_and_fetch(question, SEARCH_RESULTS, FETCH_TOP).await)
        } else {
            let mut docs: Vec<Document> = relevant
                .into_iter()
                .map(|r| Document::new(&r.source, &r.uri, &r.content).with_meta(r.meta.clone()))
                .collect();
            if is_wh_question(question) {
                docs.extend(self.search_and_fetch(question, BLEND_SEARCH, BLEND_FETCH).await);
                (Origin::Mixed, docs)
            } else {
                docs.truncate(MAX_CONTEXT_DOCS);
                (Origin::Memory, docs)
            }
        };
        docs.truncate(MAX_CONTEXT_DOCS);
        info!(%origin, docs = docs.len(), "Research context ready");

        let citations = docs
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let label = if d.source.is_empty() { &d.uri } else { &d.source };
                format!("[{}] {label}", i + 1)
            })
            .collect();

        let answer = if docs.is_empty() {
            warn!("No context found, refusing");
            REFUSAL.to_string()
        } else {
            let messages = vec![
                Message::system(RESEARCH_SYSTEM_PROMPT),
                Message::user(format!(
                    "QUESTION:\n{question}\n\nCONTEXT (each block has a bracket number):\n\n{}",
                    context_blocks(&docs)
                )),
            ];
            self.provider
                .chat(&messages, ChatOptions::with_temperature(0.1))
                .await?
                .trim()
                .to_string()
        };

        Ok(ResearchReport {
            origin,
            answer,
            citations,
            used_docs: docs,
        })
    }

    /// Search, then fetch result pages until `n_fetch` have text, one page per domain.
    async fn search_and_fetch(&self, question: &str, n_search: usize, n_fetch: usize) -> Vec<Document> {
        let results = match self
            .search
            .invoke(json!({ "query": question, "num": n_search }))
            .await
        {
            Ok(Value::Array(results)) => results,
            Ok(other) => {
                warn!(result = %other, "Search returned no result list");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "Search failed");
                return Vec::new();
            }
        };

        let mut docs = Vec::new();
        let mut seen = HashSet::new();
        for hit in &results {
            let field = |k: &str| hit.get(k).and_then(Value::as_str).unwrap_or_default().trim();
            let url = match field("url") {
                "" => field("link"),
                url => url,
            };
            if url.is_empty() {
                continue;
            }
            let domain = domain_of(url);
            if !seen.insert(domain.to_string()) {
                continue;
            }

            let page = match self.fetch.invoke(json!({ "url": url })).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(url, error = %e, "Fetch failed, skipping");
                    continue;
                }
            };
            let text = page
                .get("text")
                .or_else(|| page.get("content"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !text.is_empty() {
                let source = [field("title"), page.get("title").and_then(Value::as_str).unwrap_or_default(), domain]
                    .into_iter()
                    .find(|s| !s.is_empty())
                    .unwrap_or(domain);
                docs.push(Document::new(source, url, text));
            }
            if docs.len() >= n_fetch {
                break;
            }
        }
        docs
    }
}

/// Lowercased `[a-z0-9]+` runs of at least [`MIN_TOKEN_LEN`] characters.
fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// Share of `query` tokens that also occur in `hay`.
fn overlap(query: &HashSet<String>, hay: &str) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let hay = tokens(hay);
    query.intersection(&hay).count() as f64 / query.len() as f64
}

fn relevant_hits<'a>(hits: &'a [MemoryRecord], question: &str) -> Vec<&'a MemoryRecord> {
    let query = tokens(question);
    hits.iter()
        .filter(|h| {
            let label = format!("{} {}", h.source, h.uri);
            let head: String = h.content.chars().take(OVERLAP_CONTENT_CHARS).collect();
            overlap(&query, &label).max(overlap(&query, &head)) >= MIN_OVERLAP
        })
        .take(MAX_CONTEXT_DOCS)
        .collect()
}

fn is_wh_question(question: &str) -> bool {
    question
        .trim_start()
        .split(|c: char| !c.is_alphanumeric())
        .next()
        .map(|w| WH_WORDS.contains(&w.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn domain_of(url: &str) -> &str {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let rest = rest.strip_prefix("www.").unwrap_or(rest);
    rest.split('/').next().unwrap_or(rest)
}

fn context_blocks(docs: &[Document]) -> String {
    docs.iter()
        .enumerate()
        .map(|(i, d)| {
            let text: String = d.content.chars().take(BLOCK_CHARS).collect();
            format!("[{}] SOURCE: {} | URI: {}\n{text}", i + 1, d.source, d.uri)
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
