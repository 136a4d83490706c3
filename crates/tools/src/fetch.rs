//! Fetch a URL and extract readable text.
//!
//! HTML is reduced to text with a handful of regular expressions: comments
//! and non-content elements (`script`, `style`, `noscript`, `nav`, `svg`)
//! are dropped, block-level tags become line breaks, remaining tags are
//! stripped, entities are decoded and whitespace is collapsed. Non-HTML
//! bodies are returned as-is.

use async_trait::async_trait;
use regex_lite::{Captures, Regex};
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use stepwise_core::error::ToolError;
use stepwise_core::tool::Tool;
use tracing::debug;

const NAME: &str = "fetch";
const DROPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "nav", "svg", "head"];
const BLOCK_TAGS: &str = r"(?i)</?(p|div|br|hr|li|ul|ol|h[1-6]|tr|td|th|table|section|article|header|footer|main|aside|blockquote|pre)(\s[^>]*)?/?>";

/// The readable form of a fetched page.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub title: String,
    /// URL after redirects
    pub url: String,
    pub status: u16,
    pub text: String,
}

struct Extractor {
    comments: Regex,
    dropped: Vec<Regex>,
    title: Regex,
    blocks: Regex,
    tags: Regex,
    entities: Regex,
}

impl Extractor {
    fn new() -> Result<Self, regex_lite::Error> {
        let dropped = DROPPED_ELEMENTS
            .iter()
            .map(|tag| Regex::new(&format!(r"(?is)<{tag}(\s[^>]*)?>.*?</{tag}\s*>")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            comments: Regex::new(r"(?s)<!--.*?-->")?,
            dropped,
            title: Regex::new(r"(?is)<title(\s[^>]*)?>(.*?)</title\s*>")?,
            blocks: Regex::new(BLOCK_TAGS)?,
            tags: Regex::new(r"(?s)<[^>]*>")?,
            entities: Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);")?,
        })
    }

    fn title(&self, html: &str) -> String {
        self.title
            .captures(html)
            .and_then(|c| c.get(2))
            .map(|m| collapse_inline(&self.decode(m.as_str())))
            .unwrap_or_default()
    }

    fn text(&self, html: &str) -> String {
        let mut s = self.comments.replace_all(html, "").into_owned();
        for re in &self.dropped {
            s = re.replace_all(&s, "").into_owned();
        }
        let s = self.blocks.replace_all(&s, "\n");
        let s = self.tags.replace_all(&s, "");
        collapse_lines(&self.decode(&s))
    }

    fn decode(&self, s: &str) -> String {
        self.entities
            .replace_all(s, |caps: &Captures| decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string()))
            .into_owned()
    }
}

fn decode_entity(name: &str) -> Option<String> {
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)?
        }
    };
    Some(ch.to_string())
}

fn collapse_inline(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collapse_lines(s: &str) -> String {
    s.lines()
        .map(collapse_inline)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct FetchTool {
    client: reqwest::Client,
    extractor: Extractor,
}

impl FetchTool {
    pub fn new() -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(concat!("stepwise/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolError::failed(NAME, e))?;
        let extractor = Extractor::new().map_err(|e| ToolError::failed(NAME, e))?;
        Ok(Self { client, extractor })
    }

    pub async fn fetch(&self, url: &str) -> Result<Page, ToolError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidArguments(format!(
                "fetch needs an http(s) URL, got '{url}'"
            )));
        }

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::failed(NAME, e))?;
        let status = resp.status();
        let final_url = resp.url().to_string();
        if !status.is_success() {
            return Err(ToolError::failed(NAME, format!("HTTP {status} for {final_url}")));
        }

        let is_html = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("html"));
        let body = resp.text().await.map_err(|e| ToolError::failed(NAME, e))?;
        let looks_like_html = is_html || body.trim_start().starts_with('<');
        debug!(url = %final_url, status = status.as_u16(), bytes = body.len(), "Fetched");

        let (title, text) = if looks_like_html {
            (self.extractor.title(&body), self.extractor.text(&body))
        } else {
            (String::new(), body.trim().to_string())
        };

        Ok(Page {
            title,
            url: final_url,
            status: status.as_u16(),
            text,
        })
    }
}

#[async_trait]
impl Tool for FetchTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Fetch a web page and return {title, url, status, text} with readable text only."
    }

    fn input_example(&self) -> Value {
        json!({ "url": "https://example.com/article" })
    }

    async fn invoke(&self, input: Value) -> Result<Value, ToolError> {
        let url = input
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("fetch requires a 'url' string".into()))?;
        let page = self.fetch(url).await?;
        serde_json::to_value(page).map_err(|e| ToolError::failed(NAME, e))
    }
}
