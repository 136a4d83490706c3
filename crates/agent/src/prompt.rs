//! System prompt and observation text.

use serde_json::Value;
use stepwise_core::tool::ToolRegistry;

use crate::notes::Scratchpad;

pub const SYSTEM_PROMPT: &str = r#"You are a research and data agent. You work in steps.

On every step reply with exactly ONE JSON object inside a ```json fenced block, either a tool call:

```json
{"tool": "<tool name>", "input": { ... }}
```

or, when you can answer, the final answer:

```json
{"final": "<answer, citing sources and any saved dataset paths>"}
```

Tool results come back to you as tool messages. If a tool fails, read the error and adapt.
Tools on external MCP servers are named mcp:<server>:<tool>."#;

/// The system message for the next step: instructions, the available
/// tools, and the most recent notes.
pub fn system_prompt(registry: &ToolRegistry, notes: &Scratchpad) -> String {
    format!(
        "{SYSTEM_PROMPT}\n\nTOOLS:\n{}\n\nRecent notes:\n{}",
        registry.describe(),
        notes.render()
    )
}

/// Cut `text` to at most `max` characters, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// `<TOOL> RESULT:` followed by the result. Search hits become
/// `- title — url` lines; everything else is compact JSON.
pub fn render_tool_result(tool: &str, result: &Value) -> String {
    let header = format!("{} RESULT:", tool.to_uppercase());
    if tool == "search" {
        if let Some(hits) = result.as_array() {
            let lines: Vec<String> = hits
                .iter()
                .map(|h| {
                    let field = |k: &str| h.get(k).and_then(Value::as_str).unwrap_or_default();
                    format!("- {} — {}", field("title"), field("url"))
                })
                .collect();
            return format!("{header}\n{}", lines.join("\n"));
        }
    }
    format!("{header}\n{result}")
}
