//! Turning a model reply into a [`Decision`].
//!
//! The JSON object is located in this order:
//! 1. the last ```` ```json ```` fenced block,
//! 2. the whole reply,
//! 3. the span from the first `{` to the last `}`.
//!
//! `{"final": ...}` ends the run (a non-string value is rendered as compact
//! JSON). `{"tool": name, "input": {...}}` calls a tool that must resolve in
//! the registry. Anything else is a [`DecisionParseError`].

use serde_json::Value;
use stepwise_core::agent::{Decision, ToolCall};
use stepwise_core::error::DecisionParseError;
use stepwise_core::tool::ToolRegistry;

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// The text of the candidate JSON object in `reply`, if any.
pub fn extract_json(reply: &str) -> Option<&str> {
    if let Some(start) = reply.rfind(FENCE_OPEN) {
        let body = &reply[start + FENCE_OPEN.len()..];
        let body = match body.find(FENCE_CLOSE) {
            Some(end) => &body[..end],
            None => body,
        };
        let body = body.trim();
        if !body.is_empty() {
            return Some(body);
        }
    }

    let trimmed = reply.trim();
    if trimmed.starts_with('{') && serde_json::from_str::<Value>(trimmed).is_ok() {
        return Some(trimmed);
    }

    let first = reply.find('{')?;
    let last = reply.rfind('}')?;
    (last > first).then(|| &reply[first..=last])
}

pub fn parse_decision(reply: &str, registry: &ToolRegistry) -> Result<Decision, DecisionParseError> {
    let raw = extract_json(reply).ok_or(DecisionParseError::NoJson)?;
    let value: Value = serde_json::from_str(raw).map_err(|e| DecisionParseError::Malformed(e.to_string()))?;
    let Value::Object(mut obj) = value else {
        return Err(DecisionParseError::Malformed("expected a JSON object".into()));
    };

    if let Some(answer) = obj.remove("final") {
        let text = match answer {
            Value::String(s) => s,
            Value::Null => return Err(DecisionParseError::MissingField("final")),
            other => other.to_string(),
        };
        return Ok(Decision::Final(text));
    }

    let tool = match obj.remove("tool") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        Some(_) => return Err(DecisionParseError::Malformed("'tool' must be a non-empty string".into())),
        None => return Err(DecisionParseError::MissingField("tool")),
    };
    let input = match obj.remove("input") {
        Some(Value::Object(map)) => map,
        Some(_) => return Err(DecisionParseError::Malformed("'input' must be a JSON object".into())),
        None => return Err(DecisionParseError::MissingField("input")),
    };
    if !registry.contains(&tool) {
        return Err(DecisionParseError::UnknownTool(tool));
    }

    Ok(Decision::ToolCall(ToolCall { tool, input }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use stepwise_core::error::ToolError;
    use stepwise_core::tool::Tool;

    struct Named(&'static str);

    #[async_trait::async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "test tool"
        }
        fn input_example(&self) -> Value {
            json!({})
        }
        async fn invoke(&self, input: Value) -> Result<Value, ToolError> {
            Ok(input)
        }
    }

    fn registry() -> ToolRegistry {
        let mut r = ToolRegistry::new();
        r.register(Arc::new(Named("search")));
        r.register_namespace(Arc::new(Named("mcp")));
        r
    }

    #[test]
    fn last_fenced_block_wins() {
        let reply = "Thinking...\n```json\n{\"tool\":\"search\",\"input\":{\"query\":\"a\"}}\n```\n\
                     Actually:\n```json\n{\"final\":\"done\"}\n```";
        assert_eq!(parse_decision(reply, &registry()), Ok(Decision::Final("done".into())));
    }

    #[test]
    fn bare_and_embedded_json() {
        let r = registry();
        assert_eq!(
            parse_decision(r#"{"final": "plain"}"#, &r),
            Ok(Decision::Final("plain".into()))
        );
        let call = parse_decision(r#"Sure! {"tool": "search", "input": {"query": "x"}} hope that helps"#, &r).unwrap();
        match call {
            Decision::ToolCall(c) => {
                assert_eq!(c.tool, "search");
                assert_eq!(c.input["query"], "x");
            }
            other => panic!("expected a tool call, got {other:?}"),
        }
    }

    #[test]
    fn non_string_final_is_rendered_as_json() {
        let d = parse_decision(r#"{"final": {"rows": 3}}"#, &registry()).unwrap();
        assert_eq!(d, Decision::Final(r#"{"rows":3}"#.into()));
    }

    #[test]
    fn qualified_mcp_names_are_accepted() {
        let d = parse_decision(r#"{"tool": "mcp:fs:read_file", "input": {"path": "a"}}"#, &registry());
        assert!(matches!(d, Ok(Decision::ToolCall(_))));
    }

    #[test]
    fn malformed_replies() {
        let r = registry();
        assert_eq!(parse_decision("no json here", &r), Err(DecisionParseError::NoJson));
        assert!(matches!(
            parse_decision("```json\n{\"tool\": \"search\",\n```", &r),
            Err(DecisionParseError::Malformed(_))
        ));
        assert!(matches!(parse_decision("[1, 2]", &r), Err(DecisionParseError::NoJson)));
        assert_eq!(
            parse_decision(r#"{"tool": "teleport", "input": {}}"#, &r),
            Err(DecisionParseError::UnknownTool("teleport".into()))
        );
        assert_eq!(
            parse_decision(r#"{"tool": "search"}"#, &r),
            Err(DecisionParseError::MissingField("input"))
        );
        assert_eq!(
            parse_decision(r#"{"answer": "42"}"#, &r),
            Err(DecisionParseError::MissingField("tool"))
        );
        assert!(matches!(
            parse_decision(r#"{"tool": "search", "input": "q"}"#, &r),
            Err(DecisionParseError::Malformed(_))
        ));
    }
}
