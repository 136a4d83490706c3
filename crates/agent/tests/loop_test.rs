use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use stepwise_agent::AgentLoop;
use stepwise_config::AgentConfig;
use stepwise_core::error::{ProviderError, ToolError};
use stepwise_core::event::{AgentEvent, EventBus};
use stepwise_core::message::Role;
use stepwise_core::test_util::ScriptedProvider;
use stepwise_core::tool::{Tool, ToolRegistry};
use stepwise_core::StepState;

struct Echo;

#[async_trait]
impl Tool for Echo {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Echo the input back"
    }
    fn input_example(&self) -> Value {
        json!({ "text": "hi" })
    }
    async fn invoke(&self, input: Value) -> Result<Value, ToolError> {
        Ok(input)
    }
}

struct Broken;

#[async_trait]
impl Tool for Broken {
    fn name(&self) -> &str {
        "broken"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn input_example(&self) -> Value {
        json!({})
    }
    async fn invoke(&self, _input: Value) -> Result<Value, ToolError> {
        Err(ToolError::failed("broken", "disk on fire"))
    }
}

/// Stands in for the MCP tool and records what the registry routed to it.
#[derive(Default)]
struct Namespace {
    seen: Mutex<Vec<Value>>,
}

#[async_trait]
impl Tool for Namespace {
    fn name(&self) -> &str {
        "mcp"
    }
    fn description(&self) -> &str {
        "Call a tool on an MCP server"
    }
    fn input_example(&self) -> Value {
        json!({ "server": "fs", "tool": "read_file", "arguments": {} })
    }
    async fn invoke(&self, input: Value) -> Result<Value, ToolError> {
        self.seen.lock().unwrap().push(input);
        Ok(json!({ "content": [{ "type": "text", "text": "file body" }] }))
    }
}

fn registry(namespace: Option<Arc<Namespace>>) -> Arc<ToolRegistry> {
    let mut r = ToolRegistry::new();
    r.register(Arc::new(Echo));
    r.register(Arc::new(Broken));
    if let Some(ns) = namespace {
        r.register_namespace(ns);
    }
    Arc::new(r)
}

fn agent(provider: Arc<ScriptedProvider>, tools: Arc<ToolRegistry>, max_steps: usize) -> AgentLoop {
    AgentLoop::new(
        provider,
        tools,
        AgentConfig {
            max_steps,
            ..AgentConfig::default()
        },
        Arc::new(EventBus::default()),
    )
}

const ECHO: &str = "```json\n{\"tool\": \"echo\", \"input\": {\"text\": \"ping\"}}\n```";

#[tokio::test]
async fn final_on_first_step() {
    let provider = Arc::new(ScriptedProvider::new(vec![r#"{"final": "42"}"#]));
    let outcome = agent(provider.clone(), registry(None), 8).run("answer").await;

    assert_eq!(outcome.state, StepState::Done);
    assert_eq!(outcome.answer, "42");
    assert_eq!(outcome.steps.len(), 1);
    assert!(outcome.steps[0].terminal);
    assert_eq!(provider.chat_calls(), 1);

    let first = &provider.seen()[0];
    assert_eq!(first[0].role, Role::System);
    assert!(first[0].content.contains("echo: Echo the input back"));
    assert!(first[0].content.ends_with("Recent notes:\n(no prior observations)"));
    assert_eq!(first[1].role, Role::User);
    assert_eq!(first[1].content, "answer");
}

#[tokio::test]
async fn tool_result_feeds_the_next_step() {
    let provider = Arc::new(ScriptedProvider::new(vec![ECHO, r#"{"final": "pong"}"#]));
    let outcome = agent(provider.clone(), registry(None), 8).run("ping it").await;

    assert_eq!(outcome.state, StepState::Done);
    assert_eq!(outcome.answer, "pong");
    assert_eq!(outcome.steps[0].tool.as_deref(), Some("echo"));
    assert_eq!(outcome.steps[0].observation, "ECHO RESULT:\n{\"text\":\"ping\"}");

    // system, user, assistant, tool
    let second = &provider.seen()[1];
    assert_eq!(second.len(), 4);
    assert_eq!(second[2].role, Role::Assistant);
    assert_eq!(second[3].role, Role::Tool);
    assert_eq!(second[3].tool_name.as_deref(), Some("echo"));
    assert!(second[0].content.ends_with("Recent notes:\nECHO RESULT:\n{\"text\":\"ping\"}"));
}

#[tokio::test]
async fn step_limit_is_exact() {
    for limit in [1, 3] {
        let provider = Arc::new(ScriptedProvider::repeating(ECHO));
        let outcome = agent(provider.clone(), registry(None), limit).run("loop forever").await;

        assert_eq!(outcome.state, StepState::DoneByLimit);
        assert_eq!(outcome.steps.len(), limit);
        assert_eq!(provider.chat_calls(), limit);
        assert!(outcome.steps.iter().rev().skip(1).all(|s| !s.terminal));
        assert!(outcome.steps[limit - 1].terminal);
        assert_eq!(
            outcome.answer,
            format!(
                "Stopped after {limit} steps without a final answer. Last observation: ECHO RESULT:\n{{\"text\":\"ping\"}}"
            )
        );
    }
}

#[tokio::test]
async fn malformed_reply_costs_one_step() {
    let provider = Arc::new(ScriptedProvider::new(vec!["I think the answer is 42", r#"{"final": "42"}"#]));
    let outcome = agent(provider.clone(), registry(None), 8).run("answer").await;

    assert_eq!(outcome.state, StepState::Done);
    assert_eq!(outcome.steps.len(), 2);
    assert!(outcome.steps[0].observation.starts_with("DECISION ERROR:"));
    assert_eq!(outcome.steps[0].tool, None);
    assert_eq!(outcome.answer, "42");
}

#[tokio::test]
async fn unknown_tool_is_a_decision_error() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        r#"{"tool": "teleport", "input": {}}"#,
        r#"{"final": "gave up"}"#,
    ]));
    let outcome = agent(provider, registry(None), 8).run("go").await;
    assert!(outcome.steps[0].observation.contains("teleport"));
    assert_eq!(outcome.steps.len(), 2);
}

#[tokio::test]
async fn tool_failure_becomes_an_observation() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        r#"{"tool": "broken", "input": {}}"#,
        r#"{"final": "could not read it"}"#,
    ]));
    let bus = Arc::new(EventBus::default());
    let mut events = bus.subscribe();
    let agent = AgentLoop::new(provider, registry(None), AgentConfig::default(), bus);
    let outcome = agent.run("read").await;

    assert_eq!(outcome.state, StepState::Done);
    assert_eq!(outcome.steps[0].tool.as_deref(), Some("broken"));
    assert!(outcome.steps[0].observation.starts_with("tool broken failed:"));
    assert!(outcome.steps[0].observation.contains("disk on fire"));

    let mut saw_error = false;
    while let Ok(event) = events.try_recv() {
        if let AgentEvent::Observation { is_error, .. } = event.as_ref() {
            saw_error |= *is_error;
        }
    }
    assert!(saw_error);
}

#[tokio::test]
async fn provider_failure_becomes_an_observation() {
    let provider = Arc::new(
        ScriptedProvider::new(vec![])
            .then_error(ProviderError::Unavailable {
                endpoint: "http://localhost:11434".into(),
                reason: "connection refused".into(),
            })
            .then_reply(r#"{"final": "recovered"}"#),
    );
    let outcome = agent(provider, registry(None), 8).run("hello").await;

    assert_eq!(outcome.state, StepState::Done);
    assert_eq!(outcome.steps.len(), 2);
    assert!(outcome.steps[0].observation.starts_with("MODEL ERROR:"));
    assert_eq!(outcome.answer, "recovered");
}

#[tokio::test]
async fn provider_down_for_every_step_still_terminates() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let outcome = agent(provider, registry(None), 2).run("hello").await;
    assert_eq!(outcome.state, StepState::DoneByLimit);
    assert_eq!(outcome.steps.len(), 2);
    assert!(outcome.answer.contains("MODEL ERROR"));
}

#[tokio::test]
async fn qualified_names_route_to_the_namespace_tool() {
    let ns = Arc::new(Namespace::default());
    let provider = Arc::new(ScriptedProvider::new(vec![
        r#"{"tool": "mcp:fs:read_file", "input": {"path": "notes.txt"}}"#,
        r#"{"final": "done"}"#,
    ]));
    let outcome = agent(provider, registry(Some(ns.clone())), 8).run("read notes").await;

    assert_eq!(outcome.state, StepState::Done);
    assert_eq!(outcome.steps[0].tool.as_deref(), Some("mcp:fs:read_file"));
    assert!(outcome.steps[0].observation.starts_with("MCP:FS:READ_FILE RESULT:"));
    assert_eq!(
        ns.seen.lock().unwrap()[0],
        json!({ "server": "fs", "tool": "read_file", "arguments": { "path": "notes.txt" } })
    );
}

#[tokio::test]
async fn long_observations_are_truncated() {
    let long = "x".repeat(50);
    let reply = format!(r#"{{"tool": "echo", "input": {{"text": "{long}"}}}}"#);
    let provider = Arc::new(ScriptedProvider::new(vec![reply.as_str(), r#"{"final": "ok"}"#]));
    let agent = AgentLoop::new(
        provider,
        registry(None),
        AgentConfig {
            observation_chars: 20,
            ..AgentConfig::default()
        },
        Arc::new(EventBus::default()),
    );
    let outcome = agent.run("echo").await;
    assert_eq!(outcome.steps[0].observation.chars().count(), 21);
    assert!(outcome.steps[0].observation.ends_with('…'));
}

#[tokio::test]
async fn events_trace_the_run() {
    let provider = Arc::new(ScriptedProvider::new(vec![ECHO, r#"{"final": "pong"}"#]));
    let bus = Arc::new(EventBus::default());
    let mut events = bus.subscribe();
    let agent = AgentLoop::new(provider, registry(None), AgentConfig::default(), bus);
    agent.run("ping").await;

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(match event.as_ref() {
            AgentEvent::StepStarted { .. } => "started",
            AgentEvent::ModelReplied { .. } => "replied",
            AgentEvent::ToolCalled { .. } => "tool",
            AgentEvent::Observation { .. } => "observed",
            AgentEvent::Finished { state, steps, .. } => {
                assert_eq!(*state, StepState::Done);
                assert_eq!(*steps, 2);
                "finished"
            }
        });
    }
    assert_eq!(
        kinds,
        vec!["started", "replied", "tool", "observed", "started", "replied", "finished"]
    );
}
