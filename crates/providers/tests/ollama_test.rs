use serde_json::json;
use stepwise_config::ProviderConfig;
use stepwise_core::{ChatOptions, Message, Provider, ProviderError};
use stepwise_providers::OllamaProvider;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider_for(server: &MockServer) -> OllamaProvider {
    OllamaProvider::new(&ProviderConfig {
        base_url: server.uri(),
        timeout_secs: 5,
        ..ProviderConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn chat_uses_openai_compatible_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "llama3.1:8b", "temperature": 0.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello there!"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = provider_for(&server)
        .chat(&[Message::user("Hello")], ChatOptions::with_temperature(0.0))
        .await
        .unwrap();
    assert_eq!(reply, "Hello there!");
}

#[tokio::test]
async fn chat_falls_back_to_native_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"options": {"temperature": 0.5}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "{\"final\": \"native\"}"}
        })))
        .mount(&server)
        .await;

    let reply = provider_for(&server)
        .chat(&[Message::user("Hi")], ChatOptions::with_temperature(0.5))
        .await
        .unwrap();
    assert_eq!(reply, "{\"final\": \"native\"}");
}

#[tokio::test]
async fn chat_failure_on_both_endpoints_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .chat(&[Message::user("Hi")], ChatOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable { .. }));
    let msg = err.to_string();
    assert!(msg.contains("/v1/chat/completions"));
    assert!(msg.contains("/api/chat"));
}

#[tokio::test]
async fn connection_refused_is_unavailable() {
    let provider = OllamaProvider::new(&ProviderConfig {
        base_url: "http://127.0.0.1:9".into(),
        timeout_secs: 2,
        ..ProviderConfig::default()
    })
    .unwrap();
    let err = provider.embed(&["text".into()]).await.unwrap_err();
    assert!(err.to_string().starts_with("provider unavailable"));
}

#[tokio::test]
async fn embed_reads_openai_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"index": 0, "embedding": [0.1, 0.2, 0.3]},
                {"index": 1, "embedding": [0.4, 0.5, 0.6]}
            ]
        })))
        .mount(&server)
        .await;

    let vectors = provider_for(&server)
        .embed(&["a".into(), "b".into()])
        .await
        .unwrap();
    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[1], vec![0.4, 0.5, 0.6]);
}

#[tokio::test]
async fn embed_falls_back_to_native_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"model": "nomic-embed-text"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0]]
        })))
        .mount(&server)
        .await;

    let vectors = provider_for(&server).embed(&["a".into()]).await.unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0]]);
}

#[tokio::test]
async fn embed_count_mismatch_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embeddings": []})))
        .mount(&server)
        .await;

    let err = provider_for(&server).embed(&["a".into()]).await.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable { .. }));
    assert!(err.to_string().contains("expected 1 embeddings"));
}

#[tokio::test]
async fn list_models_reads_tags() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "llama3.1:8b"}, {"name": "nomic-embed-text:latest"}]
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    assert!(provider.health_check().await.unwrap());
    let models = provider.list_models().await.unwrap();
    assert_eq!(models, vec!["llama3.1:8b", "nomic-embed-text:latest"]);
}
