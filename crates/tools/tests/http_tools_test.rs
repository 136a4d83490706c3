use serde_json::json;
use stepwise_config::SearchConfig;
use stepwise_core::{Tool, ToolError};
use stepwise_tools::etl::EtlTool;
use stepwise_tools::{FetchTool, SearchTool};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn search_for(server: &MockServer, key: Option<&str>) -> SearchTool {
    SearchTool::new(&SearchConfig {
        endpoint: format!("{}/search", server.uri()),
        api_key: key.map(str::to_string),
        num: 2,
    })
    .unwrap()
}

#[tokio::test]
async fn search_posts_query_with_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("X-API-KEY", "secret"))
        .and(body_partial_json(json!({ "q": "quartz 8127", "num": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "organic": [
                { "title": "One", "link": "https://one.example", "snippet": "s1" },
                { "title": "Two", "link": "https://two.example", "snippet": "s2" },
                { "title": "Three", "link": "https://three.example", "snippet": "s3" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = search_for(&server, Some("secret"))
        .invoke(json!({ "query": "quartz 8127" }))
        .await
        .unwrap();
    assert_eq!(
        out,
        json!([
            { "title": "One", "url": "https://one.example", "snippet": "s1" },
            { "title": "Two", "url": "https://two.example", "snippet": "s2" }
        ])
    );
}

#[tokio::test]
async fn search_http_error_is_execution_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = search_for(&server, Some("nope"))
        .invoke(json!({ "query": "x" }))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    assert!(err.to_string().contains("403"));
}

#[tokio::test]
async fn fetch_follows_redirects_and_extracts_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", format!("{}/new", server.uri())))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><head><title>Moved</title></head><body><p>Hello <i>there</i></p><script>x()</script></body></html>",
            "text/html; charset=utf-8",
        ))
        .mount(&server)
        .await;

    let tool = FetchTool::new().unwrap();
    let out = tool
        .invoke(json!({ "url": format!("{}/old", server.uri()) }))
        .await
        .unwrap();
    assert_eq!(out["title"], "Moved");
    assert_eq!(out["status"], 200);
    assert_eq!(out["text"], "Hello there");
    assert!(out["url"].as_str().unwrap().ends_with("/new"));
}

#[tokio::test]
async fn fetch_returns_plain_text_as_is() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("  line one\nline two  ", "text/plain"))
        .mount(&server)
        .await;

    let out = FetchTool::new()
        .unwrap()
        .invoke(json!({ "url": format!("{}/notes.txt", server.uri()) }))
        .await
        .unwrap();
    assert_eq!(out["text"], "line one\nline two");
    assert_eq!(out["title"], "");
}

#[tokio::test]
async fn fetch_non_success_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = FetchTool::new()
        .unwrap()
        .invoke(json!({ "url": server.uri() }))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn etl_reads_remote_csv() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/sales.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a,b\n1,x\n2,y\n3,z\n"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let tool = EtlTool::new(dir.path()).unwrap();
    let out = tool
        .invoke(json!({
            "op": "transform",
            "path": format!("{}/files/sales.csv", server.uri()),
            "transform": "reorder:b; limit:2",
            "save": {}
        }))
        .await
        .unwrap();

    assert_eq!(out["rows_affected"], 2);
    let saved = dir.path().join("transformed_sales.csv");
    assert_eq!(std::fs::read_to_string(saved).unwrap(), "b,a\nx,1\ny,2\n");
}
