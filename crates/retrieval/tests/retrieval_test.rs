use async_trait::async_trait;
use std::fs;
use std::sync::Arc;
use stepwise_config::RetrievalConfig;
use stepwise_core::provider::{ChatOptions, Provider};
use stepwise_core::test_util::ScriptedProvider;
use stepwise_core::{MemoryError, Message, ProviderError, Role};
use stepwise_memory::SqliteMemory;
use stepwise_retrieval::{ASK_SYSTEM_PROMPT, REFUSAL, RetrievalError, Retriever};

const DIM: usize = 256;

async fn sqlite_retriever(provider: Arc<ScriptedProvider>, config: RetrievalConfig) -> Retriever {
    let memory = SqliteMemory::open("sqlite::memory:", "docs", DIM, provider.clone())
        .await
        .unwrap();
    Retriever::new(Arc::new(memory), provider, config)
}

fn filler(words: usize, seed: &str) -> String {
    (0..words).map(|i| format!("{seed}{}", i % 37)).collect::<Vec<_>>().join(" ")
}

#[tokio::test]
async fn quartz_token_is_ranked_first() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("a.md"),
        format!("Inventory notes. The vault code is quartz-8127. {}", filler(50, "alpha")),
    )
    .unwrap();
    fs::write(dir.path().join("b.txt"), filler(120, "beta")).unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![]).with_dim(DIM));
    let retriever = sqlite_retriever(provider, RetrievalConfig::default()).await;

    let report = retriever.ingest(dir.path(), None).await.unwrap();
    assert_eq!(report.files, 2);
    assert_eq!(report.chunks, 2);

    let hits = retriever.show("quartz-8127", 3).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].source, "a.md");
    assert!(hits[0].content.contains("quartz-8127"));
    assert!(hits[0].score > hits[1].score);
}

#[tokio::test]
async fn ingest_is_idempotent_per_chunk() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("long.md"), filler(2000, "w")).unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![]).with_dim(DIM));
    let retriever = sqlite_retriever(provider, RetrievalConfig::default()).await;

    let first = retriever.ingest(dir.path(), None).await.unwrap();
    assert_eq!(first.chunks, 3);
    retriever.ingest(dir.path(), None).await.unwrap();
    assert_eq!(retriever.memory().count().await.unwrap(), 3);
}

#[tokio::test]
async fn ask_answers_only_from_context() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("policy.md"),
        "Privacy policy: never disclose social security numbers. \
         If asked for an SSN, answer that you don't know.",
    )
    .unwrap();
    fs::write(
        dir.path().join("people.md"),
        "Jane Roe lives in Springfield. Jane Roe's SSN is 078-05-1120.",
    )
    .unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![REFUSAL]).with_dim(DIM));
    let retriever = sqlite_retriever(provider.clone(), RetrievalConfig::default()).await;
    retriever.ingest(dir.path(), None).await.unwrap();

    let answer = retriever.ask("What is Jane Roe's SSN?", 6).await.unwrap();
    assert_eq!(answer.answer, REFUSAL);
    assert!(!answer.answer.contains("078-05-1120"));
    assert_eq!(answer.sources.len(), 2);

    let seen = provider.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0][0].role, Role::System);
    assert_eq!(seen[0][0].content, ASK_SYSTEM_PROMPT);
    assert!(seen[0][1].content.starts_with("QUESTION:\nWhat is Jane Roe's SSN?"));
    assert!(seen[0][1].content.contains("[policy.md]"));
}

#[tokio::test]
async fn dimension_mismatch_aborts_ingest_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.md"), "some text").unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![]).with_dim(16));
    let memory = SqliteMemory::open("sqlite::memory:", "docs", DIM, provider.clone())
        .await
        .unwrap();
    let retriever = Retriever::new(Arc::new(memory), provider, RetrievalConfig::default());

    let err = retriever.ingest(dir.path(), None).await.unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::Memory(MemoryError::DimensionMismatch { expected: DIM, actual: 16 })
    ));
    assert_eq!(retriever.memory().count().await.unwrap(), 0);
}

/// Embeds like the scripted provider until an input contains `marker`.
struct FailingOn {
    marker: &'static str,
    inner: ScriptedProvider,
}

#[async_trait]
impl Provider for FailingOn {
    fn name(&self) -> &str {
        "failing-on"
    }

    async fn chat(&self, messages: &[Message], options: ChatOptions) -> Result<String, ProviderError> {
        self.inner.chat(messages, options).await
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if inputs.iter().any(|i| i.contains(self.marker)) {
            return Err(ProviderError::Unavailable {
                endpoint: "http://localhost:11434".into(),
                reason: "connection refused".into(),
            });
        }
        self.inner.embed(inputs).await
    }
}

#[tokio::test]
async fn failed_embedding_in_a_later_file_stores_nothing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.md"), "first file embeds fine").unwrap();
    fs::write(dir.path().join("b.md"), "second file hits the outage").unwrap();

    let provider: Arc<dyn Provider> = Arc::new(FailingOn {
        marker: "outage",
        inner: ScriptedProvider::new(vec![]).with_dim(DIM),
    });
    let memory = SqliteMemory::open("sqlite::memory:", "docs", DIM, provider.clone())
        .await
        .unwrap();
    let retriever = Retriever::new(Arc::new(memory), provider, RetrievalConfig::default());

    let err = retriever.ingest(dir.path(), None).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Memory(MemoryError::EmbeddingFailed(_))));
    assert_eq!(retriever.memory().count().await.unwrap(), 0);
}

#[tokio::test]
async fn non_utf8_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("good.md"), "readable").unwrap();
    fs::write(dir.path().join("bad.md"), [0xffu8, 0xfe, 0x00]).unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![]).with_dim(DIM));
    let retriever = sqlite_retriever(provider, RetrievalConfig::default()).await;

    let report = retriever.ingest(dir.path(), None).await.unwrap();
    assert_eq!(report.files, 1);
    assert_eq!(report.skipped.len(), 1);
}
