//! `stepwise ingest | add | show | ask | dump`: the knowledge base.

use std::path::Path;
use stepwise_retrieval::{render_records, split_patterns};

use super::{App, CmdResult};

const PREVIEW_CHARS: usize = 160;

pub async fn ingest(app: &App, path: &Path, globs: &[String]) -> CmdResult {
    if !path.exists() {
        return Err(format!("{} does not exist", path.display()).into());
    }
    let patterns = split_patterns(globs);
    let report = app
        .retriever()
        .ingest(path, (!patterns.is_empty()).then_some(patterns.as_slice()))
        .await?;

    println!("Ingested {} file(s), {} chunk(s).", report.files, report.chunks);
    for skipped in &report.skipped {
        eprintln!("  skipped {}", skipped.display());
    }
    Ok(())
}

pub async fn add(app: &App, text: &str, source: Option<&str>, uri: Option<&str>) -> CmdResult {
    if text.trim().is_empty() {
        return Err("nothing to add".into());
    }
    let stored = app.retriever().add(text, source, uri).await?;
    println!("Stored {stored} record(s).");
    Ok(())
}

pub async fn show(app: &App, query: &str, k: Option<usize>) -> CmdResult {
    let retriever = app.retriever();
    let k = k.unwrap_or_else(|| retriever.default_k());
    let records = retriever.show(query, k).await?;
    if records.is_empty() {
        println!("No matching records.");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&render_records(&records, PREVIEW_CHARS))?);
    Ok(())
}

pub async fn ask(app: &App, question: &str, k: Option<usize>) -> CmdResult {
    let retriever = app.retriever();
    let k = k.unwrap_or_else(|| retriever.default_k());
    let answer = retriever.ask(question, k).await?;

    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, record) in answer.sources.iter().enumerate() {
            println!("  [{}] {} ({})", i + 1, record.source, record.uri);
        }
    }
    Ok(())
}

pub async fn dump(app: &App, n: usize) -> CmdResult {
    let records = app.memory.dump(n).await?;
    let total = app.memory.count().await?;
    println!("{}", serde_json::to_string_pretty(&render_records(&records, PREVIEW_CHARS))?);
    eprintln!("  {} of {total} record(s)", records.len());
    Ok(())
}
