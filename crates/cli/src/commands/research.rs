//! `stepwise research`: cited answers from memory and the web.

use super::{App, CmdResult};

pub async fn run(app: &App, question: &str) -> CmdResult {
    if question.trim().is_empty() {
        return Err("question must not be empty".into());
    }
    let report = app.researcher()?.research(question).await?;

    println!("{}", report.answer);
    println!();
    println!("Origin: {}", report.origin);
    if !report.citations.is_empty() {
        println!("Citations:");
        for citation in &report.citations {
            println!("  {citation}");
        }
    }
    Ok(())
}
