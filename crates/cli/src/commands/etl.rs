//! `stepwise etl -p <path|url> -t "<transform>" [-l <out>]`

use std::path::Path;
use stepwise_tools::EtlTool;
use stepwise_tools::etl::Transform;

use super::{App, CmdResult};

pub async fn run(app: &App, source: &str, transform: &str, location: Option<&Path>) -> CmdResult {
    let transform = Transform::parse(transform)?;
    let tool = EtlTool::new(app.config.etl.output_dir.clone())?;
    let output = location
        .map(Path::to_path_buf)
        .unwrap_or_else(|| tool.default_output(source));

    let report = tool.transform(source, &transform, Some((None, output.as_path()))).await?;
    println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    Ok(())
}
