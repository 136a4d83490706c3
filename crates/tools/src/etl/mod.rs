//! The `etl` tool: load CSV/JSON, reshape with the transform mini-language, save.
//!
//! Ops:
//! - `load_csv {path}` / `load_json {path}` → `{profile, path}`
//! - `transform {path, transform, save?: {format, path}}` →
//!   `{rows_affected, output_location, profile_before, profile_after}`
//!
//! `path` may be a local file or an http(s) URL. The input format follows the
//! extension and defaults to CSV; the save format defaults to the input's.

pub mod dsl;
pub mod io;
pub mod table;

pub use dsl::{Op, Transform};
pub use io::Format;
pub use table::Table;

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;
use stepwise_core::error::ToolError;
use stepwise_core::tool::Tool;
use thiserror::Error;
use tracing::info;

const NAME: &str = "etl";

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("{path}: {reason}")]
    Io { path: String, reason: String },

    #[error("download failed: {0}")]
    Http(String),

    #[error("{0}")]
    Format(String),

    #[error("bad transform: {0}")]
    Transform(String),
}

impl From<EtlError> for ToolError {
    fn from(e: EtlError) -> Self {
        match e {
            EtlError::Transform(_) => ToolError::InvalidArguments(e.to_string()),
            other => ToolError::failed(NAME, other),
        }
    }
}

/// What a completed transform did.
#[derive(Debug, Clone)]
pub struct TransformReport {
    pub rows_affected: usize,
    pub output_location: Option<PathBuf>,
    pub profile_before: Value,
    pub profile_after: Value,
}

impl TransformReport {
    pub fn to_json(&self) -> Value {
        json!({
            "rows_affected": self.rows_affected,
            "output_location": self.output_location.as_ref().map(|p| p.display().to_string()),
            "profile_before": self.profile_before,
            "profile_after": self.profile_after,
        })
    }
}

pub struct EtlTool {
    client: reqwest::Client,
    output_dir: PathBuf,
}

impl EtlTool {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ToolError::failed(NAME, e))?;
        Ok(Self {
            client,
            output_dir: output_dir.into(),
        })
    }

    /// Where an unnamed output for `source` goes: `<output_dir>/transformed_<basename>`.
    pub fn default_output(&self, source: &str) -> PathBuf {
        let trimmed = source.split(['?', '#']).next().unwrap_or(source);
        let base = trimmed
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or("output.csv");
        self.output_dir.join(format!("transformed_{base}"))
    }

    pub async fn load(&self, location: &str, format: Option<Format>) -> Result<(Table, Format), EtlError> {
        let format = format
            .or_else(|| Format::detect(location))
            .unwrap_or(Format::Csv);
        let text = io::read_source(&self.client, location).await?;
        Ok((io::parse_table(&text, format)?, format))
    }

    /// Load, transform and optionally save.
    pub async fn transform(
        &self,
        location: &str,
        transform: &Transform,
        save: Option<(Option<Format>, &Path)>,
    ) -> Result<TransformReport, EtlError> {
        let (mut table, input_format) = self.load(location, None).await?;
        let profile_before = table.profile();
        transform.apply(&mut table);

        let output_location = match save {
            Some((format, path)) => {
                let format = format
                    .or_else(|| Format::detect(&path.to_string_lossy()))
                    .unwrap_or(input_format);
                io::save_table(&table, format, path).await?;
                Some(path.to_path_buf())
            }
            None => None,
        };

        info!(
            source = location,
            rows = table.rows.len(),
            saved = output_location.is_some(),
            "ETL transform complete"
        );
        Ok(TransformReport {
            rows_affected: table.rows.len(),
            output_location,
            profile_before,
            profile_after: table.profile(),
        })
    }

    async fn invoke_load(&self, input: &Value, format: Format) -> Result<Value, ToolError> {
        let path = required_str(input, "path")?;
        let (table, _) = self.load(path, Some(format)).await?;
        Ok(json!({ "profile": table.profile(), "path": path }))
    }

    async fn invoke_transform(&self, input: &Value) -> Result<Value, ToolError> {
        let path = required_str(input, "path")?;
        let spec = input
            .get("transform")
            .or_else(|| input.get("spec"))
            .unwrap_or(&Value::Null);
        let transform = Transform::from_value(spec)?;

        let save = match input.get("save") {
            None | Some(Value::Null) => None,
            Some(save) => {
                let format = save
                    .get("format")
                    .and_then(Value::as_str)
                    .map(Format::parse)
                    .transpose()?;
                let out = save
                    .get("path")
                    .and_then(Value::as_str)
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| self.default_output(path));
                Some((format, out))
            }
        };

        let report = self
            .transform(path, &transform, save.as_ref().map(|(f, p)| (*f, p.as_path())))
            .await?;
        Ok(report.to_json())
    }
}

fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    input
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::InvalidArguments(format!("etl requires '{key}'")))
}

#[async_trait]
impl Tool for EtlTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Tabular ETL over CSV/JSON files or URLs. ops: load_csv {path}, load_json {path}, \
         transform {path, transform: \"reorder:a,b; rename:old->new; limit:N\", save?: {format, path}}."
    }

    fn input_example(&self) -> Value {
        json!({
            "op": "transform",
            "path": "data/sales.csv",
            "transform": "reorder:date,region; rename:unit_price->price; limit:10",
            "save": { "format": "csv", "path": "data/sales_clean.csv" }
        })
    }

    async fn invoke(&self, input: Value) -> Result<Value, ToolError> {
        match input.get("op").and_then(Value::as_str) {
            Some("load_csv") => self.invoke_load(&input, Format::Csv).await,
            Some("load_json") => self.invoke_load(&input, Format::Json).await,
            Some("transform" | "transform_csv" | "transform_json") => self.invoke_transform(&input).await,
            Some(other) => Err(ToolError::InvalidArguments(format!("unknown etl op: {other}"))),
            None => Err(ToolError::InvalidArguments("etl requires an 'op'".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SALES: &str = "order_id,date,region,product,units,unit_price\n\
        1,2024-01-02,north,widget,3,2.5\n\
        2,2024-01-03,south,gadget,1,10\n\
        3,2024-01-04,east,widget,7,2.5\n\
        4,2024-01-05,west,doohickey,2,4.75\n";

    #[tokio::test]
    async fn load_csv_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("sales.csv");
        fs::write(&src, SALES).unwrap();

        let tool = EtlTool::new(dir.path()).unwrap();
        let out = tool
            .invoke(json!({ "op": "load_csv", "path": src.to_str().unwrap() }))
            .await
            .unwrap();
        assert_eq!(out["profile"]["rows"], 4);
        assert_eq!(out["profile"]["columns"][0], "order_id");
        assert_eq!(out["profile"]["dtypes"]["unit_price"], "float");
    }

    #[tokio::test]
    async fn transform_and_save_csv() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("sales.csv");
        let out = dir.path().join("out/t.csv");
        fs::write(&src, SALES).unwrap();

        let tool = EtlTool::new(dir.path()).unwrap();
        let res = tool
            .invoke(json!({
                "op": "transform",
                "path": src.to_str().unwrap(),
                "spec": {
                    "select": ["date", "region", "product", "units", "unit_price"],
                    "rename": { "unit_price": "price" },
                    "limit": 3
                },
                "save": { "format": "csv", "path": out.to_str().unwrap() }
            }))
            .await
            .unwrap();

        assert_eq!(res["rows_affected"], 3);
        assert_eq!(res["profile_before"]["rows"], 4);
        assert_eq!(
            res["profile_after"]["columns"],
            json!(["date", "region", "product", "units", "price", "order_id"])
        );
        let text = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "date,region,product,units,price,order_id");
        assert_eq!(lines[1], "2024-01-02,north,widget,3,2.5,1");
    }

    #[tokio::test]
    async fn json_transform_without_save() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("customers.json");
        fs::write(
            &src,
            r#"[{"customer_id": 1, "name": "Ada", "address": {"city": "Oslo"}},
                {"customer_id": 2, "name": "Lin"},
                {"customer_id": 3, "name": "Bo"}]"#,
        )
        .unwrap();

        let tool = EtlTool::new(dir.path()).unwrap();
        let res = tool
            .invoke(json!({
                "op": "transform_json",
                "path": src.to_str().unwrap(),
                "transform": "reorder:name; rename:customer_id->cid; limit:2"
            }))
            .await
            .unwrap();
        assert_eq!(res["rows_affected"], 2);
        assert!(res["output_location"].is_null());
        assert_eq!(res["profile_after"]["columns"], json!(["name", "cid", "address.city"]));
    }

    #[tokio::test]
    async fn save_format_follows_extension_then_input() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("sales.csv");
        fs::write(&src, SALES).unwrap();
        let tool = EtlTool::new(dir.path().join("data")).unwrap();

        let json_out = dir.path().join("t.json");
        tool.transform(
            src.to_str().unwrap(),
            &Transform::parse("limit:1").unwrap(),
            Some((None, json_out.as_path())),
        )
        .await
        .unwrap();
        let back: Value = serde_json::from_str(&fs::read_to_string(&json_out).unwrap()).unwrap();
        assert_eq!(back[0]["product"], "widget");

        let res = tool
            .invoke(json!({ "op": "transform", "path": src.to_str().unwrap(), "transform": "limit:2", "save": {} }))
            .await
            .unwrap();
        let default_out = dir.path().join("data/transformed_sales.csv");
        assert_eq!(res["output_location"], default_out.display().to_string());
        assert!(fs::read_to_string(default_out).unwrap().starts_with("order_id,"));
    }

    #[tokio::test]
    async fn errors_are_classified() {
        let tool = EtlTool::new("data").unwrap();
        let err = tool
            .invoke(json!({ "op": "transform", "path": "x.csv", "transform": "explode:a" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let err = tool
            .invoke(json!({ "op": "load_csv", "path": "/no/such/file.csv" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));

        let err = tool.invoke(json!({ "op": "pivot" })).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn default_output_uses_basename() {
        let tool = EtlTool::new("data").unwrap();
        assert_eq!(
            tool.default_output("https://x.example/files/sales.csv?dl=1"),
            PathBuf::from("data/transformed_sales.csv")
        );
        assert_eq!(tool.default_output("./in/c.json"), PathBuf::from("data/transformed_c.json"));
    }
}
