//! Loading and saving tables as CSV or JSON, locally or over HTTP.

use serde_json::Value;
use std::path::Path;
use tracing::debug;

use super::EtlError;
use super::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
}

impl Format {
    /// Guess from the extension of a path or URL (query strings ignored).
    pub fn detect(location: &str) -> Option<Self> {
        let path = location.split(['?', '#']).next().unwrap_or(location);
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn parse(name: &str) -> Result<Self, EtlError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(EtlError::Format(format!("unknown save format '{other}'"))),
        }
    }
}

pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Read the raw text at a local path or an http(s) URL.
pub async fn read_source(client: &reqwest::Client, location: &str) -> Result<String, EtlError> {
    if is_remote(location) {
        debug!(url = location, "Downloading ETL source");
        let resp = client
            .get(location)
            .send()
            .await
            .map_err(|e| EtlError::Http(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(EtlError::Http(format!("HTTP {status} for {location}")));
        }
        return resp.text().await.map_err(|e| EtlError::Http(e.to_string()));
    }
    tokio::fs::read_to_string(location).await.map_err(|e| EtlError::Io {
        path: location.to_string(),
        reason: e.to_string(),
    })
}

pub fn parse_table(text: &str, format: Format) -> Result<Table, EtlError> {
    match format {
        Format::Csv => parse_csv(text),
        Format::Json => {
            let value: Value = serde_json::from_str(text).map_err(|e| EtlError::Format(format!("invalid JSON: {e}")))?;
            Table::from_values(&value)
        }
    }
}

fn parse_csv(text: &str) -> Result<Table, EtlError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());
    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| EtlError::Format(format!("CSV header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| EtlError::Format(format!("CSV row: {e}")))?;
        let row = (0..columns.len())
            .map(|i| record.get(i).map(infer_cell).unwrap_or(Value::Null))
            .collect();
        rows.push(row);
    }
    Ok(Table { columns, rows })
}

/// Empty cells are null; integers and finite floats become numbers.
fn infer_cell(raw: &str) -> Value {
    let s = raw.trim();
    if s.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    Value::String(raw.to_string())
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn render_table(table: &Table, format: Format) -> Result<String, EtlError> {
    match format {
        Format::Json => {
            let records: Vec<Value> = table.to_records().into_iter().map(Value::Object).collect();
            serde_json::to_string_pretty(&records).map_err(|e| EtlError::Format(e.to_string()))
        }
        Format::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            let csv_err = |e: csv::Error| EtlError::Format(format!("CSV write: {e}"));
            writer.write_record(&table.columns).map_err(csv_err)?;
            for row in &table.rows {
                writer
                    .write_record(row.iter().map(cell_text))
                    .map_err(csv_err)?;
            }
            let bytes = writer
                .into_inner()
                .map_err(|e| EtlError::Format(format!("CSV flush: {e}")))?;
            String::from_utf8(bytes).map_err(|e| EtlError::Format(e.to_string()))
        }
    }
}

/// Write `table` to `path`, creating parent directories.
pub async fn save_table(table: &Table, format: Format, path: &Path) -> Result<(), EtlError> {
    let io_err = |e: std::io::Error| EtlError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let text = render_table(table, format)?;
    tokio::fs::write(path, text).await.map_err(io_err)?;
    debug!(path = %path.display(), rows = table.rows.len(), "Saved table");
    Ok(())
}
