//! The transform mini-language.
//!
//! ```text
//! reorder:date,region,units; rename:units->qty,'unit price'->price; limit:10
//! ```
//!
//! Operations are separated by `;` and applied left to right. `select:` is
//! accepted as a synonym for `reorder:`. Names containing spaces or commas,
//! or purely numeric names, may be quoted with `'` or `"`.
//!
//! The object form `{"select": [...], "rename": {...}, "limit": N}` is also
//! accepted; it always applies select, then rename, then limit.

use serde_json::Value;

use super::EtlError;
use super::table::Table;

/// One transform step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Listed columns first (unknown names ignored), the rest after in their original order
    Reorder(Vec<String>),
    /// `(old, new)` pairs applied together
    Rename(Vec<(String, String)>),
    /// Keep the first N rows
    Limit(usize),
}

/// An ordered list of operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transform {
    pub ops: Vec<Op>,
}

impl Transform {
    /// Parse the `;`-separated string form.
    pub fn parse(text: &str) -> Result<Self, EtlError> {
        let mut ops = Vec::new();
        for part in text.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (kind, body) = part
                .split_once(':')
                .ok_or_else(|| EtlError::Transform(format!("expected '<op>:<args>', got '{part}'")))?;
            let body = body.trim();
            match kind.trim().to_ascii_lowercase().as_str() {
                "reorder" | "select" => {
                    let cols: Vec<String> = split_list(body).into_iter().map(unquote).collect();
                    if !cols.is_empty() {
                        ops.push(Op::Reorder(cols));
                    }
                }
                "rename" => {
                    let pairs = split_list(body)
                        .into_iter()
                        .map(parse_pair)
                        .collect::<Result<Vec<_>, _>>()?;
                    if !pairs.is_empty() {
                        ops.push(Op::Rename(pairs));
                    }
                }
                "limit" => {
                    let n = body
                        .parse::<usize>()
                        .map_err(|_| EtlError::Transform(format!("limit must be a non-negative integer, got '{body}'")))?;
                    ops.push(Op::Limit(n));
                }
                other => return Err(EtlError::Transform(format!("unknown transform op '{other}'"))),
            }
        }
        Ok(Self { ops })
    }

    /// Accept either the string form or the `{select, rename, limit}` object.
    pub fn from_value(value: &Value) -> Result<Self, EtlError> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::String(s) => Self::parse(s),
            Value::Object(obj) => {
                let mut ops = Vec::new();
                if let Some(select) = obj.get("select").or_else(|| obj.get("reorder")) {
                    let cols = match select {
                        Value::Array(items) => items.iter().map(value_to_name).collect(),
                        Value::String(s) => split_list(s).into_iter().map(unquote).collect(),
                        Value::Null => Vec::new(),
                        _ => return Err(EtlError::Transform("select must be a list of column names".into())),
                    };
                    if !cols.is_empty() {
                        ops.push(Op::Reorder(cols));
                    }
                }
                if let Some(rename) = obj.get("rename") {
                    let pairs: Vec<(String, String)> = match rename {
                        Value::Object(map) => map
                            .iter()
                            .map(|(old, new)| (old.clone(), value_to_name(new)))
                            .collect(),
                        Value::Null => Vec::new(),
                        _ => return Err(EtlError::Transform("rename must map old names to new names".into())),
                    };
                    if !pairs.is_empty() {
                        ops.push(Op::Rename(pairs));
                    }
                }
                match obj.get("limit") {
                    None | Some(Value::Null) => {}
                    Some(v) => {
                        let n = v
                            .as_u64()
                            .ok_or_else(|| EtlError::Transform(format!("limit must be a non-negative integer, got {v}")))?;
                        ops.push(Op::Limit(n as usize));
                    }
                }
                Ok(Self { ops })
            }
            other => Err(EtlError::Transform(format!(
                "transform must be a string or an object, got {other}"
            ))),
        }
    }

    pub fn apply(&self, table: &mut Table) {
        for op in &self.ops {
            match op {
                Op::Reorder(cols) => table.reorder(cols),
                Op::Rename(pairs) => table.rename(pairs),
                Op::Limit(n) => table.limit(*n),
            }
        }
    }
}

fn value_to_name(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Split on commas that are not inside quotes.
fn split_list(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, ',') => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    for q in ['\'', '"'] {
        if let Some(inner) = s.strip_prefix(q).and_then(|r| r.strip_suffix(q)) {
            return inner.to_string();
        }
    }
    s.to_string()
}

fn parse_pair(pair: &str) -> Result<(String, String), EtlError> {
    let (old, new) = pair
        .split_once("->")
        .ok_or_else(|| EtlError::Transform(format!("rename expects 'old->new', got '{pair}'")))?;
    let (old, new) = (unquote(old), unquote(new));
    if old.is_empty() || new.is_empty() {
        return Err(EtlError::Transform(format!("rename has an empty name in '{pair}'")));
    }
    Ok((old, new))
}
