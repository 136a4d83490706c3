//! A small column-ordered table of JSON values.

use serde_json::{Map, Value, json};

use super::EtlError;

/// Rows of JSON values under a fixed, ordered set of column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build from records. Columns are the union of keys in first-seen order;
    /// missing cells are `null`.
    pub fn from_records(records: Vec<Map<String, Value>>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        let rows = records
            .into_iter()
            .map(|mut record| {
                columns
                    .iter()
                    .map(|c| record.remove(c).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    /// Build from a JSON array of objects, or a single object (one row).
    /// Nested objects are flattened into `.`-joined column names.
    pub fn from_values(value: &Value) -> Result<Self, EtlError> {
        let items: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![value],
            _ => {
                return Err(EtlError::Format(
                    "expected a JSON object or a list of objects".into(),
                ));
            }
        };

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let Value::Object(obj) = item else {
                return Err(EtlError::Format(format!("expected an object in the list, got {item}")));
            };
            let mut flat = Map::new();
            flatten_into(&mut flat, None, obj);
            records.push(flat);
        }
        Ok(Self::from_records(records))
    }

    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }

    pub fn reorder(&mut self, desired: &[String]) {
        let mut order: Vec<usize> = Vec::with_capacity(self.columns.len());
        for name in desired {
            if let Some(i) = self.columns.iter().position(|c| c == name) {
                if !order.contains(&i) {
                    order.push(i);
                }
            }
        }
        for i in 0..self.columns.len() {
            if !order.contains(&i) {
                order.push(i);
            }
        }

        self.columns = order.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            *row = order
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or(Value::Null))
                .collect();
        }
    }

    /// Apply every `(old, new)` pair at once, so `a->b,b->a` swaps names.
    pub fn rename(&mut self, pairs: &[(String, String)]) {
        for column in &mut self.columns {
            if let Some((_, new)) = pairs.iter().find(|(old, _)| old == column) {
                *column = new.clone();
            }
        }
    }

    pub fn limit(&mut self, n: usize) {
        self.rows.truncate(n);
    }

    /// Row count, column names, a per-column type summary and the first three rows.
    pub fn profile(&self) -> Value {
        let dtypes: Map<String, Value> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), Value::String(self.column_type(i).into())))
            .collect();
        let preview: Vec<Value> = self
            .to_records()
            .into_iter()
            .take(3)
            .map(Value::Object)
            .collect();
        json!({
            "rows": self.rows.len(),
            "columns": self.columns,
            "dtypes": dtypes,
            "preview": preview,
        })
    }

    fn column_type(&self, index: usize) -> &'static str {
        let mut kind: Option<&'static str> = None;
        for value in self.rows.iter().filter_map(|r| r.get(index)) {
            let this = match value {
                Value::Null => continue,
                Value::Bool(_) => "bool",
                Value::Number(n) if n.is_i64() || n.is_u64() => "int",
                Value::Number(_) => "float",
                Value::String(_) => "string",
                Value::Array(_) | Value::Object(_) => "object",
            };
            kind = match (kind, this) {
                (None, t) => Some(t),
                (Some(a), b) if a == b => Some(a),
                (Some("int"), "float") | (Some("float"), "int") => Some("float"),
                _ => return "mixed",
            };
        }
        kind.unwrap_or("null")
    }
}

fn flatten_into(out: &mut Map<String, Value>, prefix: Option<&str>, obj: &Map<String, Value>) {
    for (key, value) in obj {
        let name = match prefix {
            Some(p) => format!("{p}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(out, Some(&name), inner),
            other => {
                out.insert(name, other.clone());
            }
        }
    }
}
