//! Thin serialization of a result [`DataTable`] to the two wire formats
//! external callers consume.

use serde_json::{Map, Value as JsonValue};

use crate::table::DataTable;
use crate::value::Value;

fn cell_json(value: &Value) -> JsonValue {
    match value {
        Value::Text(None)
        | Value::Number(None)
        | Value::Boolean(None)
        | Value::Date(None)
        | Value::TimeOfDay(None)
        | Value::DateTime(None) => JsonValue::Null,
        Value::Text(Some(s)) => JsonValue::String(s.clone()),
        Value::Number(Some(n)) => serde_json::Number::from_f64(*n).map(JsonValue::Number).unwrap_or(JsonValue::Null),
        Value::Boolean(Some(b)) => JsonValue::Bool(*b),
        other => JsonValue::String(crate::format::default_display(other)),
    }
}

/// `{ "columns": [...], "rows": [[...], ...], "warnings": [...] }`. Cells
/// carry their formatted string when a FORMAT clause produced one, the raw
/// typed value otherwise.
pub fn to_json(table: &DataTable) -> JsonValue {
    let columns: Vec<JsonValue> = table
        .columns()
        .iter()
        .map(|c| {
            let mut obj = Map::new();
            obj.insert("id".to_string(), JsonValue::String(c.id.clone()));
            obj.insert("label".to_string(), JsonValue::String(c.label.clone()));
            obj.insert("type".to_string(), JsonValue::String(c.value_type.to_string()));
            JsonValue::Object(obj)
        })
        .collect();

    let rows: Vec<JsonValue> = table
        .rows()
        .iter()
        .map(|row| {
            JsonValue::Array(
                row.cells
                    .iter()
                    .map(|cell| match &cell.formatted_value {
                        Some(formatted) => JsonValue::String(formatted.clone()),
                        None => cell_json(&cell.value),
                    })
                    .collect(),
            )
        })
        .collect();

    let warnings: Vec<JsonValue> = table
        .warnings()
        .iter()
        .map(|w| {
            let mut obj = Map::new();
            obj.insert("reason".to_string(), JsonValue::String(w.reason.to_string()));
            obj.insert("message".to_string(), JsonValue::String(w.message.clone()));
            JsonValue::Object(obj)
        })
        .collect();

    let mut root = Map::new();
    root.insert("columns".to_string(), JsonValue::Array(columns));
    root.insert("rows".to_string(), JsonValue::Array(rows));
    root.insert("warnings".to_string(), JsonValue::Array(warnings));
    JsonValue::Object(root)
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Header row of column labels followed by one line per result row; cells
/// use their formatted string when present.
pub fn to_csv(table: &DataTable) -> String {
    let mut out = String::new();
    let header: Vec<String> = table.columns().iter().map(|c| csv_escape(&c.label)).collect();
    out.push_str(&header.join(","));
    out.push('\n');
    for row in table.rows() {
        let fields: Vec<String> = row
            .cells
            .iter()
            .map(|cell| {
                let text = cell.formatted_value.clone().unwrap_or_else(|| crate::format::default_display(&cell.value));
                csv_escape(&text)
            })
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}
