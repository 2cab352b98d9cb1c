//! Format-specific decoding of one data source into attribute mappings.

use serde_json::Value;
use tablesync_model::{Attributes, SourceFormat};

/// One decoded record, before merging by key.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntry {
    /// Instance name when the source used the `name: {attributes}` form.
    pub name: Option<String>,
    pub attributes: Attributes,
}

/// Decodes source text.
///
/// YAML and JSON accept either a list of mappings or a mapping from instance
/// name to mapping; an empty document yields no records. CSV requires a
/// header row and yields string values only.
pub fn decode(format: SourceFormat, text: &str) -> Result<Vec<SourceEntry>, String> {
    match format {
        SourceFormat::Yaml => decode_yaml(text),
        SourceFormat::Json => decode_json(text),
        SourceFormat::Csv => decode_csv(text),
    }
}

fn decode_yaml(text: &str) -> Result<Vec<SourceEntry>, String> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
    let value = serde_json::to_value(yaml).map_err(|e| e.to_string())?;
    entries_from_value(value)
}

fn decode_json(text: &str) -> Result<Vec<SourceEntry>, String> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    entries_from_value(value)
}

fn decode_csv(text: &str) -> Result<Vec<SourceEntry>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers().map_err(|e| e.to_string())?.clone();

    let mut entries = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| e.to_string())?;
        let attributes = headers
            .iter()
            .zip(row.iter())
            .map(|(header, cell)| (header.to_string(), Value::String(cell.to_string())))
            .collect();
        entries.push(SourceEntry {
            name: None,
            attributes,
        });
    }
    Ok(entries)
}

fn entries_from_value(value: Value) -> Result<Vec<SourceEntry>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(attributes) => Ok(SourceEntry {
                    name: None,
                    attributes,
                }),
                other => Err(format!(
                    "record {index} is not a mapping: {}",
                    type_name(&other)
                )),
            })
            .collect(),
        Value::Object(named) => named
            .into_iter()
            .map(|(name, item)| match item {
                Value::Object(attributes) => Ok(SourceEntry {
                    name: Some(name),
                    attributes,
                }),
                other => Err(format!(
                    "instance {name:?} is not a mapping: {}",
                    type_name(&other)
                )),
            })
            .collect(),
        other => Err(format!(
            "expected a list or mapping of records, found {}",
            type_name(&other)
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}
