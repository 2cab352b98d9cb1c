use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute name to value, in the order the data file declared them.
pub type Attributes = serde_json::Map<String, Value>;

/// A record as defined by the canonical data files.
///
/// `key` is the stable string form of the key attribute's value (see
/// [`key_string`]), so `1` from YAML and `"1"` from CSV identify the same row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub key: String,
    /// Symbolic instance name when the record came from the named form
    /// (`red: {id: 1, ...}`) of a data file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub attributes: Attributes,
}

impl CanonicalRecord {
    pub fn new(key: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            key: key.into(),
            name: None,
            attributes,
        }
    }

    /// Returns an attribute value.
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }

    /// Shallow merge: attributes in `other` override ours.
    /// A name carried by `other` replaces ours.
    pub fn merge(&mut self, other: CanonicalRecord) {
        for (attribute, value) in other.attributes {
            self.attributes.insert(attribute, value);
        }
        if other.name.is_some() {
            self.name = other.name;
        }
    }
}

/// Stable, comparable string form of a key value.
///
/// Returns `None` for values that cannot identify a row: null, blank
/// strings, arrays and objects.
pub fn key_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
