use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether the reported row was inserted or updated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
}

/// Attribute changes applied to one row during a sync.
///
/// `changes` maps each changed attribute to `(old, new)`; for a created row
/// `old` is the column default (usually null). Rows that already matched
/// their canonical record produce no change record at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub key: String,
    pub kind: ChangeKind,
    pub changes: IndexMap<String, (Value, Value)>,
}

impl ChangeRecord {
    pub fn new(key: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            key: key.into(),
            kind,
            changes: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, attribute: impl Into<String>, old: Value, new: Value) {
        self.changes.insert(attribute.into(), (old, new));
    }

    pub fn get(&self, attribute: &str) -> Option<&(Value, Value)> {
        self.changes.get(attribute)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn is_created(&self) -> bool {
        self.kind == ChangeKind::Created
    }
}
