//! Symbolic names for specific canonical rows.
//!
//! Data files written in the named form
//!
//! ```yaml
//! red:
//!   id: 1
//!   name: Red
//! ```
//!
//! give application code a stable way to refer to "the red row" without
//! hard-coding its key. The table is built once from the loaded records and
//! consulted through a generic accessor and predicate.

use crate::error::{ModelError, ModelResult};
use crate::record::{Attributes, CanonicalRecord};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;

/// A named canonical row.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedInstance {
    pub key: String,
    pub attributes: Attributes,
}

/// Lookup table from instance name to canonical key and attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedInstances {
    instances: IndexMap<String, NamedInstance>,
    keys: HashSet<String>,
}

impl NamedInstances {
    /// Builds the table from merged canonical records.
    ///
    /// Records without a name still count towards [`Self::is_protected`].
    pub fn from_records(records: &[CanonicalRecord]) -> ModelResult<Self> {
        let mut table = Self::default();
        for record in records {
            table.keys.insert(record.key.clone());
            let Some(name) = &record.name else {
                continue;
            };
            let name = name.to_ascii_lowercase();
            if !is_valid_instance_name(&name) {
                return Err(ModelError::InvalidName(name));
            }
            if let Some(existing) = table.instances.get(&name) {
                if existing.key != record.key {
                    return Err(ModelError::DuplicateName {
                        name,
                        first: existing.key.clone(),
                        second: record.key.clone(),
                    });
                }
            }
            table.instances.insert(
                name,
                NamedInstance {
                    key: record.key.clone(),
                    attributes: record.attributes.clone(),
                },
            );
        }
        Ok(table)
    }

    /// Canonical key of a named instance.
    pub fn key(&self, name: &str) -> Option<&str> {
        self.instances.get(name).map(|i| i.key.as_str())
    }

    /// Whether `key` is the key of the named instance.
    pub fn is(&self, name: &str, key: &str) -> bool {
        self.key(name) == Some(key)
    }

    /// An attribute of a named instance as defined in the data files.
    pub fn attribute(&self, name: &str, attribute: &str) -> Option<&Value> {
        self.instances.get(name)?.attributes.get(attribute)
    }

    pub fn get(&self, name: &str) -> Option<&NamedInstance> {
        self.instances.get(name)
    }

    /// Instance names in first-seen order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    /// Whether a row with this key is defined by the data files and will be
    /// rewritten by the next sync.
    pub fn is_protected(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// `[a-z_][a-z0-9_]*`
pub fn is_valid_instance_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
