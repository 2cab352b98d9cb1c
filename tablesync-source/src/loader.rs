use crate::decode::{SourceEntry, decode};
use crate::error::{SourceError, SourceResult};
use indexmap::IndexMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tablesync_model::{
    CanonicalRecord, DataSource, EntityDefinition, NamedInstances, SyncConfig, key_string,
};
use tracing::debug;

/// Loads canonical records for entity types.
#[derive(Debug, Clone, Default)]
pub struct CanonicalLoader {
    config: SyncConfig,
}

impl CanonicalLoader {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Reads and merges every data source of `definition`.
    pub fn load(&self, definition: &EntityDefinition) -> SourceResult<Vec<CanonicalRecord>> {
        let key_attribute = definition.resolve_key_attribute(&self.config);
        let mut sources = Vec::with_capacity(definition.sources.len());
        for source in &definition.sources {
            let path = definition.resolve_source_path(source, &self.config);
            let entries = self.read_source(&path, source)?;
            sources.push((path, entries));
        }
        let records = merge_entries(&key_attribute, sources)?;
        debug!(
            "Loaded {} canonical records for {} (key={})",
            records.len(),
            definition.name,
            key_attribute
        );
        Ok(records)
    }

    /// Key values of every canonical record, in first-seen order.
    pub fn instance_keys(&self, definition: &EntityDefinition) -> SourceResult<Vec<String>> {
        Ok(self.load(definition)?.into_iter().map(|r| r.key).collect())
    }

    /// Named-instance lookup table for `definition`.
    pub fn named_instances(&self, definition: &EntityDefinition) -> SourceResult<NamedInstances> {
        let records = self.load(definition)?;
        Ok(NamedInstances::from_records(&records)?)
    }

    fn read_source(&self, path: &Path, source: &DataSource) -> SourceResult<Vec<SourceEntry>> {
        let text = std::fs::read_to_string(path).map_err(|e| SourceError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        decode(source.format, &text).map_err(|message| SourceError::Parse {
            path: path.to_path_buf(),
            format: source.format,
            message,
        })
    }
}

/// Merges decoded sources by key value.
///
/// `sources` pairs each source's location (used in error messages) with its
/// decoded entries, in declaration order.
pub fn merge_entries(
    key_attribute: &str,
    sources: impl IntoIterator<Item = (PathBuf, Vec<SourceEntry>)>,
) -> SourceResult<Vec<CanonicalRecord>> {
    let mut merged: IndexMap<String, CanonicalRecord> = IndexMap::new();

    for (path, entries) in sources {
        for (index, entry) in entries.into_iter().enumerate() {
            let key = match entry.attributes.get(key_attribute) {
                Some(value @ (Value::Array(_) | Value::Object(_))) => {
                    return Err(SourceError::InvalidKey {
                        path,
                        key_attribute: key_attribute.to_string(),
                        index,
                        value: value.to_string(),
                    });
                }
                Some(value) => key_string(value),
                None => None,
            };
            let Some(key) = key else {
                return Err(SourceError::MissingKey {
                    path,
                    key_attribute: key_attribute.to_string(),
                    index,
                });
            };

            let record = CanonicalRecord {
                key: key.clone(),
                name: entry.name,
                attributes: entry.attributes,
            };
            match merged.get_mut(&key) {
                Some(existing) => existing.merge(record),
                None => {
                    merged.insert(key, record);
                }
            }
        }
    }

    Ok(merged.into_values().collect())
}
