use crate::config::{DEFAULT_DATA_DIR, SyncConfig};
use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Primary identity column assumed when a definition does not name one.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Describes one support table: where its canonical data lives and how its
/// rows are identified and related to other support tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDefinition {
    /// Unique entity type name used for ordering and reporting.
    pub name: String,
    /// Database table backing this entity type.
    pub table: String,
    /// Primary identity column; also the key attribute of last resort.
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Attribute that permanently identifies a canonical record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_attribute: Option<String>,
    /// Base directory for relative data source paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Data sources, merged in declaration order.
    #[serde(default)]
    pub sources: Vec<DataSource>,
    /// Entity types that must be synchronized first even though no
    /// reference declares it (e.g. join tables filled by custom logic).
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Reference-style fields pointing at other entity types.
    #[serde(default)]
    pub references: Vec<Reference>,
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

impl EntityDefinition {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: default_primary_key(),
            key_attribute: None,
            data_dir: None,
            sources: Vec::new(),
            dependencies: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn with_key_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.key_attribute = Some(attribute.into());
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_source(mut self, source: DataSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }

    /// Whether this entity type takes part in synchronization at all.
    pub fn participates(&self) -> bool {
        !self.sources.is_empty()
    }

    /// Key attribute with precedence: per-type override, then the
    /// process-wide default, then the primary identity column.
    pub fn resolve_key_attribute(&self, config: &SyncConfig) -> String {
        self.key_attribute
            .clone()
            .or_else(|| config.default_key_attribute.clone())
            .unwrap_or_else(|| self.primary_key.clone())
    }

    /// Base directory with precedence: per-type override, then the
    /// process-wide default, then the current directory.
    pub fn resolve_data_dir(&self, config: &SyncConfig) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| config.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    /// Absolute or data-dir-relative location of a source.
    pub fn resolve_source_path(&self, source: &DataSource, config: &SyncConfig) -> PathBuf {
        if source.path.is_absolute() {
            source.path.clone()
        } else {
            self.resolve_data_dir(config).join(&source.path)
        }
    }
}

/// File encodings a data source may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Yaml,
    Json,
    Csv,
}

impl SourceFormat {
    /// Infers the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yml" | "yaml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file holding canonical records.
///
/// Serialized as a bare path; the format always follows the extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct DataSource {
    pub path: PathBuf,
    pub format: SourceFormat,
}

impl DataSource {
    pub fn new(path: impl Into<PathBuf>) -> ModelResult<Self> {
        let path = path.into();
        let format =
            SourceFormat::from_path(&path).ok_or_else(|| ModelError::UnknownFormat(path.clone()))?;
        Ok(Self { path, format })
    }
}

impl TryFrom<PathBuf> for DataSource {
    type Error = ModelError;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl From<DataSource> for PathBuf {
    fn from(source: DataSource) -> Self {
        source.path
    }
}

/// A reference-style field: rows of this entity type point at rows of
/// `target` through `column`.
///
/// When `attribute` is set, canonical records may name the referenced row by
/// its key value under that attribute instead of hard-coding its primary
/// identity; the value is resolved at sync time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub column: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Reference {
    pub fn new(column: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            target: target.into(),
            attribute: None,
        }
    }

    /// Resolve the referenced row from its key value given under `attribute`.
    pub fn via(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}
