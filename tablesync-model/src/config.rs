//! Process-wide defaults and the TOML registration manifest.

use crate::entity::EntityDefinition;
use crate::error::ModelResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Data directory used when neither the entity type nor the config sets one.
pub const DEFAULT_DATA_DIR: &str = ".";

/// Defaults shared by every registered entity type.
///
/// Per-type settings on [`EntityDefinition`] always win over these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_key_attribute: Option<String>,
}

impl SyncConfig {
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_default_key_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.default_key_attribute = Some(attribute.into());
        self
    }
}

/// `[settings]` table of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_key_attribute: Option<String>,
    /// SQLite database file the command-line task opens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

/// Registration file declaring every support table of an application.
///
/// ```toml
/// [settings]
/// data_dir = "data"
///
/// [[entities]]
/// name = "colors"
/// table = "colors"
/// key_attribute = "name"
/// sources = ["colors.yml"]
///
/// [[entities]]
/// name = "things"
/// table = "things"
/// sources = ["things.csv"]
///
/// [[entities.references]]
/// column = "color_id"
/// target = "colors"
/// attribute = "color"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub settings: ManifestSettings,
    #[serde(default)]
    pub entities: Vec<EntityDefinition>,
}

impl Manifest {
    pub fn from_toml_str(text: &str) -> ModelResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads a manifest file. Relative `data_dir` and `database` settings are
    /// resolved against the manifest's own directory, which is also the data
    /// directory when none is configured.
    pub fn load(path: &Path) -> ModelResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut manifest = Self::from_toml_str(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let data_dir = match manifest.settings.data_dir.take() {
            Some(dir) => relative_to(base, dir),
            None => base.to_path_buf(),
        };
        manifest.settings.data_dir = Some(data_dir);
        manifest.settings.database = manifest
            .settings
            .database
            .take()
            .map(|db| relative_to(base, db));
        for entity in &mut manifest.entities {
            entity.data_dir = entity.data_dir.take().map(|dir| relative_to(base, dir));
        }
        Ok(manifest)
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            data_dir: self.settings.data_dir.clone(),
            default_key_attribute: self.settings.default_key_attribute.clone(),
        }
    }
}

fn relative_to(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
