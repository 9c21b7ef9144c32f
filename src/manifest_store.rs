//! The local on-disk record of installed plugins.
//!
//! `{pluginsRoot}/manifest.json`: `{"plugins": {"<host>/<ns>/<name>": {...}}}`.
//! A missing file, or a missing `plugins` key, is treated as an empty manifest.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstalledPluginRecord {
    pub id: String,
    pub version: String,
    #[serde(rename = "registryHost")]
    pub registry_host: String,
    pub shasum: String,
    #[serde(rename = "installedAt")]
    pub installed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ManifestDocument {
    #[serde(default)]
    plugins: HashMap<String, InstalledPluginRecord>,
}

/// Owns the manifest file at one plugins root. Each mutating call performs a
/// full read-modify-write; this is not safe for concurrent processes sharing
/// a plugins root — the caller is expected to serialize access.
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(plugins_root: impl AsRef<Path>) -> Self {
        ManifestStore {
            path: plugins_root.as_ref().join(MANIFEST_FILE_NAME),
        }
    }

    fn load(&self) -> Result<ManifestDocument> {
        if !self.path.exists() {
            return Ok(ManifestDocument::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(|e| Error::ManifestCorrupt {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Writes via a sibling temp file + rename so a crash mid-write never
    /// leaves `manifest.json` truncated or half-written.
    fn save(&self, doc: &ManifestDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(doc)?;

        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| MANIFEST_FILE_NAME.into());
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        {
            use std::io::Write;
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    pub fn get(&self, manifest_key: &str) -> Result<Option<InstalledPluginRecord>> {
        Ok(self.load()?.plugins.get(manifest_key).cloned())
    }

    pub fn list(&self) -> Result<Vec<InstalledPluginRecord>> {
        let mut records: Vec<_> = self.load()?.plugins.into_values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    pub fn insert(&self, manifest_key: &str, record: InstalledPluginRecord) -> Result<()> {
        let mut doc = self.load()?;
        doc.plugins.insert(manifest_key.to_string(), record);
        self.save(&doc)
    }

    /// Returns `true` if an entry was present and removed.
    pub fn remove(&self, manifest_key: &str) -> Result<bool> {
        let mut doc = self.load()?;
        let removed = doc.plugins.remove(manifest_key).is_some();
        if removed {
            self.save(&doc)?;
        }
        Ok(removed)
    }
}
