//! Permissive JSONC reader for the deploy-config file (spec.md §6).
//!
//! `bluelink.deploy.json` / `.jsonc`: `{"dependencies": {"<pluginID>":
//! "<versionOrConstraint>", ...}}`. Comments and trailing commas are
//! tolerated, since hand-edited deploy configs accumulate both. This module
//! is the one external-collaborator surface spec.md calls out as "worth
//! highlighting" (§9) even though the deploy-config's *loading* is out of
//! scope — the core's actual input is the parsed `PluginId` list this module
//! produces.

use crate::error::{Error, Result};
use crate::plugin_id::PluginId;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, serde::Deserialize)]
struct DeployConfigDocument {
    #[serde(default)]
    dependencies: HashMap<String, String>,
}

/// A parsed deploy-config: plugin identifiers paired with their declared
/// version or constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployConfig {
    pub dependencies: Vec<PluginId>,
}

impl DeployConfig {
    /// Parses `contents` (JSON, or JSON with `//`/`/* */` comments and
    /// trailing commas) into a `DeployConfig`. Each dependency key is parsed
    /// as a `PluginId` and, if it carries no version of its own, the
    /// corresponding value is attached via `PluginId::with_version`.
    pub fn parse(contents: &str) -> Result<Self> {
        let doc: DeployConfigDocument = json5::from_str(contents)
            .map_err(|e| Error::Other(format!("invalid deploy config: {e}")))?;

        let mut dependencies = Vec::with_capacity(doc.dependencies.len());
        let mut entries: Vec<(String, String)> = doc.dependencies.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (id_str, version_spec) in entries {
            let id = PluginId::parse(&id_str)?;
            let id = if id.version.is_empty() && !version_spec.is_empty() {
                id.with_version(version_spec)
            } else {
                id
            };
            dependencies.push(id);
        }

        Ok(DeployConfig { dependencies })
    }

    /// Reads and parses the deploy-config at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }
}
