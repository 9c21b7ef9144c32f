//! Dependency graph resolution.
//!
//! Three-color DFS (unmarked / on-stack / done) over the dependency graph,
//! keyed by `PluginId::manifest_key()`. Cycles abort the whole resolution.
//! Conflicting requests for the same plugin are resolved first-writer-wins:
//! the first visit to a key decides the version for the rest of the run, and
//! later visits at the same key simply return (no negotiation).

use crate::error::{Error, Result};
use crate::manifest_store::ManifestStore;
use crate::plugin_id::PluginId;
use crate::registry::RegistryClient;
use crate::version::{Constraint, Version};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnStack,
    Done,
}

pub struct Resolver<'a> {
    registry: &'a dyn RegistryClient,
    manifest: &'a ManifestStore,
    os: String,
    arch: String,
    marks: HashMap<String, Mark>,
    result: Vec<PluginId>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        registry: &'a dyn RegistryClient,
        manifest: &'a ManifestStore,
        os: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        Resolver {
            registry,
            manifest,
            os: os.into(),
            arch: arch.into(),
            marks: HashMap::new(),
            result: Vec::new(),
        }
    }

    /// Resolve one root plugin identifier (and its transitive dependencies),
    /// returning the accumulated install order.
    pub fn resolve_all(mut self, root: &PluginId, token: &CancellationToken) -> Result<Vec<PluginId>> {
        self.visit(root, token)?;
        Ok(self.result)
    }

    /// Resolves one more root into the same traversal state, so a batch of
    /// independent roots shares `visited`/`on-stack` marks and a plugin
    /// common to two roots is resolved and emitted only once.
    pub fn visit_root(&mut self, root: &PluginId, token: &CancellationToken) -> Result<()> {
        self.visit(root, token)
    }

    pub fn into_result(self) -> Vec<PluginId> {
        self.result
    }

    #[instrument(skip(self, token), fields(key = %node.manifest_key()))]
    fn visit(&mut self, node: &PluginId, token: &CancellationToken) -> Result<()> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let key = node.manifest_key();

        match self.marks.get(&key) {
            Some(Mark::OnStack) => {
                return Err(Error::CircularDependency(key));
            }
            Some(Mark::Done) => return Ok(()),
            None => {}
        }
        self.marks.insert(key.clone(), Mark::OnStack);

        let resolved_version = resolve_version(self.registry, node, token)?;
        let resolved = node.with_version(resolved_version.to_string());

        if is_already_installed(self.manifest, &resolved)? {
            debug!(plugin = %resolved, "already installed, not re-emitting");
            self.marks.insert(key, Mark::Done);
            return Ok(());
        }

        let metadata = self.registry.get_package_metadata(
            &resolved.registry_host,
            &resolved.namespace,
            &resolved.name,
            &resolved_version.to_string(),
            &self.os,
            &self.arch,
            token,
        )?;

        let mut deps: Vec<(String, String)> = metadata.dependencies.into_iter().collect();
        deps.sort_by(|a, b| a.0.cmp(&b.0));

        for (dep_id_str, dep_version_spec) in deps {
            let mut dep_id = PluginId::parse(&dep_id_str)
                .map_err(|e| Error::Other(format!("in dependencies of {resolved}: {e}")))?;

            if dep_id.version.is_empty() && !dep_version_spec.is_empty() {
                dep_id = dep_id.with_version(dep_version_spec);
            }

            // Registry inheritance: an un-hosted dependency inherits the
            // parent's custom host; an explicitly hosted one keeps its own.
            if dep_id.registry_host == crate::plugin_id::DEFAULT_REGISTRY_HOST
                && resolved.registry_host != crate::plugin_id::DEFAULT_REGISTRY_HOST
            {
                dep_id = dep_id.with_host(resolved.registry_host.clone());
            }

            self.visit(&dep_id, token)?;
        }

        self.result.push(resolved);
        self.marks.insert(key, Mark::Done);
        Ok(())
    }

}

/// Resolves `node`'s version spec (empty / exact / constraint) against the
/// registry's descending version listing. Shared between the resolver's own
/// DFS and the installer's root-level already-installed pre-check (spec.md
/// §4.3 step 4, §9 Open Question (a)) so both resolve the same way.
pub(crate) fn resolve_version(
    registry: &dyn RegistryClient,
    node: &PluginId,
    token: &CancellationToken,
) -> Result<Version> {
    if node.version.is_empty() {
        let versions =
            registry.list_versions(&node.registry_host, &node.namespace, &node.name, token)?;
        let first = versions.first().ok_or_else(|| Error::VersionNotFound {
            plugin: node.manifest_key(),
            requirement: "(no version specified)".to_string(),
        })?;
        Version::parse(&first.version)
    } else if node.is_version_constraint() {
        let constraint = Constraint::parse(&node.version)?;
        let versions =
            registry.list_versions(&node.registry_host, &node.namespace, &node.name, token)?;
        let candidates: Vec<Version> = versions
            .iter()
            .filter_map(|v| Version::parse(&v.version).ok())
            .collect();
        constraint
            .find_best_match(candidates.iter())
            .cloned()
            .ok_or_else(|| Error::VersionNotFound {
                plugin: node.manifest_key(),
                requirement: node.version.clone(),
            })
    } else {
        Version::parse(&node.version)
    }
}

/// Whether `resolved` (an already-version-resolved id) matches the manifest
/// entry at its own `manifest_key`, i.e. is a no-op reinstall.
pub(crate) fn is_already_installed(manifest: &ManifestStore, resolved: &PluginId) -> Result<bool> {
    match manifest.get(&resolved.manifest_key())? {
        Some(record) => Ok(record.version == resolved.version),
        None => Ok(false),
    }
}
