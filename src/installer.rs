//! Installer/Manager: orchestrates resolve → fetch → verify → extract →
//! record, and the matching uninstall path.

use crate::error::{Error, Result};
use crate::extract::extract_archive;
use crate::manifest_store::{InstalledPluginRecord, ManifestStore};
use crate::plugin_id::PluginId;
use crate::registry::{ProgressFn, RegistryClient};
use crate::resolver::{is_already_installed, resolve_version, Resolver};
use crate::verify::{sha256_file, verify_checksum, verify_signature};
use chrono::Utc;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    Resolving,
    Verifying,
    Extracting,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStatus {
    Skipped,
    Installed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct InstallResult {
    pub id: PluginId,
    pub status: InstallStatus,
    pub resolved_version: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallStatus {
    NotFound,
    Removed,
}

#[derive(Debug, Clone)]
pub struct UninstallResult {
    pub id: PluginId,
    pub status: UninstallStatus,
}

pub struct Installer {
    registry: Box<dyn RegistryClient>,
    manifest: ManifestStore,
    plugins_root: PathBuf,
    os: String,
    arch: String,
}

impl Installer {
    pub fn new(
        registry: Box<dyn RegistryClient>,
        plugins_root: impl Into<PathBuf>,
        os: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        let plugins_root = plugins_root.into();
        let manifest = ManifestStore::new(&plugins_root);
        Installer {
            registry,
            manifest,
            plugins_root,
            os: os.into(),
            arch: arch.into(),
        }
    }

    pub fn list(&self) -> Result<Vec<InstalledPluginRecord>> {
        self.manifest.list()
    }

    pub fn is_installed(&self, id: &PluginId) -> Result<Option<InstalledPluginRecord>> {
        self.manifest.get(&id.manifest_key())
    }

    /// Resolves each root (sharing resolver state across the whole batch so a
    /// dependency shared by two roots is installed only once), then installs
    /// the combined order sequentially. Stops at the first `Failed` result.
    ///
    /// Per spec.md §4.4 step 1 / §8 scenario S2, a root whose *resolved*
    /// version (§9 Open Question (a)) already matches the manifest short-
    /// circuits to a `Skipped` result here, before it ever enters the
    /// resolver's dependency walk — the resolver's own already-installed
    /// check (resolver.rs) exists only to suppress re-emitting *dependency*
    /// nodes that happen to already be on disk, not to report them back to
    /// the caller one by one.
    #[instrument(skip(self, progress, stage, token))]
    pub fn install_batch(
        &self,
        roots: &[PluginId],
        progress: &ProgressFn,
        stage: &dyn Fn(&PluginId, InstallStage),
        token: &CancellationToken,
    ) -> Result<Vec<InstallResult>> {
        let mut results = Vec::new();
        let mut pending_roots = Vec::new();

        for root in roots {
            let resolved_version = resolve_version(self.registry.as_ref(), root, token)?;
            let resolved = root.with_version(resolved_version.to_string());
            if is_already_installed(&self.manifest, &resolved)? {
                debug!(plugin = %resolved, "root already installed, skipping");
                results.push(InstallResult {
                    id: root.clone(),
                    status: InstallStatus::Skipped,
                    resolved_version: Some(resolved.version.clone()),
                    error: None,
                });
            } else {
                pending_roots.push(root.clone());
            }
        }

        let mut resolver = Resolver::new(self.registry.as_ref(), &self.manifest, &self.os, &self.arch);
        for root in &pending_roots {
            resolver.visit_root(root, token)?;
        }
        let order = resolver.into_result();

        for id in order {
            let result = self.install_single(&id, progress, stage, token);
            let failed = matches!(result.status, InstallStatus::Failed);
            results.push(result);
            if failed {
                break;
            }
        }
        Ok(results)
    }

    /// Installs only the roots that have no manifest entry at all yet (at
    /// any version) — a convenience over `install_batch` for syncing a
    /// deploy-config without retrying or upgrading what's already present.
    /// Roots already recorded in the manifest are left untouched, even if
    /// the recorded version doesn't satisfy the root's own version spec;
    /// that negotiation is `install_batch`'s job, not this one's.
    pub fn install_missing(
        &self,
        roots: &[PluginId],
        progress: &ProgressFn,
        stage: &dyn Fn(&PluginId, InstallStage),
        token: &CancellationToken,
    ) -> Result<Vec<InstallResult>> {
        let mut missing = Vec::new();
        for root in roots {
            if self.manifest.get(&root.manifest_key())?.is_none() {
                missing.push(root.clone());
            }
        }
        self.install_batch(&missing, progress, stage, token)
    }

    /// Installs one plugin already resolved to an exact version by the
    /// resolver — the resolver never emits an already-installed node (see
    /// `resolver::is_already_installed`), and `install_batch` filters
    /// already-installed roots before resolution, so `try_install` is only
    /// ever reached for plugins genuinely absent from the manifest.
    fn install_single(
        &self,
        id: &PluginId,
        progress: &ProgressFn,
        stage: &dyn Fn(&PluginId, InstallStage),
        token: &CancellationToken,
    ) -> InstallResult {
        match self.try_install(id, progress, stage, token) {
            Ok(resolved_version) => {
                stage(id, InstallStage::Complete);
                InstallResult {
                    id: id.clone(),
                    status: InstallStatus::Installed,
                    resolved_version: Some(resolved_version),
                    error: None,
                }
            }
            Err(e) => {
                warn!(plugin = %id, error = %e, "install failed");
                InstallResult {
                    id: id.clone(),
                    status: InstallStatus::Failed,
                    resolved_version: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn try_install(
        &self,
        id: &PluginId,
        progress: &ProgressFn,
        stage: &dyn Fn(&PluginId, InstallStage),
        token: &CancellationToken,
    ) -> Result<String> {
        stage(id, InstallStage::Resolving);
        let metadata = self.registry.get_package_metadata(
            &id.registry_host,
            &id.namespace,
            &id.name,
            &id.version,
            &self.os,
            &self.arch,
            token,
        )?;

        if metadata.shasums_url.is_empty() || metadata.shasums_signature_url.is_empty() {
            return Err(Error::SignatureMissing {
                plugin: id.manifest_key(),
            });
        }
        if metadata.signing_keys.is_empty() {
            return Err(Error::SigningKeysMissing {
                plugin: id.manifest_key(),
            });
        }

        let tmp_dir = tempfile::tempdir()?;
        let archive_path = tmp_dir.path().join(&metadata.filename);

        self.registry.download_package(
            &id.registry_host,
            &metadata,
            &archive_path,
            progress,
            token,
        )?;

        stage(id, InstallStage::Verifying);
        let shasums =
            self.registry
                .download_shasums(&id.registry_host, &metadata.shasums_url, token)?;
        let signature = self.registry.download_signature(
            &id.registry_host,
            &metadata.shasums_signature_url,
            token,
        )?;

        verify_signature(&shasums, &signature, &metadata.signing_keys, &id.manifest_key())?;
        verify_checksum(&archive_path, &shasums, &metadata.filename, &id.manifest_key())?;
        let shasum = sha256_file(&archive_path)?;

        stage(id, InstallStage::Extracting);
        let dest_dir = self
            .plugins_root
            .join("bin")
            .join(&id.namespace)
            .join(&id.name)
            .join(&id.version);
        extract_archive(&archive_path, &dest_dir, &id.manifest_key())?;

        self.manifest.insert(
            &id.manifest_key(),
            InstalledPluginRecord {
                id: id.manifest_key(),
                version: id.version.clone(),
                registry_host: id.registry_host.clone(),
                shasum,
                installed_at: Utc::now(),
            },
        )?;

        info!(plugin = %id, "installed");
        Ok(id.version.clone())
    }

    pub fn uninstall(&self, id: &PluginId) -> Result<UninstallResult> {
        let key = id.manifest_key();
        let record = match self.manifest.get(&key)? {
            Some(r) => r,
            None => {
                return Ok(UninstallResult {
                    id: id.clone(),
                    status: UninstallStatus::NotFound,
                });
            }
        };

        let version_dir = self
            .plugins_root
            .join("bin")
            .join(&id.namespace)
            .join(&id.name)
            .join(&record.version);
        if version_dir.exists() {
            std::fs::remove_dir_all(&version_dir)?;
        }

        // Walk upward removing newly-empty parents, but never `bin` itself.
        let mut dir = version_dir.parent().map(PathBuf::from);
        let bin_root = self.plugins_root.join("bin");
        while let Some(d) = dir {
            if d == bin_root {
                break;
            }
            match std::fs::read_dir(&d) {
                Ok(mut entries) if entries.next().is_none() => {
                    std::fs::remove_dir(&d)?;
                    dir = d.parent().map(PathBuf::from);
                }
                _ => break,
            }
        }

        self.manifest.remove(&key)?;

        Ok(UninstallResult {
            id: id.clone(),
            status: UninstallStatus::Removed,
        })
    }

    /// Uninstalls each id in the caller's supplied order.
    pub fn uninstall_batch(&self, ids: &[PluginId]) -> Vec<UninstallResult> {
        ids.iter()
            .map(|id| {
                self.uninstall(id).unwrap_or_else(|e| UninstallResult {
                    id: id.clone(),
                    status: {
                        warn!(plugin = %id, error = %e, "uninstall failed");
                        UninstallStatus::NotFound
                    },
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{PackageMetadata, VersionListing};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use sequoia_openpgp::cert::CertBuilder;
    use sequoia_openpgp::parse::Parse;
    use sequoia_openpgp::serialize::stream::{Message, Signer};
    use sequoia_openpgp::serialize::SerializeInto;
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::Path;
    use std::sync::Mutex;
    use tar::Builder;
    use tempfile::tempdir;

    fn build_signed_fixture(namespace: &str, name: &str, version: &str) -> (Vec<u8>, Vec<u8>, Vec<u8>, HashMap<String, String>) {
        let mut tarball = Vec::new();
        {
            let encoder = GzEncoder::new(&mut tarball, Compression::default());
            let mut builder = Builder::new(encoder);
            let contents = b"plugin payload";
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "payload.txt", &contents[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let shasum = {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(&tarball);
            hex::encode(hasher.finalize())
        };
        let filename = format!("{name}-{version}.tar.gz");
        let shasums = format!("{shasum}  {filename}\n").into_bytes();

        let (cert, _) = CertBuilder::general_purpose(None, Some(format!("{namespace}-{name}")))
            .generate()
            .unwrap();
        let signing_key = cert
            .primary_key()
            .key()
            .clone()
            .parts_into_secret()
            .unwrap()
            .into_keypair()
            .unwrap();

        let mut signature = Vec::new();
        {
            let message = Message::new(&mut signature);
            let signer = Signer::new(message, signing_key).detached().build().unwrap();
            let mut signer = signer;
            signer.write_all(&shasums).unwrap();
            signer.finalize().unwrap();
        }

        let armored = String::from_utf8(cert.armored().to_vec().unwrap()).unwrap();
        let mut signing_keys = HashMap::new();
        signing_keys.insert("key1".to_string(), armored);

        (tarball, shasums, signature, signing_keys)
    }

    struct FixtureRegistry {
        filename: String,
        tarball: Vec<u8>,
        shasums: Vec<u8>,
        signature: Vec<u8>,
        signing_keys: HashMap<String, String>,
        download_calls: Mutex<u32>,
    }

    impl RegistryClient for FixtureRegistry {
        fn list_versions(
            &self,
            _host: &str,
            _namespace: &str,
            _name: &str,
            _token: &CancellationToken,
        ) -> Result<Vec<VersionListing>> {
            Ok(vec![])
        }

        fn get_package_metadata(
            &self,
            _host: &str,
            _namespace: &str,
            _name: &str,
            _version: &str,
            _os: &str,
            _arch: &str,
            _token: &CancellationToken,
        ) -> Result<PackageMetadata> {
            Ok(PackageMetadata {
                filename: self.filename.clone(),
                download_url: String::new(),
                shasum: String::new(),
                shasums_url: "shasums.txt".to_string(),
                shasums_signature_url: "shasums.txt.sig".to_string(),
                signing_keys: self.signing_keys.clone(),
                dependencies: HashMap::new(),
            })
        }

        fn download_package(
            &self,
            _host: &str,
            _metadata: &PackageMetadata,
            dest_path: &Path,
            progress: &ProgressFn,
            _token: &CancellationToken,
        ) -> Result<()> {
            *self.download_calls.lock().unwrap() += 1;
            std::fs::write(dest_path, &self.tarball)?;
            progress(self.tarball.len() as u64, self.tarball.len() as u64);
            Ok(())
        }

        fn download_shasums(&self, _host: &str, _url: &str, _token: &CancellationToken) -> Result<Vec<u8>> {
            Ok(self.shasums.clone())
        }

        fn download_signature(&self, _host: &str, _url: &str, _token: &CancellationToken) -> Result<Vec<u8>> {
            Ok(self.signature.clone())
        }
    }

    #[test]
    fn simple_install_succeeds_and_records_manifest() {
        let (tarball, shasums, signature, signing_keys) =
            build_signed_fixture("bluelink", "aws", "1.0.0");
        let registry = FixtureRegistry {
            filename: "aws-1.0.0.tar.gz".to_string(),
            tarball,
            shasums,
            signature,
            signing_keys,
            download_calls: Mutex::new(0),
        };

        let plugins_root = tempdir().unwrap();
        let installer = Installer::new(Box::new(registry), plugins_root.path(), "linux", "amd64");
        let id = PluginId::parse("bluelink/aws@1.0.0").unwrap();

        let results = installer
            .install_batch(
                &[id.clone()],
                &|_downloaded, _total| {},
                &|_id, _stage| {},
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, InstallStatus::Installed);
        let record = installer.is_installed(&id).unwrap().unwrap();
        assert_eq!(record.version, "1.0.0");
        assert!(plugins_root
            .path()
            .join("bin/bluelink/aws/1.0.0/payload.txt")
            .exists());
    }

    #[test]
    fn skip_already_installed_makes_no_download_call() {
        let (tarball, shasums, signature, signing_keys) =
            build_signed_fixture("bluelink", "aws", "1.0.0");
        let registry = FixtureRegistry {
            filename: "aws-1.0.0.tar.gz".to_string(),
            tarball,
            shasums,
            signature,
            signing_keys,
            download_calls: Mutex::new(0),
        };

        let plugins_root = tempdir().unwrap();
        let id = PluginId::parse("bluelink/aws@1.0.0").unwrap();
        let manifest = ManifestStore::new(plugins_root.path());
        manifest
            .insert(
                &id.manifest_key(),
                InstalledPluginRecord {
                    id: id.manifest_key(),
                    version: "1.0.0".to_string(),
                    registry_host: id.registry_host.clone(),
                    shasum: "existing".to_string(),
                    installed_at: Utc::now(),
                },
            )
            .unwrap();

        let installer = Installer::new(Box::new(registry), plugins_root.path(), "linux", "amd64");
        let results = installer
            .install_batch(
                &[id],
                &|_d, _t| {},
                &|_id, _stage| {},
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, InstallStatus::Skipped);
    }

    #[test]
    fn install_missing_skips_plugins_already_in_manifest() {
        let (tarball, shasums, signature, signing_keys) =
            build_signed_fixture("bluelink", "aws", "1.0.0");
        let registry = FixtureRegistry {
            filename: "aws-1.0.0.tar.gz".to_string(),
            tarball,
            shasums,
            signature,
            signing_keys,
            download_calls: Mutex::new(0),
        };

        let plugins_root = tempdir().unwrap();
        let already_installed = PluginId::parse("bluelink/gcp@1.0.0").unwrap();
        let manifest = ManifestStore::new(plugins_root.path());
        manifest
            .insert(
                &already_installed.manifest_key(),
                InstalledPluginRecord {
                    id: already_installed.manifest_key(),
                    version: "1.0.0".to_string(),
                    registry_host: already_installed.registry_host.clone(),
                    shasum: "existing".to_string(),
                    installed_at: Utc::now(),
                },
            )
            .unwrap();

        let installer = Installer::new(Box::new(registry), plugins_root.path(), "linux", "amd64");
        let new_plugin = PluginId::parse("bluelink/aws@1.0.0").unwrap();
        let results = installer
            .install_missing(
                &[already_installed, new_plugin.clone()],
                &|_d, _t| {},
                &|_id, _stage| {},
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id.manifest_key(), new_plugin.manifest_key());
        assert_eq!(results[0].status, InstallStatus::Installed);
    }

    #[test]
    fn missing_shasums_url_fails_with_signature_missing() {
        let registry = FixtureRegistry {
            filename: "aws-1.0.0.tar.gz".to_string(),
            tarball: vec![],
            shasums: vec![],
            signature: vec![],
            signing_keys: HashMap::new(),
            download_calls: Mutex::new(0),
        };
        let plugins_root = tempdir().unwrap();
        let id = PluginId::parse("bluelink/aws@1.0.0").unwrap();
        let installer = Installer::new(Box::new(registry), plugins_root.path(), "linux", "amd64");

        let results = installer
            .install_batch(
                &[id],
                &|_d, _t| {},
                &|_id, _stage| {},
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(results[0].status, InstallStatus::Failed);
        assert!(results[0]
            .error
            .as_ref()
            .unwrap()
            .contains("signature metadata missing"));
    }

    #[test]
    fn uninstall_removes_dir_and_empty_parents() {
        let plugins_root = tempdir().unwrap();
        let id = PluginId::parse("bluelink/aws@1.0.0").unwrap();
        let manifest = ManifestStore::new(plugins_root.path());
        manifest
            .insert(
                &id.manifest_key(),
                InstalledPluginRecord {
                    id: id.manifest_key(),
                    version: "1.0.0".to_string(),
                    registry_host: id.registry_host.clone(),
                    shasum: "x".to_string(),
                    installed_at: Utc::now(),
                },
            )
            .unwrap();
        let version_dir = plugins_root.path().join("bin/bluelink/aws/1.0.0");
        std::fs::create_dir_all(&version_dir).unwrap();
        std::fs::write(version_dir.join("file.txt"), b"x").unwrap();

        let registry = FixtureRegistry {
            filename: String::new(),
            tarball: vec![],
            shasums: vec![],
            signature: vec![],
            signing_keys: HashMap::new(),
            download_calls: Mutex::new(0),
        };
        let installer = Installer::new(Box::new(registry), plugins_root.path(), "linux", "amd64");
        let result = installer.uninstall(&id).unwrap();
        assert_eq!(result.status, UninstallStatus::Removed);
        assert!(!plugins_root.path().join("bin/bluelink/aws").exists());
        assert!(!plugins_root.path().join("bin/bluelink").exists());
        assert!(plugins_root.path().join("bin").exists());
    }

    #[test]
    fn uninstall_not_found_when_absent() {
        let plugins_root = tempdir().unwrap();
        let registry = FixtureRegistry {
            filename: String::new(),
            tarball: vec![],
            shasums: vec![],
            signature: vec![],
            signing_keys: HashMap::new(),
            download_calls: Mutex::new(0),
        };
        let installer = Installer::new(Box::new(registry), plugins_root.path(), "linux", "amd64");
        let id = PluginId::parse("bluelink/aws@1.0.0").unwrap();
        let result = installer.uninstall(&id).unwrap();
        assert_eq!(result.status, UninstallStatus::NotFound);
    }
}
