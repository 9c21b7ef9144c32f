//! Registry client contract and a reference in-process implementation.
//!
//! The core consumes four operations (spec §4.6); the concrete transport is
//! out of scope. `LocalRegistryClient` is the one reference implementation
//! shipped here, backed by a directory layout, so the crate is runnable
//! end-to-end without a network dependency.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionListing {
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub filename: String,
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
    pub shasum: String,
    #[serde(rename = "shasumsUrl")]
    pub shasums_url: String,
    #[serde(rename = "shasumsSignatureUrl")]
    pub shasums_signature_url: String,
    #[serde(rename = "signingKeys")]
    pub signing_keys: HashMap<String, String>,
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
}

pub type ProgressFn<'a> = dyn Fn(u64, u64) + Send + Sync + 'a;

/// Returns `Err(Error::Cancelled)` if `token` has already been cancelled.
fn check_cancelled(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

pub trait RegistryClient: Send + Sync {
    fn list_versions(
        &self,
        host: &str,
        namespace: &str,
        name: &str,
        token: &CancellationToken,
    ) -> Result<Vec<VersionListing>>;

    fn get_package_metadata(
        &self,
        host: &str,
        namespace: &str,
        name: &str,
        version: &str,
        os: &str,
        arch: &str,
        token: &CancellationToken,
    ) -> Result<PackageMetadata>;

    fn download_package(
        &self,
        host: &str,
        metadata: &PackageMetadata,
        dest_path: &Path,
        progress: &ProgressFn,
        token: &CancellationToken,
    ) -> Result<()>;

    fn download_shasums(&self, host: &str, url: &str, token: &CancellationToken) -> Result<Vec<u8>>;

    fn download_signature(&self, host: &str, url: &str, token: &CancellationToken) -> Result<Vec<u8>>;
}

/// A registry backed by a directory tree:
/// `{root}/packages/{namespace}/{name}.json` — version list + per-version metadata
/// `{root}/tarballs/{filename}` — package archives
/// `{root}/signatures/{filename}` — detached signatures / shasums files
pub struct LocalRegistryClient {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct PackageRecord {
    versions: Vec<PackageVersionRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PackageVersionRecord {
    version: String,
    metadata: PackageMetadata,
}

impl LocalRegistryClient {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalRegistryClient { root: root.into() }
    }

    fn package_record_path(&self, namespace: &str, name: &str) -> PathBuf {
        self.root
            .join("packages")
            .join(namespace)
            .join(format!("{name}.json"))
    }

    fn load_record(&self, namespace: &str, name: &str) -> Result<PackageRecord> {
        let path = self.package_record_path(namespace, name);
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            Error::RegistryUnavailable(format!(
                "no package record at {}: {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::RegistryUnavailable(format!("malformed package record: {e}")))
    }

    fn file_bytes(&self, dir: &str, filename: &str) -> Result<Vec<u8>> {
        let path = self.root.join(dir).join(filename);
        std::fs::read(&path)
            .map_err(|e| Error::RegistryUnavailable(format!("cannot read {}: {e}", path.display())))
    }
}

impl RegistryClient for LocalRegistryClient {
    fn list_versions(
        &self,
        _host: &str,
        namespace: &str,
        name: &str,
        token: &CancellationToken,
    ) -> Result<Vec<VersionListing>> {
        check_cancelled(token)?;
        let record = self.load_record(namespace, name)?;
        let mut parsed: Vec<(crate::version::Version, String)> = record
            .versions
            .into_iter()
            .filter_map(|v| {
                crate::version::Version::parse(&v.version)
                    .ok()
                    .map(|parsed| (parsed, v.version))
            })
            .collect();
        // The registry contract requires descending order.
        parsed.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(parsed
            .into_iter()
            .map(|(_, version)| VersionListing { version })
            .collect())
    }

    fn get_package_metadata(
        &self,
        _host: &str,
        namespace: &str,
        name: &str,
        version: &str,
        _os: &str,
        _arch: &str,
        token: &CancellationToken,
    ) -> Result<PackageMetadata> {
        check_cancelled(token)?;
        let record = self.load_record(namespace, name)?;
        record
            .versions
            .into_iter()
            .find(|v| v.version == version)
            .map(|v| v.metadata)
            .ok_or_else(|| Error::VersionNotFound {
                plugin: format!("{namespace}/{name}"),
                requirement: version.to_string(),
            })
    }

    fn download_package(
        &self,
        _host: &str,
        metadata: &PackageMetadata,
        dest_path: &Path,
        progress: &ProgressFn,
        token: &CancellationToken,
    ) -> Result<()> {
        check_cancelled(token)?;
        let src = self.root.join("tarballs").join(&metadata.filename);
        let mut file = std::fs::File::open(&src).map_err(|e| {
            Error::RegistryUnavailable(format!("cannot read tarball {}: {e}", src.display()))
        })?;
        let total = file.metadata().map(|m| m.len()).unwrap_or(0);
        let mut buf = [0u8; 64 * 1024];
        let mut written = 0u64;
        let mut out = std::fs::File::create(dest_path)?;
        use std::io::Write;
        loop {
            check_cancelled(token)?;
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])?;
            written += n as u64;
            progress(written, total);
        }
        Ok(())
    }

    fn download_shasums(&self, _host: &str, url: &str, token: &CancellationToken) -> Result<Vec<u8>> {
        check_cancelled(token)?;
        self.file_bytes("signatures", url)
    }

    fn download_signature(&self, _host: &str, url: &str, token: &CancellationToken) -> Result<Vec<u8>> {
        check_cancelled(token)?;
        self.file_bytes("signatures", url)
    }
}
