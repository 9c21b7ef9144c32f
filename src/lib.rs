//! pluginctl — the plugin lifecycle core of a deployment-orchestration system.
//!
//! This crate resolves, fetches, verifies, installs, and uninstalls versioned
//! extension packages ("plugins") from one or more remote registries. It
//! combines a semantic-version constraint solver, a topologically-ordered
//! dependency resolver with cycle detection, content-addressed distribution,
//! OpenPGP/SHA-256 verification, and safe tar extraction.
//!
//! Everything here treats the registry transport, the deployment engine
//! itself, and the outer CLI as external collaborators: this crate exposes a
//! library API that those layers drive.
//!
//! # Example
//!
//! ```no_run
//! use pluginctl::{Installer, LocalRegistryClient, PluginId};
//! use tokio_util::sync::CancellationToken;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = LocalRegistryClient::new("/srv/registry");
//! let installer = Installer::new(Box::new(registry), "/opt/plugins", "linux", "amd64");
//!
//! let id = PluginId::parse("bluelink/aws@^1.0.0")?;
//! let results = installer.install_batch(
//!     &[id],
//!     &|_downloaded, _total| {},
//!     &|_id, _stage| {},
//!     &CancellationToken::new(),
//! )?;
//! println!("{} results", results.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`version`] - semantic version parsing, ordering, and constraint matching
//! - [`plugin_id`] - plugin identifier parsing and canonicalization
//! - [`resolver`] - dependency graph resolution with cycle detection
//! - [`registry`] - the registry-client contract and a reference implementation
//! - [`extract`] - safe extraction of compressed tar archives
//! - [`verify`] - OpenPGP signature and SHA-256 checksum verification
//! - [`manifest_store`] - the on-disk record of installed plugins
//! - [`installer`] - orchestrates resolve -> fetch -> verify -> extract -> record
//! - [`config`] - user configuration management
//! - [`deploy_config`] - permissive JSONC reader for deploy-config files
//! - [`error`] - error types and result handling

pub mod config;
pub mod deploy_config;
pub mod error;
pub mod extract;
pub mod installer;
pub mod manifest_store;
pub mod plugin_id;
pub mod registry;
pub mod resolver;
pub mod verify;
pub mod version;

pub use config::Config;
pub use deploy_config::DeployConfig;
pub use error::{Error, Result};
pub use extract::extract_archive;
pub use installer::{
    InstallResult, InstallStage, InstallStatus, Installer, UninstallResult, UninstallStatus,
};
pub use manifest_store::{InstalledPluginRecord, ManifestStore};
pub use plugin_id::{PluginId, DEFAULT_REGISTRY_HOST};
pub use registry::{LocalRegistryClient, PackageMetadata, ProgressFn, RegistryClient, VersionListing};
pub use resolver::Resolver;
pub use verify::{sha256_file, verify_checksum, verify_signature};
pub use version::{Constraint, ConstraintKind, Version};
