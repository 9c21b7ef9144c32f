//! User configuration management.
//!
//! Configuration is stored in TOML format at `~/.pluginctl/config.toml`
//! (or `$PLUGINCTL_CONFIG_DIR/config.toml` if set). It holds the installer's
//! own runtime settings — where the plugins root lives, which registries are
//! known, and whether signature verification is mandatory — not the
//! deploy-config dependency declarations a caller resolves against (see
//! [`crate::deploy_config`]).
//!
//! # Examples
//!
//! ```no_run
//! use pluginctl::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! println!("plugins root: {}", config.plugins_root.display());
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory under which `bin/` and `manifest.json` live.
    #[serde(default = "default_plugins_root")]
    pub plugins_root: PathBuf,

    /// Registry settings.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Package verification settings.
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// host -> base URL, for registries an HTTP `RegistryClient` implementation
    /// would need to reach. The core itself does not dial these; it only
    /// carries the table through for the caller's transport layer.
    #[serde(default)]
    pub base_urls: HashMap<String, String>,

    /// Connect/read timeout in seconds for an HTTP registry client.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_urls: HashMap::new(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Require OpenPGP signature + checksum verification on every install.
    /// Spec §4.4 step 3 treats this as load-bearing, so unlike looser
    /// defaults elsewhere, this one defaults to `true`.
    #[serde(default = "default_require_signatures")]
    pub require_signatures: bool,
}

fn default_require_signatures() -> bool {
    true
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            require_signatures: default_require_signatures(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Token for an authenticated registry HTTP client, overridden by
    /// `PLUGINCTL_TOKEN`.
    pub token: Option<String>,
}

/// `$PLUGINCTL_CONFIG_DIR/plugins`, or `~/.pluginctl/plugins` if unset —
/// mirrors `Config::default_dir` so tests overriding the config directory
/// also get an isolated plugins root.
fn default_plugins_root() -> PathBuf {
    if let Ok(dir) = std::env::var("PLUGINCTL_CONFIG_DIR") {
        return PathBuf::from(dir).join("plugins");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pluginctl")
        .join("plugins")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plugins_root: default_plugins_root(),
            registry: RegistryConfig::default(),
            verification: VerificationConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Uses `PLUGINCTL_CONFIG_DIR` if set, otherwise `~/.pluginctl`.
    pub fn default_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("PLUGINCTL_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        dirs::home_dir()
            .map(|h| h.join(".pluginctl"))
            .ok_or_else(|| Error::Other("could not determine home directory".to_string()))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::default_dir()?.join("config.toml"))
    }

    /// Loads config from file, or returns the default if no file exists.
    /// `PLUGINCTL_TOKEN`, if set and non-empty, overrides `auth.token`.
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;

        let mut config = if !path.exists() {
            Self::default()
        } else {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content)?
        };

        if let Ok(token) = std::env::var("PLUGINCTL_TOKEN") {
            if !token.is_empty() {
                config.auth.token = Some(token);
            }
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }
}
