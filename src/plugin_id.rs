//! Plugin identifier parsing and canonicalization.
//!
//! Wire syntax: `[host/]namespace/name[@versionOrConstraint]`.

use crate::error::{Error, Result};
use std::fmt;

pub const DEFAULT_REGISTRY_HOST: &str = "registry.bluelink.dev";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluginId {
    pub registry_host: String,
    pub namespace: String,
    pub name: String,
    /// Empty when the identifier carries no version or constraint.
    pub version: String,
    /// Whether the host segment was present in the original input, so
    /// `to_string` can omit a default host the input never named.
    had_explicit_host: bool,
}

impl PluginId {
    pub fn parse(input: &str) -> Result<Self> {
        let (path, version) = match input.split_once('@') {
            Some((path, ver)) => {
                if ver.is_empty() {
                    return Err(Error::InvalidPluginId(
                        input.to_string(),
                        "version after '@' must not be empty".to_string(),
                    ));
                }
                (path, ver.to_string())
            }
            None => (input, String::new()),
        };

        let segments: Vec<&str> = path.split('/').collect();
        let (registry_host, namespace, name, had_explicit_host) = match segments.as_slice() {
            [namespace, name] => (DEFAULT_REGISTRY_HOST.to_string(), *namespace, *name, false),
            [host, namespace, name] => (host.to_string(), *namespace, *name, true),
            _ => {
                return Err(Error::InvalidPluginId(
                    input.to_string(),
                    "expected '[host/]namespace/name[@version]'".to_string(),
                ));
            }
        };

        if had_explicit_host && registry_host.is_empty() {
            return Err(Error::InvalidPluginId(
                input.to_string(),
                "registry host cannot be empty".to_string(),
            ));
        }
        if namespace.is_empty() {
            return Err(Error::InvalidPluginId(
                input.to_string(),
                "namespace cannot be empty".to_string(),
            ));
        }
        if name.is_empty() {
            return Err(Error::InvalidPluginId(
                input.to_string(),
                "plugin name cannot be empty".to_string(),
            ));
        }

        Ok(PluginId {
            registry_host,
            namespace: namespace.to_string(),
            name: name.to_string(),
            version,
            had_explicit_host,
        })
    }

    /// A new identifier with the same host/namespace/name and the given version.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        PluginId {
            registry_host: self.registry_host.clone(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            version: version.into(),
            had_explicit_host: self.had_explicit_host,
        }
    }

    /// A new identifier with the same namespace/name/version, under a
    /// different (always-explicit) registry host.
    pub fn with_host(&self, host: impl Into<String>) -> Self {
        PluginId {
            registry_host: host.into(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            had_explicit_host: true,
        }
    }

    /// `host/namespace/name`, independent of version — the manifest key.
    pub fn manifest_key(&self) -> String {
        format!("{}/{}/{}", self.registry_host, self.namespace, self.name)
    }

    /// Same as `manifest_key`, with an explicit name matching the spec's term.
    pub fn fully_qualified(&self) -> String {
        self.manifest_key()
    }

    pub fn is_version_constraint(&self) -> bool {
        self.version.starts_with('^') || self.version.starts_with('~')
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.had_explicit_host {
            write!(f, "{}/", self.registry_host)?;
        }
        write!(f, "{}/{}", self.namespace, self.name)?;
        if !self.version.is_empty() {
            write!(f, "@{}", self.version)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_segment_with_default_host() {
        let id = PluginId::parse("bluelink/aws@1.0.0").unwrap();
        assert_eq!(id.registry_host, DEFAULT_REGISTRY_HOST);
        assert_eq!(id.namespace, "bluelink");
        assert_eq!(id.name, "aws");
        assert_eq!(id.version, "1.0.0");
    }

    #[test]
    fn parses_three_segment_with_explicit_host() {
        let id = PluginId::parse("registry.example.com/bluelink/aws@1.0.0").unwrap();
        assert_eq!(id.registry_host, "registry.example.com");
        assert_eq!(id.fully_qualified(), "registry.example.com/bluelink/aws");
    }

    #[test]
    fn parses_without_version() {
        let id = PluginId::parse("bluelink/aws").unwrap();
        assert_eq!(id.version, "");
    }

    #[test]
    fn round_trips_display_two_segment() {
        let s = "bluelink/aws@1.0.0";
        assert_eq!(PluginId::parse(s).unwrap().to_string(), s);
    }

    #[test]
    fn round_trips_display_three_segment() {
        let s = "registry.example.com/bluelink/aws@^1.0.0";
        assert_eq!(PluginId::parse(s).unwrap().to_string(), s);
    }

    #[test]
    fn round_trips_display_no_version() {
        let s = "bluelink/aws";
        assert_eq!(PluginId::parse(s).unwrap().to_string(), s);
    }

    #[test]
    fn manifest_key_excludes_version() {
        let a = PluginId::parse("bluelink/aws@1.0.0").unwrap();
        let b = PluginId::parse("bluelink/aws@2.0.0").unwrap();
        assert_eq!(a.manifest_key(), b.manifest_key());
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(PluginId::parse("aws").is_err());
        assert!(PluginId::parse("a/b/c/d").is_err());
    }

    #[test]
    fn rejects_empty_namespace() {
        assert!(PluginId::parse("/aws").is_err());
    }

    #[test]
    fn rejects_empty_version_after_at() {
        assert!(PluginId::parse("bluelink/aws@").is_err());
    }

    #[test]
    fn is_version_constraint_detects_prefix() {
        assert!(PluginId::parse("bluelink/aws@^1.0.0")
            .unwrap()
            .is_version_constraint());
        assert!(!PluginId::parse("bluelink/aws@1.0.0")
            .unwrap()
            .is_version_constraint());
    }

    #[test]
    fn with_version_preserves_host() {
        let id = PluginId::parse("registry.example.com/bluelink/aws").unwrap();
        let versioned = id.with_version("1.0.0");
        assert_eq!(versioned.to_string(), "registry.example.com/bluelink/aws@1.0.0");
    }
}
