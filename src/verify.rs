//! Signature and checksum verification.
//!
//! SHA-256 checksum comparison against a signed shasums manifest, and
//! OpenPGP detached-signature verification of that manifest against a
//! keyring assembled from the package metadata's armored public keys.

use crate::error::{Error, Result};
use sequoia_openpgp::cert::CertParser;
use sequoia_openpgp::parse::stream::{
    DetachedVerifierBuilder, MessageLayer, MessageStructure, VerificationHelper,
};
use sequoia_openpgp::parse::Parse;
use sequoia_openpgp::policy::StandardPolicy;
use sequoia_openpgp::Cert;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Computes the SHA-256 digest of a file, streaming so large archives don't
/// need to fit in memory at once.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Looks up `filename`'s expected checksum in a `CHECKSUM  FILENAME`-formatted
/// shasums file, matching either the exact filename or a `/FILENAME` suffix
/// (to tolerate nested paths in the manifest).
pub fn find_expected_checksum(shasums: &[u8], filename: &str) -> Option<String> {
    let text = String::from_utf8_lossy(shasums);
    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let checksum = parts.next()?;
        let rest: Vec<&str> = parts.collect();
        let recorded_name = rest.join(" ");
        if recorded_name == filename || recorded_name.ends_with(&format!("/{filename}")) {
            return Some(checksum.to_lowercase());
        }
    }
    None
}

/// Compares the SHA-256 of `downloaded_file` against the checksum recorded
/// for `filename` in `shasums`. Returns `Err(ChecksumMismatch)` on a
/// mismatch, or `Err(VersionNotFound)`-adjacent failure if the filename is
/// absent from the shasums manifest (surfaced as `ExtractionFailed`-free
/// `Other`, since this is strictly a pre-verification lookup failure).
pub fn verify_checksum(
    downloaded_file: &Path,
    shasums: &[u8],
    filename: &str,
    plugin: &str,
) -> Result<()> {
    let expected = find_expected_checksum(shasums, filename).ok_or_else(|| {
        Error::Other(format!(
            "{plugin}: no checksum entry for {filename} in shasums manifest"
        ))
    })?;
    let actual = sha256_file(downloaded_file)?;
    if actual.to_lowercase() != expected {
        return Err(Error::ChecksumMismatch {
            plugin: plugin.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

struct KeyringHelper<'a> {
    certs: &'a [Cert],
}

impl<'a> VerificationHelper for KeyringHelper<'a> {
    fn get_certs(
        &mut self,
        _ids: &[sequoia_openpgp::KeyHandle],
    ) -> sequoia_openpgp::Result<Vec<Cert>> {
        Ok(self.certs.to_vec())
    }

    fn check(&mut self, structure: MessageStructure) -> sequoia_openpgp::Result<()> {
        for layer in structure.into_iter() {
            if let MessageLayer::SignatureGroup { results } = layer {
                if results.into_iter().any(|r| r.is_ok()) {
                    return Ok(());
                }
            }
        }
        Err(anyhow::anyhow!("no valid signature found"))
    }
}

/// Assembles a keyring from a map of key id -> armored public key text,
/// parsing every entry. Any entry that fails to parse is a fatal error.
fn build_keyring(signing_keys: &HashMap<String, String>, plugin: &str) -> Result<Vec<Cert>> {
    let mut certs = Vec::new();
    for (key_id, armored) in signing_keys {
        let parser = CertParser::from_bytes(armored.as_bytes()).map_err(|e| {
            Error::SigningKeysMissing {
                plugin: format!("{plugin}: key '{key_id}' failed to parse: {e}"),
            }
        })?;
        for cert in parser {
            let cert = cert.map_err(|e| Error::SigningKeysMissing {
                plugin: format!("{plugin}: key '{key_id}' failed to parse: {e}"),
            })?;
            certs.push(cert);
        }
    }
    if certs.is_empty() {
        return Err(Error::SigningKeysMissing {
            plugin: plugin.to_string(),
        });
    }
    Ok(certs)
}

/// Verifies an OpenPGP detached signature over `signed_bytes` against a
/// keyring assembled from `signing_keys`.
pub fn verify_signature(
    signed_bytes: &[u8],
    signature_bytes: &[u8],
    signing_keys: &HashMap<String, String>,
    plugin: &str,
) -> Result<()> {
    let certs = build_keyring(signing_keys, plugin)?;
    let policy = StandardPolicy::new();

    let helper = KeyringHelper { certs: &certs };
    let mut verifier = DetachedVerifierBuilder::from_bytes(signature_bytes)
        .and_then(|b| b.with_policy(&policy, None, helper))
        .map_err(|e| Error::SignatureInvalid {
            plugin: plugin.to_string(),
            reason: e.to_string(),
        })?;

    verifier
        .verify_bytes(signed_bytes)
        .map_err(|e| Error::SignatureInvalid {
            plugin: plugin.to_string(),
            reason: e.to_string(),
        })
}
