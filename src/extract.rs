//! Safe extraction of compressed tar archives.
//!
//! Walks entries one at a time rather than calling `Archive::unpack`, so each
//! entry's cleaned path and (for symlinks) resolved target can be checked
//! against the destination directory before anything is written.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};

fn plugin_label(plugin: &str) -> String {
    plugin.to_string()
}

/// Returns the cleaned, destination-relative path, or an error if it escapes
/// `dest_dir` via `..` components or an absolute prefix.
fn safe_relative_path(dest_dir: &Path, entry_path: &Path, plugin: &str) -> Result<PathBuf> {
    let mut cleaned = PathBuf::new();
    for component in entry_path.components() {
        match component {
            Component::Normal(part) => cleaned.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::ExtractionFailed {
                    plugin: plugin_label(plugin),
                    reason: format!("invalid file path: {}", entry_path.display()),
                });
            }
        }
    }

    let joined = dest_dir.join(&cleaned);
    if !joined.starts_with(dest_dir) {
        return Err(Error::ExtractionFailed {
            plugin: plugin_label(plugin),
            reason: format!("invalid file path: {}", entry_path.display()),
        });
    }
    Ok(joined)
}

/// Checks that a symlink's target, resolved relative to the symlink's own
/// directory, stays within `dest_dir`.
fn check_symlink_target(
    dest_dir: &Path,
    symlink_dest: &Path,
    target: &Path,
    plugin: &str,
) -> Result<()> {
    let symlink_parent = symlink_dest.parent().unwrap_or(dest_dir);
    let mut resolved = PathBuf::from(symlink_parent);
    for component in target.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::ParentDir => {
                resolved.pop();
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::ExtractionFailed {
                    plugin: plugin_label(plugin),
                    reason: format!("symlink target escapes destination: {}", target.display()),
                });
            }
        }
    }

    let relative = resolved.strip_prefix(dest_dir).map_err(|_| Error::ExtractionFailed {
        plugin: plugin_label(plugin),
        reason: format!("symlink target escapes destination: {}", target.display()),
    })?;
    if relative.starts_with("..") {
        return Err(Error::ExtractionFailed {
            plugin: plugin_label(plugin),
            reason: format!("symlink target escapes destination: {}", target.display()),
        });
    }
    Ok(())
}

/// Streams a gzip-compressed tar archive from `archive_path` into `dest_dir`,
/// creating `dest_dir` if needed. `plugin` is used only for error messages.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path, plugin: &str) -> Result<()> {
    fs::create_dir_all(dest_dir)?;

    let file = fs::File::open(archive_path)?;
    let decoder = GzDecoder::new(file);
    let mut archive = Archive::new(decoder);

    for entry in archive
        .entries()
        .map_err(|e| Error::ExtractionFailed {
            plugin: plugin_label(plugin),
            reason: format!("cannot read archive: {e}"),
        })?
    {
        let mut entry = entry.map_err(|e| Error::ExtractionFailed {
            plugin: plugin_label(plugin),
            reason: format!("cannot read archive entry: {e}"),
        })?;

        let entry_path = entry
            .path()
            .map_err(|e| Error::ExtractionFailed {
                plugin: plugin_label(plugin),
                reason: format!("invalid entry path: {e}"),
            })?
            .into_owned();

        let dest_path = safe_relative_path(dest_dir, &entry_path, plugin)?;

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&dest_path)?;
                set_permissions(&dest_path, 0o755)?;
            }
            EntryType::Regular => {
                if let Some(parent) = dest_path.parent() {
                    fs::create_dir_all(parent)?;
                    set_permissions(parent, 0o755)?;
                }
                let mode = entry.header().mode().unwrap_or(0o644);
                let mut contents = Vec::new();
                entry.read_to_end(&mut contents).map_err(|e| Error::ExtractionFailed {
                    plugin: plugin_label(plugin),
                    reason: format!("cannot read entry contents: {e}"),
                })?;
                fs::write(&dest_path, &contents)?;
                set_permissions(&dest_path, mode)?;
            }
            EntryType::Symlink => {
                let target = entry
                    .link_name()
                    .map_err(|e| Error::ExtractionFailed {
                        plugin: plugin_label(plugin),
                        reason: format!("invalid symlink target: {e}"),
                    })?
                    .ok_or_else(|| Error::ExtractionFailed {
                        plugin: plugin_label(plugin),
                        reason: "symlink entry missing target".to_string(),
                    })?
                    .into_owned();

                check_symlink_target(dest_dir, &dest_path, &target, plugin)?;

                if let Some(parent) = dest_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                create_symlink(&target, &dest_path)?;
            }
            _ => {
                // Any other entry type (hard link, device, fifo, ...) is skipped.
            }
        }
    }

    Ok(())
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::windows::fs::symlink_file(target, link)?;
    Ok(())
}
