//! Archive extraction and install directory replacement.
//!
//! These are blocking filesystem operations; the engine runs them through
//! `spawn_blocking`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

use crate::core::GhPushError;
use crate::utils::{move_dir, remove_dir_all};

const SYMLINK_MODE_MASK: u32 = 0o170000;
const SYMLINK_MODE: u32 = 0o120000;

/// Unpack a zip archive into `dest`.
///
/// Entries whose names escape `dest` (absolute paths, `..`) fail the whole
/// extraction. Symlink entries are skipped.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<(), GhPushError> {
    let failed = |reason: String| GhPushError::ExtractFailed {
        path: archive.display().to_string(),
        reason,
    };

    let file = fs::File::open(archive).map_err(|e| failed(e.to_string()))?;
    let mut zip = ZipArchive::new(file).map_err(|e| failed(e.to_string()))?;
    fs::create_dir_all(dest).map_err(|e| failed(e.to_string()))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| failed(e.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(failed(format!("unsafe entry name '{}'", entry.name())));
        };

        if entry.unix_mode().is_some_and(|mode| mode & SYMLINK_MODE_MASK == SYMLINK_MODE) {
            debug!("Skipping symlink entry {}", entry.name());
            continue;
        }

        let out = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out).map_err(|e| failed(e.to_string()))?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(|e| failed(e.to_string()))?;
        }
        let mut target = fs::File::create(&out).map_err(|e| failed(e.to_string()))?;
        io::copy(&mut entry, &mut target).map_err(|e| failed(e.to_string()))?;
    }

    Ok(())
}

/// Directory whose contents become the install directory.
///
/// GitHub archives wrap everything in a `{repo}-{ref}/` directory, while
/// backups are flat. If any file sits at the top level, the extraction
/// directory itself is the payload; otherwise its first directory by name.
pub fn payload_root(extract_dir: &Path) -> Result<PathBuf, GhPushError> {
    let read_failed = |e: io::Error| GhPushError::ExtractFailed {
        path: extract_dir.display().to_string(),
        reason: e.to_string(),
    };

    let mut dirs = Vec::new();
    for entry in fs::read_dir(extract_dir).map_err(read_failed)? {
        let entry = entry.map_err(read_failed)?;
        let file_type = entry.file_type().map_err(read_failed)?;
        if file_type.is_dir() {
            dirs.push(entry.path());
        } else {
            return Ok(extract_dir.to_path_buf());
        }
    }

    dirs.sort();
    dirs.into_iter().next().ok_or_else(|| GhPushError::ExtractFailed {
        path: extract_dir.display().to_string(),
        reason: "archive is empty".to_string(),
    })
}

/// Delete `install_dir` and move `payload` into its place.
///
/// There is no automatic rollback if the move fails; the caller reports the
/// failure and the operator restores from a backup.
pub fn swap_into(payload: &Path, install_dir: &Path) -> Result<(), GhPushError> {
    let swap_failed = |e: anyhow::Error| GhPushError::SwapFailed {
        path: install_dir.display().to_string(),
        reason: format!("{e:#}"),
    };

    remove_dir_all(install_dir).map_err(swap_failed)?;
    move_dir(payload, install_dir).map_err(swap_failed)?;
    debug!("Installed {} into {}", payload.display(), install_dir.display());
    Ok(())
}
