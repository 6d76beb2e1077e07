//! Publish step for staged updates.
//!
//! An update writes the new contents to a staging file next to the target,
//! then publishes it:
//! 1. Optionally sync the staged file to disk (fsync)
//! 2. Remove the original file
//! 3. Rename the staged file over the original
//! 4. Sync the parent directory so the new entry is persisted
//!
//! Steps 2 and 3 are separate filesystem operations. A crash between them
//! leaves only the staged file on disk.

use crate::error::{FileError, Result};
use std::fs::{self, File};
use std::path::Path;

/// Flush the staged file's contents and metadata to durable storage.
pub fn sync_staged(path: &Path, file: &File) -> Result<()> {
    file.sync_all().map_err(|e| {
        FileError::Io(format!(
            "failed to sync staged file '{}' to disk: {}",
            path.display(),
            e
        ))
    })
}

/// Replace `target` with `staged`.
///
/// `staged` must be closed by the caller before publishing. When `durable`
/// is set, the parent directory is synced after the rename.
pub fn publish(staged: &Path, target: &Path, durable: bool) -> Result<()> {
    match fs::remove_file(target) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(FileError::Io(format!(
                "failed to remove '{}' before publishing: {}",
                target.display(),
                e
            )));
        }
    }

    fs::rename(staged, target).map_err(|e| {
        FileError::Io(format!(
            "failed to rename '{}' to '{}': {}",
            staged.display(),
            target.display(),
            e
        ))
    })?;

    if durable {
        sync_parent_dir(target);
    }

    tracing::debug!(path = %target.display(), "published staged file");
    Ok(())
}

/// Failures are logged, not returned: the rename has already happened.
#[cfg(unix)]
fn sync_parent_dir(target: &Path) {
    let Some(parent) = target.parent() else {
        return;
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    if let Err(e) = sync_dir(parent) {
        tracing::warn!(
            dir = %parent.display(),
            error = %e,
            "failed to sync directory after publishing"
        );
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

// Directories cannot be opened as files on Windows.
#[cfg(not(unix))]
fn sync_parent_dir(_target: &Path) {}
