//! Listing and clearing the control files of a data file.

use super::control::sentinel_dir;
use super::naming::SentinelPattern;
use super::types::ControlFileInfo;
use crate::error::{FileError, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;

/// List every control file belonging to the data file at `path`.
///
/// # Arguments
///
/// * `path` - The data file (it does not need to exist)
/// * `stale_minutes` - Age after which a control file is reported as stale
///
/// # Returns
///
/// The control files sorted by file name.
pub fn list_control_files(path: &Path, stale_minutes: u32) -> Result<Vec<ControlFileInfo>> {
    let pattern = SentinelPattern::new(path)?;
    let dir = sentinel_dir(path);
    let mut found = Vec::new();

    if !dir.exists() {
        return Ok(found);
    }

    let entries = fs::read_dir(&dir).map_err(|e| {
        FileError::Io(format!(
            "failed to read directory '{}': {}",
            dir.display(),
            e
        ))
    })?;

    for entry in entries {
        let entry = entry
            .map_err(|e| FileError::Io(format!("failed to read directory entry: {}", e)))?;

        let Some(kind) = entry.file_name().to_str().and_then(|n| pattern.classify(n)) else {
            continue;
        };

        let modified_at = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        let is_stale = modified_at
            .map(|at| Utc::now().signed_duration_since(at).num_minutes() > i64::from(stale_minutes))
            .unwrap_or(false);

        found.push(ControlFileInfo {
            path: entry.path(),
            kind,
            modified_at,
            is_stale,
        });
    }

    found.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(found)
}

/// Remove every control file belonging to the data file at `path`.
///
/// This breaks the locks of any session still holding them. The caller is
/// responsible for making sure the holders are gone.
///
/// # Returns
///
/// The removed control files, for reporting.
pub fn clear_control_files(path: &Path, stale_minutes: u32) -> Result<Vec<ControlFileInfo>> {
    let found = list_control_files(path, stale_minutes)?;

    for info in &found {
        match fs::remove_file(&info.path) {
            Ok(()) => {
                tracing::info!(path = %info.path.display(), kind = %info.kind, "control file cleared");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(FileError::Io(format!(
                    "failed to clear control file '{}': {}",
                    info.path.display(),
                    e
                )));
            }
        }
    }

    Ok(found)
}
