//! Sentinel file naming.
//!
//! Names are derived from the data file's basename and live in the same
//! directory:
//! - Lock:      `.{name}.lock`
//! - Temporary: `.{name}.temp`
//! - RLock:     `.{name}.{12 random alphanumerics}.rlock`
//!
//! Other implementations sharing a directory rely on these exact names.

use super::types::ControlFileKind;
use crate::error::{FileError, Result};
use rand::Rng;
use rand::distributions::Alphanumeric;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Length of the random part of an RLock file name.
pub const RLOCK_SUFFIX_LEN: usize = 12;

/// How many RLock names are tried before giving up on collisions.
pub const RLOCK_NAME_ATTEMPTS: usize = 10;

const LOCK_EXT: &str = "lock";
const TEMP_EXT: &str = "temp";
const RLOCK_EXT: &str = "rlock";

/// Random alphanumeric string of `len` characters.
pub fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn split(path: &Path) -> Result<(PathBuf, String)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FileError::Io(format!("invalid file path '{}'", path.display())))?;
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok((dir, name.to_string()))
}

/// `.{name}.lock` next to `path`.
pub fn lock_file_path(path: &Path) -> Result<PathBuf> {
    let (dir, name) = split(path)?;
    Ok(dir.join(format!(".{}.{}", name, LOCK_EXT)))
}

/// `.{name}.temp` next to `path`.
pub fn temp_file_path(path: &Path) -> Result<PathBuf> {
    let (dir, name) = split(path)?;
    Ok(dir.join(format!(".{}.{}", name, TEMP_EXT)))
}

/// A fresh `.{name}.{random}.rlock` path next to `path`.
pub fn rlock_file_path(path: &Path) -> Result<PathBuf> {
    let (dir, name) = split(path)?;
    Ok(dir.join(format!(
        ".{}.{}.{}",
        name,
        random_string(RLOCK_SUFFIX_LEN),
        RLOCK_EXT
    )))
}

/// Matches the file name of any sentinel belonging to `path`.
///
/// Group `rlock` holds the random part of an RLock name, which is exactly
/// [`RLOCK_SUFFIX_LEN`] alphanumerics, so the read locks of a sibling such
/// as `name.bak` never match. Group `ext` holds the extension of a Lock or
/// Temporary name.
#[derive(Debug, Clone)]
pub struct SentinelPattern {
    regex: Regex,
}

impl SentinelPattern {
    pub fn new(path: &Path) -> Result<Self> {
        let (_, name) = split(path)?;
        let pattern = format!(
            r"^\.{}\.(?:(?P<rlock>[A-Za-z0-9]{{{}}})\.{}|(?P<ext>{}|{}))$",
            regex::escape(&name),
            RLOCK_SUFFIX_LEN,
            RLOCK_EXT,
            LOCK_EXT,
            TEMP_EXT
        );
        let regex = Regex::new(&pattern)
            .map_err(|e| FileError::Io(format!("invalid sentinel pattern: {}", e)))?;
        Ok(Self { regex })
    }

    /// Kind of the sentinel named `file_name`, if it belongs to this file.
    pub fn classify(&self, file_name: &str) -> Option<ControlFileKind> {
        let caps = self.regex.captures(file_name)?;
        if caps.name("rlock").is_some() {
            return Some(ControlFileKind::RLock);
        }
        match caps.name("ext").map(|m| m.as_str()) {
            Some(LOCK_EXT) => Some(ControlFileKind::Lock),
            Some(TEMP_EXT) => Some(ControlFileKind::Temporary),
            _ => None,
        }
    }
}
