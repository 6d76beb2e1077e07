//! Control file creation and release.
//!
//! A control file's existence is the lock state. Creation of each marker
//! uses exclusive create, and the composition of markers follows two rules:
//! - an RLock is created while holding a transient Lock, so no writer can
//!   slip in between the Lock check and the RLock creation;
//! - a Lock re-checks for RLocks after its own creation and rolls back if
//!   a reader appeared in the meantime.

use super::naming::{
    RLOCK_NAME_ATTEMPTS, SentinelPattern, lock_file_path, rlock_file_path, temp_file_path,
};
use super::types::ControlFileKind;
use crate::context::WaitContext;
use crate::error::{FileError, ForcedUnlockError, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One sentinel file held by this process.
///
/// When dropped without being closed, the sentinel is removed and a warning
/// is logged on failure.
#[derive(Debug)]
pub struct ControlFile {
    path: PathBuf,
    kind: ControlFileKind,
    file: Option<File>,
    released: bool,
}

impl ControlFile {
    fn new(path: PathBuf, kind: ControlFileKind, file: File) -> Self {
        Self {
            path,
            kind,
            file: Some(file),
            released: false,
        }
    }

    /// Create a control file of `kind` for the data file at `path`,
    /// retrying lock contention until `ctx` is done.
    pub fn create_with_context(
        ctx: &WaitContext,
        path: &Path,
        kind: ControlFileKind,
        retry_delay: Duration,
    ) -> Result<Self> {
        ctx.retry(path, retry_delay, || Self::create(path, kind))
    }

    /// Single attempt at creating a control file of `kind` for `path`.
    pub fn create(path: &Path, kind: ControlFileKind) -> Result<Self> {
        let control = match kind {
            ControlFileKind::RLock => create_rlock(path)?,
            ControlFileKind::Lock => create_lock(path)?,
            ControlFileKind::Temporary => create_temp(path)?,
        };
        tracing::debug!(path = %control.path.display(), kind = %kind, "control file created");
        Ok(control)
    }

    /// The sentinel path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ControlFileKind {
        self.kind
    }

    pub fn file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    pub fn file_mut(&mut self) -> Option<&mut File> {
        self.file.as_mut()
    }

    /// Close the handle but keep the sentinel on disk.
    ///
    /// Sentinels never take an OS lock, so there is nothing to unlock.
    pub fn close_handle(&mut self) {
        drop(self.file.take());
    }

    /// Close the handle, then remove the sentinel if it still exists.
    pub fn close(&mut self) -> Result<()> {
        self.close_handle();
        self.remove()
    }

    /// Like [`ControlFile::close`], but attempts every step and reports
    /// every failure.
    pub fn close_with_errors(&mut self) -> Result<()> {
        let mut errors = ForcedUnlockError::new();
        self.close_handle();
        errors.record(self.remove());
        errors.into_result()
    }

    /// Give up ownership of the sentinel: close the handle and leave the
    /// file on disk for good. Later closes and Drop no longer remove it.
    pub(crate) fn keep(&mut self) {
        self.close_handle();
        self.released = true;
    }

    fn remove(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(FileError::Io(format!(
                    "failed to remove control file '{}': {}",
                    self.path.display(),
                    e
                )));
            }
        }
        self.released = true;
        tracing::debug!(path = %self.path.display(), kind = %self.kind, "control file removed");
        Ok(())
    }
}

impl Drop for ControlFile {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = self.close()
        {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to release control file"
            );
        }
    }
}

/// Exclusive create of a sentinel; an existing sentinel is lock contention.
fn create_sentinel(data_path: &Path, sentinel: &Path, reason: &str) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(sentinel)
        .map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                FileError::Lock(data_path.to_path_buf(), reason.to_string())
            } else {
                FileError::Io(format!(
                    "failed to create control file '{}': {}",
                    sentinel.display(),
                    e
                ))
            }
        })
}

/// Whether any RLock sentinel for `path` exists.
pub(crate) fn rlock_exists(path: &Path) -> Result<bool> {
    let pattern = SentinelPattern::new(path)?;
    let dir = sentinel_dir(path);
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
        if let Some(name) = entry.file_name().to_str()
            && pattern.classify(name) == Some(ControlFileKind::RLock)
        {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Directory holding the sentinels of `path`.
pub(crate) fn sentinel_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn with_rollback(cause: FileError, rollback: Result<()>) -> FileError {
    match rollback {
        Ok(()) => cause,
        Err(e) => FileError::composite(cause, e),
    }
}

fn create_lock(path: &Path) -> Result<ControlFile> {
    let lock_path = lock_file_path(path)?;
    if lock_path.exists() {
        return Err(FileError::Lock(
            path.to_path_buf(),
            "locked by another session".to_string(),
        ));
    }
    if rlock_exists(path)? {
        return Err(FileError::Lock(
            path.to_path_buf(),
            "read by another session".to_string(),
        ));
    }

    let file = create_sentinel(path, &lock_path, "locked by another session")?;
    let mut lock = ControlFile::new(lock_path, ControlFileKind::Lock, file);

    // A reader may have created its RLock between the check and our create.
    match rlock_exists(path) {
        Ok(false) => Ok(lock),
        Ok(true) => {
            let cause = FileError::Lock(
                path.to_path_buf(),
                "read by another session".to_string(),
            );
            Err(with_rollback(cause, lock.close()))
        }
        Err(e) => Err(with_rollback(e, lock.close())),
    }
}

fn create_rlock(path: &Path) -> Result<ControlFile> {
    let lock_path = lock_file_path(path)?;
    if lock_path.exists() {
        return Err(FileError::Lock(
            path.to_path_buf(),
            "locked by another session".to_string(),
        ));
    }

    let file = create_sentinel(path, &lock_path, "locked by another session")?;
    let mut transient = ControlFile::new(lock_path, ControlFileKind::Lock, file);

    let created = create_unique_rlock(path);
    let released = transient.close();

    match (created, released) {
        (Ok(rlock), Ok(())) => Ok(rlock),
        (Ok(mut rlock), Err(e)) => Err(with_rollback(e, rlock.close())),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(release_err)) => Err(FileError::composite(e, release_err)),
    }
}

fn create_unique_rlock(path: &Path) -> Result<ControlFile> {
    for _ in 0..RLOCK_NAME_ATTEMPTS {
        let rlock_path = rlock_file_path(path)?;
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&rlock_path)
        {
            Ok(file) => return Ok(ControlFile::new(rlock_path, ControlFileKind::RLock, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(FileError::Io(format!(
                    "failed to create control file '{}': {}",
                    rlock_path.display(),
                    e
                )));
            }
        }
    }
    Err(FileError::Io(format!(
        "failed to generate a unique read lock name for '{}'",
        path.display()
    )))
}

fn create_temp(path: &Path) -> Result<ControlFile> {
    let temp_path = temp_file_path(path)?;
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| {
            FileError::Io(format!(
                "failed to create temporary file '{}': {}",
                temp_path.display(),
                e
            ))
        })?;
    Ok(ControlFile::new(temp_path, ControlFileKind::Temporary, file))
}
