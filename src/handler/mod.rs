//! File sessions.
//!
//! A [`Handler`] ties the real file handle of one data file to the control
//! files that protect it for the duration of a read, create or update:
//!
//! | open type   | control files     | writes go to      |
//! |-------------|-------------------|-------------------|
//! | `ForRead`   | RLock             | (not updatable)   |
//! | `ForCreate` | Lock              | the new file      |
//! | `ForUpdate` | Lock + Temporary  | the staging file  |
//!
//! A session ends exactly once, through [`Handler::commit`],
//! [`Handler::close`] or [`Handler::close_with_errors`]; later calls are
//! no-ops. Dropping an unfinished session force-closes it.


use crate::context::WaitContext;
use crate::error::{FileError, ForcedUnlockError, Result};
use crate::fs::{io, publish, sync_staged};
use crate::locks::{ControlFile, ControlFileKind};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Purpose a session was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenType {
    ForRead,
    ForCreate,
    ForUpdate,
}

/// Session on one data file.
#[derive(Debug)]
pub struct Handler {
    path: PathBuf,
    file: Option<File>,
    open_type: OpenType,

    rlock: Option<ControlFile>,
    lock: Option<ControlFile>,
    temp: Option<ControlFile>,

    /// Whether `file` holds an OS advisory lock that must be released.
    os_locked: bool,
    /// Set once this session created the data file itself.
    created: bool,
    closed: bool,
    sync_on_commit: bool,
}

impl Handler {
    fn new(path: &Path, open_type: OpenType) -> Self {
        Self {
            path: path.to_path_buf(),
            file: None,
            open_type,
            rlock: None,
            lock: None,
            temp: None,
            os_locked: false,
            created: false,
            closed: false,
            sync_on_commit: true,
        }
    }

    /// Run the acquisition steps; on failure release whatever was acquired.
    fn build<F>(mut self, steps: F) -> Result<Self>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        match steps(&mut self) {
            Ok(()) => Ok(self),
            Err(e) => Err(isolated_cleanup(self, e)),
        }
    }

    /// Open an existing file for reading under a shared read lock.
    pub fn for_read(path: &Path, ctx: &WaitContext, retry_delay: Duration) -> Result<Self> {
        if !path.exists() {
            return Err(FileError::NotExist(path.to_path_buf()));
        }

        Self::new(path, OpenType::ForRead).build(|h| {
            h.rlock = Some(ControlFile::create_with_context(
                ctx,
                path,
                ControlFileKind::RLock,
                retry_delay,
            )?);
            h.file = Some(io::open_to_read(ctx, retry_delay, path)?);
            h.os_locked = true;
            Ok(())
        })
    }

    /// Create a file that does not exist yet, under the exclusive lock.
    pub fn for_create(path: &Path, ctx: &WaitContext, retry_delay: Duration) -> Result<Self> {
        if path.exists() {
            return Err(FileError::AlreadyExist(path.to_path_buf()));
        }

        Self::new(path, OpenType::ForCreate).build(|h| {
            h.lock = Some(ControlFile::create_with_context(
                ctx,
                path,
                ControlFileKind::Lock,
                retry_delay,
            )?);
            h.file = Some(io::create(path)?);
            h.os_locked = true;
            h.created = true;
            Ok(())
        })
    }

    /// Open an existing file for replacement under the exclusive lock.
    ///
    /// New contents are written to the staging file returned by
    /// [`Handler::file_for_update`] and published on commit.
    pub fn for_update(path: &Path, ctx: &WaitContext, retry_delay: Duration) -> Result<Self> {
        if !path.exists() {
            return Err(FileError::NotExist(path.to_path_buf()));
        }

        Self::new(path, OpenType::ForUpdate).build(|h| {
            h.lock = Some(ControlFile::create_with_context(
                ctx,
                path,
                ControlFileKind::Lock,
                retry_delay,
            )?);
            h.file = Some(io::open_to_update(ctx, retry_delay, path)?);
            h.os_locked = true;
            h.temp = Some(ControlFile::create_with_context(
                ctx,
                path,
                ControlFileKind::Temporary,
                retry_delay,
            )?);
            Ok(())
        })
    }

    /// Open an existing file for reading without any control file.
    ///
    /// For callers that already guarantee exclusive access by other means.
    pub fn without_lock(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FileError::NotExist(path.to_path_buf()));
        }

        Self::new(path, OpenType::ForRead).build(|h| {
            h.file = Some(io::open_without_lock(path)?);
            Ok(())
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open_type(&self) -> OpenType {
        self.open_type
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether the real file handle currently holds an OS advisory lock.
    pub fn holds_os_lock(&self) -> bool {
        self.os_locked && self.file.is_some()
    }

    /// Whether commit flushes new contents to disk before publishing them.
    pub fn sync_on_commit(&self) -> bool {
        self.sync_on_commit
    }

    pub fn set_sync_on_commit(&mut self, sync: bool) {
        self.sync_on_commit = sync;
    }

    /// The real file handle. `None` once the session has ended.
    pub fn file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    pub fn file_mut(&mut self) -> Option<&mut File> {
        self.file.as_mut()
    }

    /// The handle new contents must be written to.
    pub fn file_for_update(&mut self) -> Result<&mut File> {
        let path = self.path.clone();
        let file = match self.open_type {
            OpenType::ForUpdate => self.temp.as_mut().and_then(ControlFile::file_mut),
            OpenType::ForCreate => self.file.as_mut(),
            OpenType::ForRead => return Err(FileError::NotUpdatable(path)),
        };
        file.ok_or_else(|| FileError::Io(format!("file {} is already closed", path.display())))
    }

    /// Publish pending work and end the session.
    ///
    /// For an update the staged contents replace the original file. This
    /// step removes the original before renaming the staged file over it,
    /// so a crash in between leaves only the staged file on disk. If the
    /// rename fails after the original is gone, the staged file is kept
    /// rather than cleaned up.
    pub fn commit(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        match self.open_type {
            OpenType::ForUpdate => {
                self.close_file()?;
                if let Some(temp) = self.temp.as_mut() {
                    if self.sync_on_commit
                        && let Some(file) = temp.file()
                    {
                        sync_staged(temp.path(), file)?;
                    }
                    temp.close_handle();
                    if let Err(e) = publish(temp.path(), &self.path, self.sync_on_commit) {
                        self.keep_orphaned_staging();
                        return Err(e);
                    }
                }
            }
            OpenType::ForCreate => {
                if self.sync_on_commit
                    && let Some(file) = self.file.as_ref()
                {
                    sync_staged(&self.path, file)?;
                }
                self.close_file()?;
                self.created = false;
            }
            OpenType::ForRead => self.close_file()?,
        }

        self.release_control_files()?;
        self.closed = true;
        tracing::debug!(path = %self.path.display(), open_type = ?self.open_type, "session committed");
        Ok(())
    }

    /// Discard pending work and end the session.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.close_file()?;
        self.remove_created_file()?;
        self.keep_orphaned_staging();
        self.release_control_files()?;
        self.closed = true;
        tracing::debug!(path = %self.path.display(), open_type = ?self.open_type, "session closed");
        Ok(())
    }

    /// Like [`Handler::close`], but runs every cleanup step regardless of
    /// failures and reports all of them.
    pub fn close_with_errors(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        let mut errors = ForcedUnlockError::new();
        errors.record(self.close_file());
        errors.record(self.remove_created_file());
        self.keep_orphaned_staging();
        for slot in [&mut self.temp, &mut self.lock, &mut self.rlock] {
            if let Some(mut control) = slot.take() {
                errors.record(control.close_with_errors());
            }
        }
        self.closed = true;

        if !errors.is_empty() {
            tracing::warn!(
                path = %self.path.display(),
                failures = errors.len(),
                "forced close left errors"
            );
        }
        errors.into_result()
    }

    fn close_file(&mut self) -> Result<()> {
        match self.file.take() {
            Some(file) if self.os_locked => io::close(&self.path, file),
            Some(file) => {
                drop(file);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// When the original file is gone but staged contents exist, the staging
    /// file is the only copy of the data: detach it so no cleanup path
    /// deletes it.
    fn keep_orphaned_staging(&mut self) {
        if self.path.exists() {
            return;
        }
        if let Some(mut temp) = self.temp.take() {
            if !temp.path().exists() {
                self.temp = Some(temp);
                return;
            }
            temp.keep();
            tracing::warn!(
                path = %self.path.display(),
                staged = %temp.path().display(),
                "original file is missing; keeping staged contents"
            );
        }
    }

    /// Remove a file this session created but never committed.
    fn remove_created_file(&mut self) -> Result<()> {
        if !self.created {
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(FileError::Io(format!(
                    "failed to remove '{}': {}",
                    self.path.display(),
                    e
                )));
            }
        }
        self.created = false;
        Ok(())
    }

    /// Release temp, lock, then rlock. A control file that fails to release
    /// stays attached so a forced close can retry it.
    fn release_control_files(&mut self) -> Result<()> {
        for slot in [&mut self.temp, &mut self.lock, &mut self.rlock] {
            if let Some(mut control) = slot.take()
                && let Err(e) = control.close()
            {
                *slot = Some(control);
                return Err(e);
            }
        }
        Ok(())
    }
}

impl Drop for Handler {
    fn drop(&mut self) {
        if !self.closed
            && let Err(e) = self.close_with_errors()
        {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to clean up unfinished session"
            );
        }
    }
}

/// Force-close a partially built or rejected handler and fold any cleanup
/// failure into `cause`.
pub(crate) fn isolated_cleanup(mut handler: Handler, cause: FileError) -> FileError {
    match handler.close_with_errors() {
        Ok(()) => cause,
        Err(cleanup) => FileError::composite(cause, cleanup),
    }
}
