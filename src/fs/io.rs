//! Raw file primitives used by handlers.
//!
//! Every function translates `std::io::Error` into [`FileError`] so that
//! lock contention on the OS advisory lock surfaces as a retryable
//! [`FileError::Lock`].

use crate::context::WaitContext;
use crate::error::{FileError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::Duration;

/// Open `path` read-only holding a shared OS lock, retrying on contention.
pub fn open_to_read(ctx: &WaitContext, retry_delay: Duration, path: &Path) -> Result<File> {
    ctx.retry(path, retry_delay, || {
        let file = File::open(path).map_err(|e| FileError::from_io(path, e))?;
        try_lock(path, FileExt::try_lock_shared(&file))?;
        Ok(file)
    })
}

/// Open `path` for read/write holding an exclusive OS lock, retrying on contention.
pub fn open_to_update(ctx: &WaitContext, retry_delay: Duration, path: &Path) -> Result<File> {
    ctx.retry(path, retry_delay, || {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| FileError::from_io(path, e))?;
        try_lock(path, FileExt::try_lock_exclusive(&file))?;
        Ok(file)
    })
}

/// Create a new file that must not exist yet, holding an exclusive OS lock.
pub fn create(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| FileError::from_io(path, e))?;
    try_lock(path, FileExt::try_lock_exclusive(&file))?;
    Ok(file)
}

/// Open `path` read-only without any lock.
pub fn open_without_lock(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| FileError::from_io(path, e))
}

/// Release the OS lock held on `file` and drop the handle.
pub fn close(path: &Path, file: File) -> Result<()> {
    FileExt::unlock(&file).map_err(|e| FileError::from_io(path, e))
}

fn try_lock(path: &Path, result: io::Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => Err(FileError::Lock(
            path.to_path_buf(),
            "held by another process".to_string(),
        )),
        Err(e) => Err(FileError::from_io(path, e)),
    }
}
