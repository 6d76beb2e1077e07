//! Error types for csvlock.
//!
//! Uses thiserror for derive macros. Raw `std::io::Error`s are translated
//! into these kinds at the I/O boundary so callers can branch on lock
//! contention versus timeout versus plain I/O failure.

use crate::exit_codes;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for file session operations.
#[derive(Error, Debug)]
pub enum FileError {
    /// Low-level I/O failure.
    #[error("{0}")]
    Io(String),

    /// The file was required to exist but does not.
    #[error("file {} does not exist", .0.display())]
    NotExist(PathBuf),

    /// The file was required not to exist but does.
    #[error("file {} already exists", .0.display())]
    AlreadyExist(PathBuf),

    /// Another session holds a conflicting lock.
    #[error("file {} is locked: {}", .0.display(), .1)]
    Lock(PathBuf, String),

    /// Lock contention was not resolved before the deadline.
    #[error("file {}: lock wait timeout period exceeded", .0.display())]
    Timeout(PathBuf),

    /// The caller canceled the wait.
    #[error("context canceled")]
    Canceled,

    /// The wait context finished for a reason other than cancellation.
    #[error("context done: {0}")]
    ContextDone(String),

    /// The session was not opened for writing.
    #[error("file {} cannot be updated", .0.display())]
    NotUpdatable(PathBuf),

    /// A session for the same path is already registered in this process.
    #[error("file {} is already opened", .0.display())]
    AlreadyOpened(PathBuf),

    /// Invalid configuration or command-line usage.
    #[error("{0}")]
    User(String),

    /// Two causes chained for display.
    #[error("{0}: {1}")]
    Composite(Box<FileError>, Box<FileError>),

    /// Every failure collected during a best-effort cleanup.
    #[error(transparent)]
    ForcedUnlock(#[from] ForcedUnlockError),
}

impl FileError {
    /// Chain a cleanup failure onto the error that triggered the cleanup.
    pub fn composite(cause: FileError, cleanup: FileError) -> Self {
        FileError::Composite(Box::new(cause), Box::new(cleanup))
    }

    /// Translate a raw I/O error for `path` into the taxonomy.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FileError::NotExist(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => FileError::AlreadyExist(path.to_path_buf()),
            _ => FileError::Io(format!("{}: {}", path.display(), err)),
        }
    }

    /// Whether the retry loop may try again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FileError::Lock(..))
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            FileError::Io(_) => exit_codes::IO_FAILURE,
            FileError::NotExist(_)
            | FileError::AlreadyExist(_)
            | FileError::NotUpdatable(_)
            | FileError::AlreadyOpened(_)
            | FileError::User(_) => exit_codes::USER_ERROR,
            FileError::Lock(..) => exit_codes::LOCK_FAILURE,
            FileError::Timeout(_) => exit_codes::TIMEOUT,
            FileError::Canceled | FileError::ContextDone(_) => exit_codes::CANCELED,
            FileError::Composite(cause, _) => cause.exit_code(),
            FileError::ForcedUnlock(_) => exit_codes::IO_FAILURE,
        }
    }
}

/// Aggregate of independent cleanup failures.
///
/// An empty list means nothing failed; use [`ForcedUnlockError::into_result`]
/// to turn it into a `Result`.
#[derive(Debug, Default)]
pub struct ForcedUnlockError {
    pub errors: Vec<FileError>,
}

impl ForcedUnlockError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the failure of one cleanup step, if any.
    pub fn record(&mut self, result: Result<()>) {
        if let Err(e) = result {
            self.push(e);
        }
    }

    /// Add a failure, flattening nested aggregates into this list.
    pub fn push(&mut self, err: FileError) {
        match err {
            FileError::ForcedUnlock(inner) => self.errors.extend(inner.errors),
            other => self.errors.push(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(FileError::ForcedUnlock(self))
        }
    }
}

impl fmt::Display for ForcedUnlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("\n"))
    }
}

impl std::error::Error for ForcedUnlockError {}

/// Result type alias for csvlock operations.
pub type Result<T> = std::result::Result<T, FileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_error_is_the_only_retryable_kind() {
        assert!(FileError::Lock(PathBuf::from("a.csv"), "held".to_string()).is_retryable());
        assert!(!FileError::Timeout(PathBuf::from("a.csv")).is_retryable());
        assert!(!FileError::Canceled.is_retryable());
        assert!(!FileError::Io("boom".to_string()).is_retryable());
    }

    #[test]
    fn error_kinds_have_distinct_exit_codes() {
        let lock = FileError::Lock(PathBuf::from("a.csv"), "held".to_string());
        let timeout = FileError::Timeout(PathBuf::from("a.csv"));
        assert_eq!(lock.exit_code(), exit_codes::LOCK_FAILURE);
        assert_eq!(timeout.exit_code(), exit_codes::TIMEOUT);
        assert_eq!(FileError::Canceled.exit_code(), exit_codes::CANCELED);
        assert_eq!(
            FileError::NotExist(PathBuf::from("a.csv")).exit_code(),
            exit_codes::USER_ERROR
        );
    }

    #[test]
    fn composite_keeps_cause_exit_code_and_both_messages() {
        let err = FileError::composite(
            FileError::Timeout(PathBuf::from("a.csv")),
            FileError::Io("cleanup failed".to_string()),
        );
        assert_eq!(err.exit_code(), exit_codes::TIMEOUT);
        let msg = err.to_string();
        assert!(msg.contains("lock wait timeout period exceeded"));
        assert!(msg.contains("cleanup failed"));
    }

    #[test]
    fn empty_forced_unlock_error_is_ok() {
        let errs = ForcedUnlockError::new();
        assert!(errs.into_result().is_ok());
    }

    #[test]
    fn forced_unlock_error_flattens_and_lists_every_failure() {
        let mut inner = ForcedUnlockError::new();
        inner.push(FileError::Io("first".to_string()));
        inner.push(FileError::Io("second".to_string()));

        let mut outer = ForcedUnlockError::new();
        outer.record(Ok(()));
        outer.push(FileError::ForcedUnlock(inner));
        outer.push(FileError::Io("third".to_string()));
        assert_eq!(outer.len(), 3);

        let err = outer.into_result().unwrap_err();
        assert_eq!(err.to_string(), "first\nsecond\nthird");
    }

    #[test]
    fn from_io_translates_existence_errors() {
        let path = Path::new("data.csv");
        let err = FileError::from_io(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, FileError::NotExist(_)));

        let err = FileError::from_io(path, io::Error::from(io::ErrorKind::AlreadyExists));
        assert!(matches!(err, FileError::AlreadyExist(_)));

        let err = FileError::from_io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, FileError::Io(_)));
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = FileError::Timeout(PathBuf::from("data.csv"));
        assert_eq!(err.to_string(), "file data.csv: lock wait timeout period exceeded");

        let err = FileError::NotUpdatable(PathBuf::from("data.csv"));
        assert_eq!(err.to_string(), "file data.csv cannot be updated");
    }
}
