//! Locking subsystem for csvlock.
//!
//! This module implements the sentinel-file lock model that lets independent
//! processes share a data file:
//! - Shared read locks (`.NAME.RANDOM.rlock`), any number at a time
//! - Exclusive write lock (`.NAME.lock`)
//! - Staging file for updates (`.NAME.temp`)
//!
//! # Control Files
//!
//! Control files are empty and live next to the data file. Their existence
//! alone is the lock state, so no lock server is needed.
//!
//! # Races
//!
//! Presence checks followed by creation are not atomic across markers. The
//! transient Lock taken during RLock creation and the RLock re-check after
//! Lock creation narrow the window; they do not close it.

mod control;
mod naming;
mod operations;
mod types;

#[cfg(test)]
mod tests;

pub use control::ControlFile;
pub use naming::{
    RLOCK_NAME_ATTEMPTS, RLOCK_SUFFIX_LEN, SentinelPattern, lock_file_path, random_string,
    rlock_file_path, temp_file_path,
};
pub use operations::{clear_control_files, list_control_files};
pub use types::{ControlFileInfo, ControlFileKind};
