//! csvlock: file-based advisory locking for flat data files.
//!
//! Cooperating processes coordinate through sentinel files created next to
//! each data file. A [`Handler`] is one read, create or update session on a
//! file; a [`Container`] keeps at most one session per path in a process.
//! Updates are staged in a temporary file and published on commit.

pub mod cli;
pub mod commands;
pub mod config;
pub mod container;
pub mod context;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod handler;
pub mod locks;
pub mod reader;

pub use config::Config;
pub use container::Container;
pub use context::{CancelToken, WaitContext};
pub use error::{FileError, ForcedUnlockError, Result};
pub use handler::{Handler, OpenType};
pub use locks::{ControlFile, ControlFileInfo, ControlFileKind};
pub use reader::{Reader, Source};
