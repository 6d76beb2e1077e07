//! CLI argument parsing for csvlock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// csvlock: cooperative file locking for shared data files.
///
/// Every session leaves sentinel files next to the data file:
/// - `.<name>.<id>.rlock` while a reader holds it
/// - `.<name>.lock` while a writer holds it
/// - `.<name>.temp` while an update is staged
#[derive(Parser, Debug)]
#[command(name = "csvlock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a YAML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override how long to wait for a conflicting lock, in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Override the pause between lock attempts, in milliseconds.
    #[arg(long, global = true)]
    pub retry_delay_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for csvlock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a file to stdout under a read lock.
    Cat(PathArgs),

    /// Print the first bytes of a file under a read lock.
    Head(HeadArgs),

    /// Create a new file from stdin under the exclusive lock.
    ///
    /// Fails if the file already exists.
    Create(PathArgs),

    /// Replace an existing file's contents with stdin.
    ///
    /// The new contents are staged next to the file and only replace it
    /// once fully written.
    Update(PathArgs),

    /// List the control files present for a data file.
    Locks(LocksArgs),

    /// Remove every control file of a data file.
    ///
    /// Only use this after the sessions that created them have crashed.
    Clear(ClearArgs),
}

/// A single data file operand.
#[derive(Parser, Debug)]
pub struct PathArgs {
    /// Path to the data file.
    pub path: PathBuf,
}

/// Arguments for the `head` command.
#[derive(Parser, Debug)]
pub struct HeadArgs {
    /// Path to the data file.
    pub path: PathBuf,

    /// Number of bytes to print.
    #[arg(long, short = 'c', default_value_t = 1024)]
    pub bytes: usize,
}

/// Arguments for the `locks` command.
#[derive(Parser, Debug)]
pub struct LocksArgs {
    /// Path to the data file.
    pub path: PathBuf,

    /// Print the list as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `clear` command.
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Path to the data file.
    pub path: PathBuf,

    /// Required to actually remove the control files.
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
