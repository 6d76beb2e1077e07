//! Control file kinds and inspection records.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Kind of sentinel file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlFileKind {
    /// Shared read lock; many may coexist.
    RLock,
    /// Exclusive write lock; excludes other Locks and all RLocks.
    Lock,
    /// Private staging file for an update.
    Temporary,
}

impl ControlFileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlFileKind::RLock => "rlock",
            ControlFileKind::Lock => "lock",
            ControlFileKind::Temporary => "temp",
        }
    }
}

impl std::fmt::Display for ControlFileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sentinel found on disk for some data file.
#[derive(Debug, Clone, Serialize)]
pub struct ControlFileInfo {
    /// The sentinel path.
    pub path: PathBuf,

    pub kind: ControlFileKind,

    /// Last modification time of the sentinel, if the filesystem reports one.
    pub modified_at: Option<DateTime<Utc>>,

    /// Whether the sentinel is older than the configured threshold.
    pub is_stale: bool,
}

impl ControlFileInfo {
    pub fn age(&self) -> Option<Duration> {
        self.modified_at
            .map(|at| Utc::now().signed_duration_since(at))
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let Some(age) = self.age() else {
            return "unknown".to_string();
        };
        let minutes = age.num_minutes();
        let hours = age.num_hours();
        let days = age.num_days();

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else {
            format!("{}m", minutes)
        }
    }
}

impl std::fmt::Display for ControlFileInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, age: {}{})",
            self.path.display(),
            self.kind,
            self.age_string(),
            if self.is_stale { ", STALE" } else { "" }
        )
    }
}
