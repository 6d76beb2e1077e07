//! Config struct definition and default implementation.

use serde::{Deserialize, Serialize};

/// Settings shared by every file session a process opens.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How long a session waits for a conflicting lock before giving up.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,

    /// Pause between two lock attempts while waiting.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Whether commit flushes file contents to disk before publishing.
    #[serde(default = "default_true")]
    pub sync_on_commit: bool,

    /// Minutes after which a control file is reported as stale.
    #[serde(default = "default_stale_minutes")]
    pub stale_minutes: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wait_timeout_ms: default_wait_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            sync_on_commit: default_true(),
            stale_minutes: default_stale_minutes(),
        }
    }
}

fn default_wait_timeout_ms() -> u64 {
    10_000
}

fn default_retry_delay_ms() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_stale_minutes() -> u32 {
    120
}
