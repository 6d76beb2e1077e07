//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::context::WaitContext;
use crate::error::{FileError, Result};
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward
    /// compatibility. A parse error or a validation failure is reported as
    /// [`FileError::User`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            FileError::User(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // serde_yaml rejects an empty document for a struct
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| FileError::User(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| FileError::User(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values.
    ///
    /// `wait_timeout_ms`, `retry_delay_ms` and `stale_minutes` must all be
    /// positive.
    pub fn validate(&self) -> Result<()> {
        if self.wait_timeout_ms == 0 {
            return Err(invalid("wait_timeout_ms must be greater than 0"));
        }
        if self.retry_delay_ms == 0 {
            return Err(invalid("retry_delay_ms must be greater than 0"));
        }
        if self.stale_minutes == 0 {
            return Err(invalid("stale_minutes must be greater than 0"));
        }
        if self.retry_delay_ms > self.wait_timeout_ms {
            return Err(invalid(
                "retry_delay_ms must not be greater than wait_timeout_ms",
            ));
        }
        Ok(())
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// A wait context whose deadline is `wait_timeout` from now.
    pub fn wait_context(&self) -> WaitContext {
        WaitContext::with_timeout(self.wait_timeout())
    }
}

fn invalid(reason: &str) -> FileError {
    FileError::User(format!("config validation failed: {}", reason))
}
