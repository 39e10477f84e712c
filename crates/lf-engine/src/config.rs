//! Pipeline configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Timing and capacity settings for a [`crate::Session`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Quiet period after the last parameter change before a transform starts
    pub debounce_ms: u64,

    /// Watchdog for a single transform job, from request to result
    pub job_timeout_ms: u64,

    /// Minimum spacing between progress reports from a unit
    pub progress_interval_ms: u64,

    /// Playback position refresh and loop check interval
    pub tick_interval_ms: u64,

    /// Queued transport commands before senders wait
    pub command_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            job_timeout_ms: 60_000,
            progress_interval_ms: 250,
            tick_interval_ms: 25,
            command_capacity: 64,
        }
    }
}

impl PipelineConfig {
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn with_job_timeout_ms(mut self, ms: u64) -> Self {
        self.job_timeout_ms = ms;
        self
    }

    pub fn with_progress_interval_ms(mut self, ms: u64) -> Self {
        self.progress_interval_ms = ms;
        self
    }

    pub fn with_tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = ms;
        self
    }

    pub fn with_command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Reject values the control loop cannot run with
    pub fn validate(&self) -> SessionResult<()> {
        if self.job_timeout_ms == 0 {
            return Err(SessionError::Config("job_timeout_ms must be positive".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(SessionError::Config("tick_interval_ms must be positive".into()));
        }
        if self.command_capacity == 0 {
            return Err(SessionError::Config("command_capacity must be positive".into()));
        }
        Ok(())
    }

    /// Parse JSON; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> SessionResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SessionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> SessionResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_json_str(&json)?;
        log::info!("[Config] Loaded pipeline config from {}", path.display());
        Ok(config)
    }
}
