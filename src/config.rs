//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{OrchestratorError, OrchestratorResult};

const DEFAULT_GRACE_PERIOD_MS: u64 = 5_000;
const DEFAULT_PROGRESS_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_TOMBSTONE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrchestratorConfig {
    /// How long a finished transfer stays visible before it is retired.
    pub grace_period_ms: u64,
    /// Bound of the queue between the progress feed and the registry.
    pub progress_channel_capacity: usize,
    /// How many retired or dismissed ids are remembered to reject stragglers.
    pub tombstone_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            progress_channel_capacity: DEFAULT_PROGRESS_CHANNEL_CAPACITY,
            tombstone_capacity: DEFAULT_TOMBSTONE_CAPACITY,
        }
    }
}

impl OrchestratorConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Sets the grace period, rounded up to whole milliseconds.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        let millis = grace_period.as_nanos().div_ceil(1_000_000);
        self.grace_period_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        self
    }

    pub fn from_json_str(content: &str) -> OrchestratorResult<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> OrchestratorResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Loads the user config file if there is one, falling back to defaults.
    pub fn load_or_default() -> OrchestratorResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("transfer-orchestrator").join("config.json"))
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.grace_period_ms == 0 {
            return Err(OrchestratorError::InvalidConfig(
                "grace period must be greater than zero".into(),
            ));
        }
        if self.progress_channel_capacity == 0 {
            return Err(OrchestratorError::InvalidConfig(
                "progress channel capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
