//! DAO configuration.
//!
//! Loaded from TOML; every section falls back to its defaults when absent.

use std::path::Path;
use std::time::Duration;

use crowdchain_governance::GovernorSettings;
use serde::{Deserialize, Serialize};

use crate::error::DaoError;
use crate::poll::PollOptions;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaoConfig {
    /// Voting windows and quorum
    pub governor: GovernorConfig,
    /// Execution delay and grace window
    pub timelock: TimelockConfig,
    /// Consumer-side state polling
    pub polling: PollingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl DaoConfig {
    /// Load configuration from file.
    pub fn from_file(path: &Path) -> Result<Self, DaoError> {
        if path.to_string_lossy().contains("..") {
            return Err(DaoError::Config("invalid path: directory traversal detected".to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: DaoConfig = toml::from_str(&contents)
            .map_err(|e| DaoError::Config(format!("failed to parse '{}': {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn to_file(&self, path: &Path) -> Result<(), DaoError> {
        if path.to_string_lossy().contains("..") {
            return Err(DaoError::Config("invalid path: directory traversal detected".to_string()));
        }

        let contents = self.to_toml()?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, DaoError> {
        toml::to_string_pretty(self).map_err(|e| DaoError::Config(e.to_string()))
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), DaoError> {
        self.governor_settings().validate()?;

        if self.polling.max_tries == 0 {
            return Err(DaoError::Config("polling.max_tries must be positive".to_string()));
        }
        if self.polling.interval_ms == 0 {
            return Err(DaoError::Config("polling.interval_ms must be positive".to_string()));
        }
        if self.polling.backoff_factor == 0 {
            return Err(DaoError::Config("polling.backoff_factor must be positive".to_string()));
        }
        if self.polling.max_interval_ms < self.polling.interval_ms {
            return Err(DaoError::Config(
                "polling.max_interval_ms must not be below polling.interval_ms".to_string(),
            ));
        }

        Ok(())
    }

    /// Governor parameters, with the grace window taken from the timelock section.
    pub fn governor_settings(&self) -> GovernorSettings {
        GovernorSettings {
            voting_delay: self.governor.voting_delay,
            voting_period: self.governor.voting_period,
            quorum_bps: self.governor.quorum_bps,
            proposal_threshold: u128::from(self.governor.proposal_threshold),
            grace_period: self.timelock.grace_period,
        }
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions {
            interval: Duration::from_millis(self.polling.interval_ms),
            max_tries: self.polling.max_tries,
            backoff_factor: self.polling.backoff_factor,
            max_interval: Duration::from_millis(self.polling.max_interval_ms),
        }
    }
}

/// Governor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Ticks between proposal and snapshot
    pub voting_delay: u64,
    /// Ticks the vote stays open
    pub voting_period: u64,
    /// Quorum in basis points of supply at the snapshot
    pub quorum_bps: u16,
    /// Minimum voting power to propose
    pub proposal_threshold: u64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            voting_delay: 1,
            voting_period: 50,
            quorum_bps: 400,
            proposal_threshold: 0,
        }
    }
}

/// Timelock configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelockConfig {
    /// Minimum delay between queue and execute
    pub min_delay: u64,
    /// Window after the delay during which execution is still allowed
    pub grace_period: u64,
}

impl Default for TimelockConfig {
    fn default() -> Self {
        Self {
            min_delay: 3600,
            grace_period: 1_209_600, // 14 days
        }
    }
}

/// Polling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub max_tries: u32,
    /// Multiplier applied to the interval after each miss
    pub backoff_factor: u32,
    pub max_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            max_tries: 20,
            backoff_factor: 2,
            max_interval_ms: 30_000,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive
    pub level: String,
    /// Emit JSON lines instead of pretty output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
