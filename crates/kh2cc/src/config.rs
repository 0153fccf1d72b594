//! Configuration for the effect pack.
//!
//! Read from an optional TOML file; every key has a default so an empty or
//! missing file yields a working setup.
//!
//! ```toml
//! [timing]
//! instant_retry_ms = 500
//! start_retry_ms = 1000
//! refresh_retry_ms = 500
//! continue_interval_ms = 500
//! admission_timeout_ms = 30000
//!
//! [conflicts]
//! policy = "symmetrize"
//!
//! [healing]
//! enabled = true
//! interval_ms = 1000
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::conflict::SymmetryPolicy;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timing: TimingConfig,
    pub conflicts: ConflictConfig,
    pub healing: HealingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Oracle poll interval for instant effects
    pub instant_retry_ms: u64,
    /// Oracle poll interval before a timed effect starts
    pub start_retry_ms: u64,
    /// Retry interval when the oracle says no at a refresh tick
    pub refresh_retry_ms: u64,
    /// How often a running timed effect re-checks its continue condition
    pub continue_interval_ms: u64,
    /// Upper bound on conflict waits and start polling per request
    pub admission_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            instant_retry_ms: 500,
            start_retry_ms: 1000,
            refresh_retry_ms: 500,
            continue_interval_ms: 500,
            admission_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    pub policy: SymmetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealingConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 1000,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config = Self::parse(&content)?;
        debug!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent.
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        match Self::load(&path) {
            Ok(config) => Ok(config),
            Err(e) if e.is_not_found() => {
                warn!(
                    "Config file {} not found, using defaults",
                    path.as_ref().display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let t = &self.timing;
        for (name, value) in [
            ("timing.instant_retry_ms", t.instant_retry_ms),
            ("timing.start_retry_ms", t.start_retry_ms),
            ("timing.refresh_retry_ms", t.refresh_retry_ms),
            ("timing.continue_interval_ms", t.continue_interval_ms),
            ("healing.interval_ms", self.healing.interval_ms),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }
        Ok(())
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        let t = &self.timing;
        SchedulerConfig {
            instant_retry: Duration::from_millis(t.instant_retry_ms),
            start_retry: Duration::from_millis(t.start_retry_ms),
            refresh_retry: Duration::from_millis(t.refresh_retry_ms),
            continue_interval: Duration::from_millis(t.continue_interval_ms),
            admission_timeout: Duration::from_millis(t.admission_timeout_ms),
        }
    }

    pub fn healing_interval(&self) -> Duration {
        Duration::from_millis(self.healing.interval_ms)
    }
}

/// Timing knobs the scheduler runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub instant_retry: Duration,
    pub start_retry: Duration,
    pub refresh_retry: Duration,
    pub continue_interval: Duration,
    pub admission_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Config::default().scheduler()
    }
}

impl SchedulerConfig {
    /// Create a new configuration builder
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }
}

/// Builder for SchedulerConfig
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfigBuilder {
    instant_retry: Option<Duration>,
    start_retry: Option<Duration>,
    refresh_retry: Option<Duration>,
    continue_interval: Option<Duration>,
    admission_timeout: Option<Duration>,
}

impl SchedulerConfigBuilder {
    pub fn instant_retry(mut self, interval: Duration) -> Self {
        self.instant_retry = Some(interval);
        self
    }

    pub fn start_retry(mut self, interval: Duration) -> Self {
        self.start_retry = Some(interval);
        self
    }

    pub fn refresh_retry(mut self, interval: Duration) -> Self {
        self.refresh_retry = Some(interval);
        self
    }

    pub fn continue_interval(mut self, interval: Duration) -> Self {
        self.continue_interval = Some(interval);
        self
    }

    pub fn admission_timeout(mut self, timeout: Duration) -> Self {
        self.admission_timeout = Some(timeout);
        self
    }

    /// Set every polling interval at once (handy for tests and dry runs)
    pub fn poll_all(self, interval: Duration) -> Self {
        self.instant_retry(interval)
            .start_retry(interval)
            .refresh_retry(interval)
            .continue_interval(interval)
    }

    /// Build the configuration
    pub fn build(self) -> SchedulerConfig {
        let default = SchedulerConfig::default();
        SchedulerConfig {
            instant_retry: self.instant_retry.unwrap_or(default.instant_retry),
            start_retry: self.start_retry.unwrap_or(default.start_retry),
            refresh_retry: self.refresh_retry.unwrap_or(default.refresh_retry),
            continue_interval: self.continue_interval.unwrap_or(default.continue_interval),
            admission_timeout: self.admission_timeout.unwrap_or(default.admission_timeout),
        }
    }
}
