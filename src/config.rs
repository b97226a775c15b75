//! Handler configuration.
//!
//! ```yaml
//! consistency:
//!   confirm_destination: orders.confirm
//!   default_retry_interval_secs: 600
//!   max_retry_count: 100
//!   max_retry_age_secs: 864000
//!   fail_cause_limit: 100
//!   poll_interval_ms: 50
//! ```
//!
//! `ConsistencyConfig::from_env()` additionally reads
//! `CONSIS_CONFIRM_DESTINATION=orders.confirm`; `new()` and `default()` never
//! look at the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConsistencyError, ConsistencyResult};
use crate::outbox::RetryPolicy;
use crate::record::DEFAULT_RETRY_INTERVAL_SECS;

/// Environment override for the confirm destination.
pub const CONFIRM_DESTINATION_ENV: &str = "CONSIS_CONFIRM_DESTINATION";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyConfig {
    /// Queue this producer listens on for execution replies. Required for
    /// `ConfirmLevel::Executed`.
    pub confirm_destination: Option<String>,
    /// Backoff assigned to new records. Default: 600.
    pub default_retry_interval_secs: u32,
    /// Attempts before a record is abandoned. Default: 100.
    pub max_retry_count: u32,
    /// Age after which a record is abandoned. Default: 10 days.
    pub max_retry_age_secs: u64,
    /// Characters of a failure description kept on the record. Default: 100.
    pub fail_cause_limit: usize,
    /// Receive timeout of each listener poll. Default: 50.
    pub poll_interval_ms: u64,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            confirm_destination: None,
            default_retry_interval_secs: DEFAULT_RETRY_INTERVAL_SECS,
            max_retry_count: 100,
            max_retry_age_secs: 10 * 24 * 3600,
            fail_cause_limit: 100,
            poll_interval_ms: 50,
        }
    }
}

impl ConsistencyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults plus overrides from the process environment.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`; blank values are ignored.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(destination) = lookup(CONFIRM_DESTINATION_ENV).filter(|v| !v.trim().is_empty()) {
            self.confirm_destination = Some(destination);
        }
        self
    }

    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> ConsistencyResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConsistencyError::InvalidArgument(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_confirm_destination(mut self, destination: impl Into<String>) -> Self {
        self.confirm_destination = Some(destination.into());
        self
    }

    pub fn without_confirm_destination(mut self) -> Self {
        self.confirm_destination = None;
        self
    }

    pub fn with_default_retry_interval(mut self, secs: u32) -> Self {
        self.default_retry_interval_secs = secs;
        self
    }

    pub fn with_max_retry_count(mut self, max: u32) -> Self {
        self.max_retry_count = max;
        self
    }

    pub fn with_max_retry_age(mut self, age: Duration) -> Self {
        self.max_retry_age_secs = age.as_secs();
        self
    }

    pub fn with_fail_cause_limit(mut self, limit: usize) -> Self {
        self.fail_cause_limit = limit;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retry_count,
            Duration::from_secs(self.max_retry_age_secs),
            self.fail_cause_limit,
        )
    }

    pub fn validate(&self) -> ConsistencyResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConsistencyError::InvalidArgument(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.max_retry_count == 0 {
            return Err(ConsistencyError::InvalidArgument(
                "max_retry_count must be greater than zero".into(),
            ));
        }
        if let Some(destination) = &self.confirm_destination {
            if destination.trim().is_empty() {
                return Err(ConsistencyError::InvalidArgument(
                    "confirm_destination must not be blank".into(),
                ));
            }
        }
        Ok(())
    }
}
