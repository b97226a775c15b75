use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::record::ConsistencyRecord;

/// Failure cause stored when a record is abandoned.
pub const EXHAUSTED_CAUSE: &str = "exceeded max retries/expiry";

/// Minimum backoff per retry stage: `(first retry_count of the stage, floor secs)`.
///
/// - stage 1: `< 10`, the record's own interval
/// - stage 2: `10 <= n < 20`, at least 600s
/// - stage 3: `20 <= n < 30`, at least 1800s
/// - stage 4: `n >= 30`, at least 3600s
const STAGE_FLOORS: [(u32, u32); 3] = [(10, 600), (20, 1800), (30, 3600)];

/// Tiered backoff and expiry rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retry_count: u32,
    max_age: Duration,
    fail_cause_limit: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(10 * 24 * 3600), 100)
    }
}

impl RetryPolicy {
    pub fn new(max_retry_count: u32, max_age: Duration, fail_cause_limit: usize) -> Self {
        Self {
            max_retry_count,
            max_age,
            fail_cause_limit,
        }
    }

    pub fn max_retry_count(&self) -> u32 {
        self.max_retry_count
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Lower bound on the interval for a record that has made `retry_count`
    /// attempts, if its stage has one.
    pub fn stage_floor(retry_count: u32) -> Option<u32> {
        STAGE_FLOORS
            .iter()
            .rev()
            .find(|(start, _)| retry_count >= *start)
            .map(|(_, floor)| *floor)
    }

    /// Interval to schedule after an attempt made at `retry_count`.
    /// Never smaller than `current`.
    pub fn next_interval(retry_count: u32, current: u32) -> u32 {
        match Self::stage_floor(retry_count) {
            Some(floor) => current.max(floor),
            None => current,
        }
    }

    /// Record is past its attempt budget or its age ceiling.
    pub fn is_exhausted(&self, record: &ConsistencyRecord, now: DateTime<Utc>) -> bool {
        if record.retry_count >= self.max_retry_count {
            return true;
        }
        // Negative ages (clock skew) never expire a record.
        now.signed_duration_since(record.first_sent_time)
            .to_std()
            .is_ok_and(|age| age > self.max_age)
    }

    /// Keep at most `fail_cause_limit` characters of a failure description.
    pub fn truncate_cause(&self, cause: &str) -> String {
        cause.chars().take(self.fail_cause_limit).collect()
    }
}
