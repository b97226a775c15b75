use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default backoff (seconds) assigned to new records.
pub const DEFAULT_RETRY_INTERVAL_SECS: u32 = 10 * 60;

/// Guarantee strength requested by the producer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfirmLevel {
    /// Resolves to `Sent`.
    #[default]
    Default,
    /// Delivery to the broker is enough.
    Sent,
    /// The consumer must acknowledge execution with a reply.
    Executed,
}

impl ConfirmLevel {
    /// Wire ordinal (0=DEFAULT, 1=SENT, 2=EXECUTED).
    pub fn ordinal(self) -> u8 {
        match self {
            ConfirmLevel::Default => 0,
            ConfirmLevel::Sent => 1,
            ConfirmLevel::Executed => 2,
        }
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(ConfirmLevel::Default),
            1 => Some(ConfirmLevel::Sent),
            2 => Some(ConfirmLevel::Executed),
            _ => None,
        }
    }

    /// Collapse `Default` into the level it stands for.
    pub fn resolve(self) -> Self {
        match self {
            ConfirmLevel::Default => ConfirmLevel::Sent,
            other => other,
        }
    }
}

/// How far a record has progressed. Ordered: `Initial < Sent < Executed`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ConfirmStatus {
    #[default]
    Initial,
    Sent,
    Executed,
}

/// Whether the compensation sweep should pick the record up again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetryStatus {
    #[default]
    Yes,
    No,
}

/// Durable intent to deliver one message.
///
/// Created by the outbox handler inside the caller's transaction, mutated
/// by the retry engine on every publish attempt and by the confirmation
/// protocol when a reply arrives. Never deleted by this crate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyRecord {
    /// Store-assigned identity, `0` until persisted.
    pub id: u64,
    /// Producer-assigned correlation key for confirmation replies.
    pub tx_id: String,
    pub destination: String,
    pub confirm_destination: Option<String>,
    pub content: Vec<u8>,
    pub biz_id: String,
    pub confirm_level: ConfirmLevel,
    pub confirm_status: ConfirmStatus,
    pub retry_status: RetryStatus,
    pub retry_count: u32,
    /// Current backoff in seconds.
    pub retry_interval: u32,
    /// Next eligible attempt.
    pub retry_time: DateTime<Utc>,
    /// Anchor for the expiry ceiling.
    pub first_sent_time: DateTime<Utc>,
    pub fail_cause: Option<String>,
    pub confirm_sent_time: Option<DateTime<Utc>>,
    pub confirm_execute_time: Option<DateTime<Utc>>,
    pub execute_host: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConsistencyRecord {
    /// Create a record for `destination` carrying already-encoded content.
    pub fn new(destination: impl Into<String>, content: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            tx_id: Uuid::new_v4().to_string(),
            destination: destination.into(),
            confirm_destination: None,
            content,
            biz_id: String::new(),
            confirm_level: ConfirmLevel::Sent,
            confirm_status: ConfirmStatus::Initial,
            retry_status: RetryStatus::Yes,
            retry_count: 0,
            retry_interval: DEFAULT_RETRY_INTERVAL_SECS,
            retry_time: now + TimeDelta::seconds(i64::from(DEFAULT_RETRY_INTERVAL_SECS)),
            first_sent_time: now,
            fail_cause: None,
            confirm_sent_time: None,
            confirm_execute_time: None,
            execute_host: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_biz_id(mut self, biz_id: impl Into<String>) -> Self {
        self.biz_id = biz_id.into();
        self
    }

    pub fn with_confirm_level(mut self, level: ConfirmLevel) -> Self {
        self.confirm_level = level;
        self
    }

    pub fn with_retry_interval(mut self, secs: u32) -> Self {
        self.retry_interval = secs;
        self
    }

    pub fn with_tx_id(mut self, tx_id: impl Into<String>) -> Self {
        self.tx_id = tx_id.into();
        self
    }

    pub fn content_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }

    pub fn is_retryable(&self) -> bool {
        self.retry_status == RetryStatus::Yes
    }

    /// Eligible for the compensation sweep at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_retryable() && self.retry_time <= now
    }

    pub fn is_executed(&self) -> bool {
        self.confirm_status == ConfirmStatus::Executed
    }

    /// Move `confirm_status` forward; never backward.
    pub fn advance_confirm_status(&mut self, status: ConfirmStatus) -> bool {
        if status > self.confirm_status {
            self.confirm_status = status;
            true
        } else {
            false
        }
    }

    /// Record a successful publish.
    pub fn mark_sent(&mut self, at: DateTime<Utc>) {
        self.confirm_sent_time = Some(at);
        self.advance_confirm_status(ConfirmStatus::Sent);
        self.retry_status = if self.confirm_level.resolve() == ConfirmLevel::Sent || self.is_executed()
        {
            RetryStatus::No
        } else {
            RetryStatus::Yes
        };
        self.fail_cause = None;
    }

    /// Record a failed publish; the record stays retryable.
    pub fn mark_failed(&mut self, cause: impl Into<String>) {
        self.fail_cause = Some(cause.into());
    }

    /// Record a positive execution reply from a consumer.
    pub fn mark_executed(&mut self, at: DateTime<Utc>, host: impl Into<String>) {
        self.advance_confirm_status(ConfirmStatus::Executed);
        self.confirm_execute_time = Some(at);
        self.execute_host = Some(host.into());
        self.retry_status = RetryStatus::No;
    }

    /// Stop all further attempts.
    pub fn mark_exhausted(&mut self, cause: impl Into<String>) {
        self.retry_status = RetryStatus::No;
        self.fail_cause = Some(cause.into());
    }
}
