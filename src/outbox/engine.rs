use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use super::policy::{RetryPolicy, EXHAUSTED_CAUSE};
use crate::bus::Sender;
use crate::confirm::outbound_message;
use crate::error::{ConsistencyError, ConsistencyResult};
use crate::lock::{InMemoryLockManager, LockManager};
use crate::record::ConsistencyRecord;
use crate::store::{ConsistencyStore, StoreError};

/// One publish attempt per call, with bookkeeping.
///
/// Shared by the post-commit send, the compensation sweep and the manual
/// `attempt_send` entry point.
pub(crate) struct RetryEngine<S, T> {
    store: Arc<S>,
    transport: Arc<T>,
    policy: RetryPolicy,
    locks: Arc<InMemoryLockManager>,
}

impl<S, T> Clone for RetryEngine<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            transport: Arc::clone(&self.transport),
            policy: self.policy.clone(),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S, T> RetryEngine<S, T>
where
    S: ConsistencyStore,
    T: Sender,
{
    pub(crate) fn new(
        store: Arc<S>,
        transport: Arc<T>,
        policy: RetryPolicy,
        locks: Arc<InMemoryLockManager>,
    ) -> Self {
        Self {
            store,
            transport,
            policy,
            locks,
        }
    }

    pub(crate) fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Attempt to publish `record` and persist the outcome.
    ///
    /// `Ok(true)` means the transport accepted the message. `Ok(false)` means
    /// it did not, or the record has run out of attempts. Transport failures
    /// never surface as `Err`; they are stored in `fail_cause`.
    ///
    /// Callers must hold the record's lock.
    pub(crate) fn attempt_send(&self, record: &mut ConsistencyRecord) -> ConsistencyResult<bool> {
        let now = Utc::now();

        if self.policy.is_exhausted(record, now) {
            warn!(
                tx_id = %record.tx_id,
                retry_count = record.retry_count,
                "giving up on consistency message"
            );
            record.mark_exhausted(EXHAUSTED_CAUSE);
            record.updated_at = now;
            self.store.update(record)?;
            return Ok(false);
        }

        let message = match outbound_message(record) {
            Ok(message) => message,
            Err(err) => {
                warn!(tx_id = %record.tx_id, error = %err, "cannot build consistency message");
                record.mark_exhausted(self.policy.truncate_cause(&err.to_string()));
                record.updated_at = now;
                self.store.update(record)?;
                return Err(err);
            }
        };

        let sent = match self.transport.send(&record.destination, message) {
            Ok(()) => {
                record.mark_sent(now);
                debug!(tx_id = %record.tx_id, destination = %record.destination, "consistency message sent");
                true
            }
            Err(err) => {
                warn!(
                    tx_id = %record.tx_id,
                    destination = %record.destination,
                    retry_count = record.retry_count,
                    error = %err,
                    "consistency message send failed"
                );
                record.mark_failed(self.policy.truncate_cause(&err.to_string()));
                false
            }
        };

        record.retry_interval = RetryPolicy::next_interval(record.retry_count, record.retry_interval);
        record.retry_time = now + TimeDelta::seconds(i64::from(record.retry_interval));
        record.retry_count += 1;
        record.updated_at = now;
        self.store.update(record)?;

        Ok(sent)
    }

    /// Lock, re-read and attempt the record with `id`.
    ///
    /// Returns `None` when the record is no longer retryable, typically
    /// because another worker got to it first.
    pub(crate) fn send_by_id(&self, id: u64) -> ConsistencyResult<Option<bool>> {
        self.send_where(id, None)
    }

    /// `send_by_id` for the compensation sweep: also skips records whose
    /// `retry_time` moved past `now` since they were selected.
    pub(crate) fn send_if_due(&self, id: u64, now: DateTime<Utc>) -> ConsistencyResult<Option<bool>> {
        self.send_where(id, Some(now))
    }

    fn send_where(&self, id: u64, due_at: Option<DateTime<Utc>>) -> ConsistencyResult<Option<bool>> {
        let _guard = self.locks.acquire(&InMemoryLockManager::record_key(id))?;
        let mut record = self.fetch(id)?;

        let eligible = match due_at {
            Some(now) => record.is_due(now),
            None => record.is_retryable(),
        };
        if !eligible {
            debug!(id, tx_id = %record.tx_id, "record no longer eligible, skipping");
            return Ok(None);
        }

        self.attempt_send(&mut record).map(Some)
    }

    /// Stop all attempts for a record whose transaction never committed.
    ///
    /// Returns `false` when the record had already left the retry set.
    pub(crate) fn retire(&self, id: u64, cause: &str) -> ConsistencyResult<bool> {
        let _guard = self.locks.acquire(&InMemoryLockManager::record_key(id))?;
        let mut record = self.fetch(id)?;
        if !record.is_retryable() {
            return Ok(false);
        }
        record.mark_exhausted(cause);
        record.updated_at = Utc::now();
        self.store.update(&record)?;
        Ok(true)
    }

    fn fetch(&self, id: u64) -> ConsistencyResult<ConsistencyRecord> {
        Ok(self
            .store
            .get_by_id(id)?
            .ok_or_else(|| StoreError::NotFound(format!("consistency record {}", id)))?)
    }

    /// `attempt_send` for a caller-held record, ignoring `retry_time` and
    /// `retry_status`.
    ///
    /// The caller's copy is replaced by the stored one under the lock, so a
    /// stale copy cannot undo a confirmation that arrived meanwhile.
    pub(crate) fn send_locked(&self, record: &mut ConsistencyRecord) -> ConsistencyResult<bool> {
        if record.id == 0 {
            return Err(ConsistencyError::InvalidArgument(
                "record has not been persisted".into(),
            ));
        }
        let _guard = self.locks.acquire(&InMemoryLockManager::record_key(record.id))?;
        *record = self.fetch(record.id)?;
        let sent = self.attempt_send(record)?;
        if sent {
            info!(tx_id = %record.tx_id, "manual resend succeeded");
        }
        Ok(sent)
    }
}
