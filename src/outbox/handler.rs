use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::engine::RetryEngine;
use super::policy::RetryPolicy;
use crate::bus::{Message, Transport};
use crate::codec::{Codec, JsonCodec};
use crate::config::ConsistencyConfig;
use crate::confirm::{ConfirmMessage, ConfirmationReceiver};
use crate::error::{ConsistencyError, ConsistencyResult};
use crate::key::BusinessKey;
use crate::lock::InMemoryLockManager;
use crate::record::{ConfirmLevel, ConfirmStatus, ConsistencyRecord, RetryStatus};
use crate::store::ConsistencyStore;
use crate::subscription::{MessageHandler, QueueSubscription};
use crate::transaction::AfterCommit;

/// Failure cause stored on a record whose transaction rolled back.
pub const ROLLED_BACK_CAUSE: &str = "transaction rolled back";

/// Outcome of one compensation sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompensationResult {
    /// Records returned by the eligibility query.
    pub selected: usize,
    /// Records the transport accepted.
    pub sent: usize,
    /// Records that failed, were abandoned or hit an error.
    pub failed: usize,
    /// Records another worker finished before this sweep reached them.
    pub skipped: usize,
}

/// Producer-side entry point.
///
/// `handle` persists a record inside the caller's transaction and sends it
/// once that transaction commits. Anything that does not go out then is
/// picked up by `compensate`.
///
/// ```
/// use consis_rust::bus::InMemoryQueue;
/// use consis_rust::store::{ConsistencyStore, InMemoryConsistencyStore};
/// use consis_rust::{ConfirmLevel, ConsistencyConfig, ConsistencyHandler, NoTransaction};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let store = InMemoryConsistencyStore::new();
/// let queue = InMemoryQueue::new();
/// let handler = ConsistencyHandler::new(
///     Arc::new(store.clone()),
///     Arc::new(queue.clone()),
///     ConsistencyConfig::new().without_confirm_destination(),
/// )
/// .unwrap();
///
/// let record = handler
///     .handle("orders.created", &json!({"id": 42}), ConfirmLevel::Sent, &NoTransaction)
///     .unwrap();
///
/// assert_eq!(queue.sent_count("orders.created"), 1);
/// assert_eq!(store.get_by_id(record.id).unwrap().unwrap().biz_id, "42");
/// ```
pub struct ConsistencyHandler<S, T, C = JsonCodec> {
    store: Arc<S>,
    transport: Arc<T>,
    codec: C,
    config: ConsistencyConfig,
    engine: RetryEngine<S, T>,
    receiver: ConfirmationReceiver<S>,
    confirm_subscription: Mutex<Option<QueueSubscription>>,
    started: AtomicBool,
}

impl<S, T> ConsistencyHandler<S, T, JsonCodec>
where
    S: ConsistencyStore + 'static,
    T: Transport + 'static,
{
    pub fn new(store: Arc<S>, transport: Arc<T>, config: ConsistencyConfig) -> ConsistencyResult<Self> {
        Self::with_codec(store, transport, config, JsonCodec)
    }
}

impl<S, T, C> ConsistencyHandler<S, T, C>
where
    S: ConsistencyStore + 'static,
    T: Transport + 'static,
    C: Codec,
{
    pub fn with_codec(
        store: Arc<S>,
        transport: Arc<T>,
        config: ConsistencyConfig,
        codec: C,
    ) -> ConsistencyResult<Self> {
        config.validate()?;
        let locks = Arc::new(InMemoryLockManager::new());
        let engine = RetryEngine::new(
            Arc::clone(&store),
            Arc::clone(&transport),
            config.retry_policy(),
            Arc::clone(&locks),
        );
        let receiver = ConfirmationReceiver::new(Arc::clone(&store), locks);
        Ok(Self {
            store,
            transport,
            codec,
            config,
            engine,
            receiver,
            confirm_subscription: Mutex::new(None),
            started: AtomicBool::new(false),
        })
    }

    /// Open the reply listener (when a confirm destination is configured)
    /// and enable compensation. Calling it again does nothing.
    pub fn start(&self) -> ConsistencyResult<()> {
        let mut slot = self
            .confirm_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.started.load(Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(destination) = &self.config.confirm_destination {
            let receiver = self.receiver.clone();
            let handler: MessageHandler = Arc::new(move |message: &Message| receiver.on_message(message));
            let subscription = QueueSubscription::new(
                destination.clone(),
                Arc::clone(&self.transport),
                handler,
                self.config.poll_interval(),
            );
            subscription.start()?;
            *slot = Some(subscription);
        }

        self.started.store(true, Ordering::SeqCst);
        info!(
            confirm_destination = self.config.confirm_destination.as_deref().unwrap_or("-"),
            "consistency handler started"
        );
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Close the reply listener. `compensate` returns `None` afterwards
    /// until `start` is called again.
    pub fn destroy(&self) {
        let subscription = self
            .confirm_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.started.store(false, Ordering::SeqCst);
        if let Some(subscription) = subscription {
            subscription.close();
        }
        debug!("consistency handler destroyed");
    }

    /// Persist a message for `destination` and send it after `tx` commits.
    ///
    /// Returns the record as persisted, before any send attempt. Send
    /// failures after the commit are never reported here; they are kept
    /// on the record for the compensation sweep.
    pub fn handle<P>(
        &self,
        destination: &str,
        payload: &P,
        level: ConfirmLevel,
        tx: &dyn AfterCommit,
    ) -> ConsistencyResult<ConsistencyRecord>
    where
        P: Serialize + BusinessKey,
    {
        let content = self.codec.encode(payload)?;
        let record = ConsistencyRecord::new(destination, content)
            .with_biz_id(payload.business_key())
            .with_confirm_level(level)
            .with_retry_interval(self.config.default_retry_interval_secs);
        self.handle_record(record, tx)
    }

    /// `handle` with `ConfirmLevel::Sent`.
    pub fn handle_sent<P>(
        &self,
        destination: &str,
        payload: &P,
        tx: &dyn AfterCommit,
    ) -> ConsistencyResult<ConsistencyRecord>
    where
        P: Serialize + BusinessKey,
    {
        self.handle(destination, payload, ConfirmLevel::Sent, tx)
    }

    /// Persist a caller-built record and send it after `tx` commits.
    ///
    /// Destination, content, business key, level and retry interval come
    /// from `record`; every lifecycle field is reset.
    pub fn handle_record(
        &self,
        mut record: ConsistencyRecord,
        tx: &dyn AfterCommit,
    ) -> ConsistencyResult<ConsistencyRecord> {
        if record.destination.trim().is_empty() {
            return Err(ConsistencyError::InvalidArgument(
                "destination must not be empty".into(),
            ));
        }
        if self.codec.is_empty(&record.content) {
            return Err(ConsistencyError::InvalidArgument(
                "consistency message content must not be empty".into(),
            ));
        }

        record.confirm_level = record.confirm_level.resolve();
        record.confirm_destination = self.config.confirm_destination.clone();
        if record.confirm_level == ConfirmLevel::Executed && record.confirm_destination.is_none() {
            return Err(ConsistencyError::no_confirm_destination());
        }

        let now = Utc::now();
        if record.tx_id.is_empty() {
            record.tx_id = Uuid::new_v4().to_string();
        }
        if record.retry_interval == 0 {
            record.retry_interval = self.config.default_retry_interval_secs;
        }
        record.id = 0;
        record.confirm_status = ConfirmStatus::Initial;
        record.retry_status = RetryStatus::Yes;
        record.retry_count = 0;
        record.fail_cause = None;
        record.confirm_sent_time = None;
        record.confirm_execute_time = None;
        record.execute_host = None;
        record.first_sent_time = now;
        record.retry_time = now + TimeDelta::seconds(i64::from(record.retry_interval));
        record.created_at = now;
        record.updated_at = now;

        record.id = self.store.add(&record)?;
        debug!(
            id = record.id,
            tx_id = %record.tx_id,
            destination = %record.destination,
            level = ?record.confirm_level,
            "consistency record persisted"
        );

        let engine = self.engine.clone();
        let id = record.id;
        let tx_id = record.tx_id.clone();
        tx.run_after_commit(Box::new(move || {
            if let Err(err) = engine.send_by_id(id) {
                warn!(id, tx_id = %tx_id, error = %err, "post-commit send failed, left for compensation");
            }
        }));

        let engine = self.engine.clone();
        let tx_id = record.tx_id.clone();
        tx.run_after_rollback(Box::new(move || match engine.retire(id, ROLLED_BACK_CAUSE) {
            Ok(true) => debug!(id, tx_id = %tx_id, "consistency record retired after rollback"),
            Ok(false) => {}
            Err(err) => warn!(id, tx_id = %tx_id, error = %err, "cannot retire rolled back record"),
        }));

        Ok(record)
    }

    /// Retry up to `max_count` due records.
    ///
    /// Returns `None` when the handler has not been started.
    pub fn compensate(&self, max_count: usize) -> ConsistencyResult<Option<CompensationResult>> {
        if !self.is_started() {
            return Ok(None);
        }

        let now = Utc::now();
        let candidates = self.store.query_retry_eligible(max_count, now)?;
        let mut result = CompensationResult {
            selected: candidates.len(),
            ..CompensationResult::default()
        };

        for candidate in candidates {
            match self.engine.send_if_due(candidate.id, now) {
                Ok(Some(true)) => result.sent += 1,
                Ok(Some(false)) => result.failed += 1,
                Ok(None) => result.skipped += 1,
                Err(err) => {
                    warn!(id = candidate.id, tx_id = %candidate.tx_id, error = %err, "compensation attempt failed");
                    result.failed += 1;
                }
            }
        }

        if result.selected > 0 {
            info!(
                selected = result.selected,
                sent = result.sent,
                failed = result.failed,
                skipped = result.skipped,
                "compensation sweep finished"
            );
        }
        Ok(Some(result))
    }

    /// Send a persisted record now, regardless of its `retry_time`.
    ///
    /// `record` is updated in place with the outcome.
    pub fn attempt_send(&self, record: &mut ConsistencyRecord) -> ConsistencyResult<bool> {
        self.engine.send_locked(record)
    }

    /// Apply an execution reply received outside the reply listener.
    pub fn apply_confirmation(&self, reply: &ConfirmMessage) -> ConsistencyResult<bool> {
        self.receiver.apply(reply)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn config(&self) -> &ConsistencyConfig {
        &self.config
    }

    pub fn policy(&self) -> &RetryPolicy {
        self.engine.policy()
    }
}
