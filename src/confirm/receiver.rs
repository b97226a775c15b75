use std::sync::Arc;

use tracing::{debug, info, warn};

use super::ConfirmMessage;
use crate::bus::Message;
use crate::error::ConsistencyResult;
use crate::lock::{InMemoryLockManager, LockManager};
use crate::store::ConsistencyStore;

/// Applies execution replies to stored records.
///
/// Runs under the same per-record lock as the retry path, so a reply and a
/// concurrent resend never interleave their read-modify-write.
pub struct ConfirmationReceiver<S> {
    store: Arc<S>,
    locks: Arc<InMemoryLockManager>,
}

impl<S> Clone for ConfirmationReceiver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S: ConsistencyStore> ConfirmationReceiver<S> {
    pub fn new(store: Arc<S>, locks: Arc<InMemoryLockManager>) -> Self {
        Self { store, locks }
    }

    /// Returns `true` when the reply moved a record to EXECUTED.
    ///
    /// Failure replies and unknown transaction ids change nothing.
    pub fn apply(&self, reply: &ConfirmMessage) -> ConsistencyResult<bool> {
        if !reply.success {
            info!(tx_id = %reply.tx_id, host = %reply.execute_host, "consumer reported failed execution");
            return Ok(false);
        }

        let id = match self.store.get_by_tx_id(&reply.tx_id)? {
            Some(record) => record.id,
            None => {
                warn!(tx_id = %reply.tx_id, "confirmation for unknown transaction");
                return Ok(false);
            }
        };

        let _guard = self.locks.acquire(&InMemoryLockManager::record_key(id))?;
        let Some(mut record) = self.store.get_by_id(id)? else {
            warn!(tx_id = %reply.tx_id, id, "record vanished before confirmation");
            return Ok(false);
        };

        if record.is_executed() {
            debug!(tx_id = %reply.tx_id, "duplicate confirmation ignored");
            return Ok(false);
        }

        record.mark_executed(reply.execute_time, reply.execute_host.clone());
        self.store.update(&record)?;
        info!(tx_id = %reply.tx_id, host = %reply.execute_host, "record confirmed executed");
        Ok(true)
    }

    /// Subscription entry point.
    ///
    /// A reply that does not parse is logged and consumed; redelivering it
    /// would never succeed. Store failures propagate so the reply is retried.
    pub fn on_message(&self, message: &Message) -> ConsistencyResult<()> {
        match ConfirmMessage::from_json(&message.payload) {
            Ok(reply) => self.apply(&reply).map(|_| ()),
            Err(err) => {
                warn!(message_id = %message.id, error = %err, "discarding malformed confirmation");
                Ok(())
            }
        }
    }
}
