//! In-memory queue for testing and single-process scenarios.
//!
//! This module provides a thread-safe set of named queues that implements
//! both `Sender` and `Listener`, useful for:
//! - Unit and integration testing without a broker
//! - Single-process applications
//! - Fault injection (`fail_next`) for exercising the retry path

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{Listener, Message, PublishError, Sender};

#[derive(Default)]
struct QueueState {
    /// Messages waiting per queue
    ready: HashMap<String, VecDeque<Message>>,
    /// Delivered but not yet acked, keyed by (queue, message id)
    in_flight: HashMap<(String, String), Message>,
    /// Every message ever sent, per queue
    history: HashMap<String, Vec<Message>>,
    /// Acknowledged message ids
    acked: Vec<String>,
    /// Number of nack-triggered redeliveries
    redelivered: usize,
}

/// In-memory point-to-point queues.
///
/// Features:
/// - Thread-safe (cloning shares the same queues)
/// - Competing consumers: each message goes to one listener
/// - Ack/nack: nacked messages return to the head of their queue
/// - Send history per queue for assertions
///
/// ## Example
///
/// ```
/// use consis_rust::bus::{InMemoryQueue, Listener, Message, Sender};
///
/// let queue = InMemoryQueue::new();
/// queue.send("orders", Message::with_string_payload("m-1", "{}")).unwrap();
///
/// let message = queue.listen("orders", 100).unwrap().unwrap();
/// assert_eq!(message.id, "m-1");
/// queue.ack("orders", &message.id).unwrap();
/// ```
#[derive(Clone)]
pub struct InMemoryQueue {
    state: Arc<Mutex<QueueState>>,
    available: Arc<Condvar>,
    fail_next: Arc<AtomicUsize>,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueue {
    /// Create a new set of empty queues.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            available: Arc::new(Condvar::new()),
            fail_next: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make the next `count` sends fail with `ConnectionFailed`.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// All messages ever sent to `queue`, in order.
    pub fn sent(&self, queue: &str) -> Vec<Message> {
        self.state()
            .map(|s| s.history.get(queue).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Number of messages ever sent to `queue`.
    pub fn sent_count(&self, queue: &str) -> usize {
        self.state()
            .map(|s| s.history.get(queue).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Messages waiting to be delivered on `queue`.
    pub fn pending(&self, queue: &str) -> usize {
        self.state()
            .map(|s| s.ready.get(queue).map(VecDeque::len).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Messages delivered but not yet acked or nacked.
    pub fn in_flight(&self) -> usize {
        self.state().map(|s| s.in_flight.len()).unwrap_or(0)
    }

    /// Get acknowledged message ids.
    pub fn acknowledged(&self) -> Vec<String> {
        self.state().map(|s| s.acked.clone()).unwrap_or_default()
    }

    /// Number of nack-triggered redeliveries.
    pub fn redelivered(&self) -> usize {
        self.state().map(|s| s.redelivered).unwrap_or(0)
    }

    /// Drop every message (useful for test cleanup).
    pub fn clear(&self) {
        if let Ok(mut state) = self.state() {
            *state = QueueState::default();
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, QueueState>, PublishError> {
        self.state
            .lock()
            .map_err(|_| PublishError::ConnectionFailed("in-memory queue poisoned".into()))
    }

    fn take_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Sender for InMemoryQueue {
    fn send(&self, queue: &str, message: Message) -> Result<(), PublishError> {
        if self.take_failure() {
            return Err(PublishError::ConnectionFailed(format!(
                "broker unavailable for queue {}",
                queue
            )));
        }

        let mut state = self.state()?;
        state
            .history
            .entry(queue.to_string())
            .or_default()
            .push(message.clone());
        state
            .ready
            .entry(queue.to_string())
            .or_default()
            .push_back(message);
        drop(state);

        self.available.notify_all();
        Ok(())
    }
}

impl Listener for InMemoryQueue {
    fn listen(&self, queue: &str, timeout_ms: u64) -> Result<Option<Message>, PublishError> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut state = self.state()?;

        loop {
            if let Some(message) = state.ready.get_mut(queue).and_then(VecDeque::pop_front) {
                state
                    .in_flight
                    .insert((queue.to_string(), message.id.clone()), message.clone());
                return Ok(Some(message));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let (guard, _) = self
                .available
                .wait_timeout(state, deadline - now)
                .map_err(|_| PublishError::ConnectionFailed("in-memory queue poisoned".into()))?;
            state = guard;
        }
    }

    fn ack(&self, queue: &str, message_id: &str) -> Result<(), PublishError> {
        let mut state = self.state()?;
        state
            .in_flight
            .remove(&(queue.to_string(), message_id.to_string()));
        state.acked.push(message_id.to_string());
        Ok(())
    }

    fn nack(&self, queue: &str, message_id: &str, _reason: &str) -> Result<(), PublishError> {
        let mut state = self.state()?;
        let message = state
            .in_flight
            .remove(&(queue.to_string(), message_id.to_string()))
            .ok_or_else(|| {
                PublishError::Rejected(format!("message {} is not in flight", message_id))
            })?;
        state
            .ready
            .entry(queue.to_string())
            .or_default()
            .push_front(message);
        state.redelivered += 1;
        drop(state);

        self.available.notify_all();
        Ok(())
    }
}
