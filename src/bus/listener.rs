//! Listener trait for point-to-point messaging.

use std::sync::Arc;

use super::message::{Message, PublishError};

/// Receives messages from a named queue.
///
/// Delivery is acknowledgement-based: a received message stays in flight
/// until it is acked, or goes back to the queue when nacked.
pub trait Listener: Send + Sync {
    /// Wait for the next message on `queue`, returning `None` when the
    /// timeout expires first.
    fn listen(&self, queue: &str, timeout_ms: u64) -> Result<Option<Message>, PublishError>;

    /// Confirm that a message was processed.
    fn ack(&self, queue: &str, message_id: &str) -> Result<(), PublishError>;

    /// Reject a message so the transport redelivers it.
    fn nack(&self, queue: &str, message_id: &str, reason: &str) -> Result<(), PublishError>;
}

impl<L: Listener + ?Sized> Listener for Arc<L> {
    fn listen(&self, queue: &str, timeout_ms: u64) -> Result<Option<Message>, PublishError> {
        (**self).listen(queue, timeout_ms)
    }

    fn ack(&self, queue: &str, message_id: &str) -> Result<(), PublishError> {
        (**self).ack(queue, message_id)
    }

    fn nack(&self, queue: &str, message_id: &str, reason: &str) -> Result<(), PublishError> {
        (**self).nack(queue, message_id, reason)
    }
}
