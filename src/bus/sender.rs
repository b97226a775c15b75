//! Sender trait for point-to-point messaging.

use std::sync::Arc;

use super::message::{Message, PublishError};

/// Sends messages to a named queue.
///
/// Each message is consumed by exactly one listener on that queue
/// (competing consumers).
pub trait Sender: Send + Sync {
    /// Send a message to a named queue.
    fn send(&self, queue: &str, message: Message) -> Result<(), PublishError>;
}

impl<S: Sender + ?Sized> Sender for Arc<S> {
    fn send(&self, queue: &str, message: Message) -> Result<(), PublishError> {
        (**self).send(queue, message)
    }
}
