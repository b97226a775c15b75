//! Transport message and error types.

use std::collections::HashMap;
use std::error::Error;

use thiserror::Error;

/// A message travelling over the bus.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Unique identifier, stable across redeliveries.
    pub id: String,
    /// Serialized payload (JSON text for consistency messages).
    pub payload: Vec<u8>,
    /// Protocol headers (`txId`, `confirmLevel`, ...).
    pub headers: HashMap<String, String>,
    /// Queue the consumer should reply on, if any.
    pub reply_to: Option<String>,
}

impl Message {
    pub fn new(id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            payload,
            headers: HashMap::new(),
            reply_to: None,
        }
    }

    pub fn with_string_payload(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new(id, payload.into().into_bytes())
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_reply_to(mut self, queue: impl Into<String>) -> Self {
        self.reply_to = Some(queue.into());
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|s| s.as_str())
    }

    /// Get the payload as a string (if valid UTF-8).
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Connection to the broker failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// The broker rejected the message
    #[error("message rejected: {0}")]
    Rejected(String),
    /// Timeout waiting for the broker
    #[error("publish timeout")]
    Timeout,
    /// Other broker error
    #[error("transport error: {0}")]
    Other(Box<dyn Error + Send + Sync>),
}
