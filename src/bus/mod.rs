//! Message bus - transport abstractions for consistency messages.
//!
//! The consistency core only needs point-to-point queues:
//!
//! ```text
//! ┌──────────────────────┐   send(destination, msg)   ┌──────────────────────┐
//! │  ConsistencyHandler  │ ─────────────────────────▶ │                      │
//! │  (producer)          │                            │   Transport          │
//! │                      │ ◀───── listen(confirm) ─── │   Sender + Listener  │
//! └──────────────────────┘                            │                      │
//! ┌──────────────────────┐ ◀──── listen(destination)─ │  InMemoryQueue       │
//! │  InvokerRegistrar    │                            │  (included)          │
//! │  (consumer)          │ ───── send(reply_to) ────▶ │                      │
//! └──────────────────────┘                            └──────────────────────┘
//! ```
//!
//! A broker adapter (JMS, AMQP, SQS, ...) implements `Sender` and `Listener`;
//! the blanket `Transport` impl does the rest.

mod in_memory_queue;
mod listener;
mod message;
mod sender;
mod transport;

pub use in_memory_queue::InMemoryQueue;
pub use listener::Listener;
pub use message::{Message, PublishError};
pub use sender::Sender;
pub use transport::Transport;
