//! Queue subscriptions and the readiness gate.
//!
//! ```text
//!   register ──► QueueSubscription::start_gated(gate)
//!                     │
//!                     ▼
//!               [WaitingReady] ── gate.ready() ──► [Running] ── close() ──► [Stopped]
//!                     │                                │
//!                     └──────────── close() ───────────┘
//!
//!   Running loop:  listen(poll) ─► handler(&msg) ─► Ok: ack / Err: nack
//! ```
//!
//! Each subscription owns one worker thread. Stop is cooperative: the
//! worker checks its stop channel between messages, so an in-flight
//! message always finishes before the thread exits.

mod queue_subscription;
mod ready;

pub use queue_subscription::{MessageHandler, QueueSubscription, SubscriptionState, SubscriptionStats};
pub use ready::{GateWait, ReadinessGate};
