//! Producer-side outbox.
//!
//! ```text
//!   caller tx ──► ConsistencyHandler::handle
//!                     │ encode + validate
//!                     │ store.add(record)            (inside the tx)
//!                     │ tx.run_after_commit(send)
//!                     ▼
//!               [commit] ──► RetryEngine::send_by_id ──► Sender::send
//!                                  │ lock + re-fetch
//!                                  │ backoff / expiry (RetryPolicy)
//!                                  ▼
//!                             store.update(record)
//!
//!   CompensationWorker ──► compensate(n) ──► query_retry_eligible ──► send_by_id ...
//! ```
//!
//! Records are never deleted. A record stops being retried when it was
//! sent at level `Sent`, confirmed at level `Executed`, or ran out of
//! attempts or age.

mod engine;
mod handler;
mod policy;
mod worker;

pub use handler::{CompensationResult, ConsistencyHandler, ROLLED_BACK_CAUSE};
pub use policy::{RetryPolicy, EXHAUSTED_CAUSE};
pub use worker::{CompensationStats, CompensationWorker, Compensator};
