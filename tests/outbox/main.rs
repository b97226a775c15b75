//! Producer-side integration tests.
//!
//! - Persist-then-publish ordering across transaction scopes
//! - Tiered backoff, expiry and terminal states
//! - Execution confirmations applied to stored records

mod retry;
mod confirm;
