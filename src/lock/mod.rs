//! Per-record locks.
//!
//! Every update to a persisted `ConsistencyRecord` after its creation goes
//! through the lock for that record's id, so a publish attempt and a
//! confirmation reply for the same record never interleave inside one
//! process. Cross-process exclusion is the store's job (row-level locks).

mod error;
mod in_memory;
mod lock;
mod lock_manager;

pub use error::LockError;
pub use in_memory::{InMemoryLock, InMemoryLockManager};
pub use lock::Lock;
pub use lock_manager::{LockGuard, LockManager};
