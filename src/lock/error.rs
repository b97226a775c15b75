use thiserror::Error;

/// Error type for lock operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The underlying primitive was poisoned (a thread panicked while holding it).
    #[error("lock poisoned: {0}")]
    Poisoned(String),
    /// Failed to acquire the lock.
    #[error("lock acquire failed: {0}")]
    AcquireFailed(String),
    /// Failed to release the lock.
    #[error("lock release failed: {0}")]
    ReleaseFailed(String),
}
