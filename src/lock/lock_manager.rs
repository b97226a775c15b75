use std::sync::Arc;

use tracing::warn;

use super::{Lock, LockError};

/// Factory for per-key locks.
pub trait LockManager: Send + Sync {
    /// The concrete lock type returned by this manager.
    type Lock: Lock;

    /// Get (or create) the lock for `key`.
    ///
    /// Repeated calls with the same key must return the same logical lock.
    fn get_lock(&self, key: &str) -> Result<Arc<Self::Lock>, LockError>;

    /// Acquire the lock for `key` and hold it until the guard drops.
    fn acquire(&self, key: &str) -> Result<LockGuard<Self::Lock>, LockError> {
        let lock = self.get_lock(key)?;
        lock.lock()?;
        Ok(LockGuard {
            key: key.to_string(),
            lock,
        })
    }
}

/// Releases a held lock on drop.
pub struct LockGuard<L: Lock> {
    key: String,
    lock: Arc<L>,
}

impl<L: Lock> LockGuard<L> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<L: Lock> Drop for LockGuard<L> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.unlock() {
            warn!(key = %self.key, error = %err, "failed to release record lock");
        }
    }
}
