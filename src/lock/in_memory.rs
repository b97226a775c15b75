use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use super::{Lock, LockError, LockManager};

/// In-memory lock backed by `Mutex<bool>` + `Condvar`.
pub struct InMemoryLock {
    state: Mutex<bool>,
    wake: Condvar,
}

impl InMemoryLock {
    pub fn new() -> Self {
        InMemoryLock {
            state: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    fn is_locked(&self) -> bool {
        self.state.lock().map(|locked| *locked).unwrap_or(true)
    }
}

impl Default for InMemoryLock {
    fn default() -> Self {
        Self::new()
    }
}

impl Lock for InMemoryLock {
    fn lock(&self) -> Result<(), LockError> {
        let mut locked = self
            .state
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        while *locked {
            locked = self
                .wake
                .wait(locked)
                .map_err(|e| LockError::Poisoned(e.to_string()))?;
        }
        *locked = true;
        Ok(())
    }

    fn try_lock(&self) -> Result<bool, LockError> {
        let mut locked = self
            .state
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        if *locked {
            Ok(false)
        } else {
            *locked = true;
            Ok(true)
        }
    }

    fn unlock(&self) -> Result<(), LockError> {
        let mut locked = self
            .state
            .lock()
            .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        if *locked {
            *locked = false;
            self.wake.notify_one();
        }
        Ok(())
    }
}

/// Lazily creates one `InMemoryLock` per record key.
///
/// An entry only the map still references, and that is not held, is evicted
/// on the next `get_lock`. The map stays as large as the set of keys in use,
/// not the set of records ever touched.
pub struct InMemoryLockManager {
    locks: Mutex<HashMap<String, Arc<InMemoryLock>>>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        InMemoryLockManager {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Key used for a persisted record id.
    pub fn record_key(id: u64) -> String {
        format!("consistency:{}", id)
    }

    /// Number of locks currently tracked.
    pub fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager for InMemoryLockManager {
    type Lock = InMemoryLock;

    fn get_lock(&self, key: &str) -> Result<Arc<InMemoryLock>, LockError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| LockError::Poisoned("lock manager map poisoned".into()))?;
        // Nobody else can clone an entry while the map is locked, so a
        // count of one means no guard or waiter holds it.
        locks.retain(|k, lock| k == key || Arc::strong_count(lock) > 1 || lock.is_locked());
        Ok(locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(InMemoryLock::new()))
            .clone())
    }
}
