//! Transaction-boundary integration.
//!
//! The caller passes its transaction explicitly as an `AfterCommit`
//! capability. Publishing is registered there, so it can never precede the
//! commit that makes the record visible. Stores that do not take part in the
//! caller's transaction get a rollback hook to retire what they persisted.

use std::sync::{Mutex, PoisonError};

use tracing::debug;

/// Deferred action run once the enclosing transaction has committed.
pub type CommitAction = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run an action after its transaction commits.
pub trait AfterCommit {
    fn run_after_commit(&self, action: CommitAction);

    /// Run `action` if the transaction rolls back instead. Transactions that
    /// cannot roll back drop it.
    fn run_after_rollback(&self, action: CommitAction) {
        drop(action);
    }
}

/// No transaction is active: actions run immediately, in-line.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTransaction;

impl AfterCommit for NoTransaction {
    fn run_after_commit(&self, action: CommitAction) {
        action();
    }
}

/// Buffers post-commit actions for a unit of work.
///
/// Hosts bridge their database transaction to this type: call `commit()`
/// after the database commit succeeded and `rollback()` (or just drop the
/// scope) when it did not. Rollback actions run on `rollback()` and on drop.
///
/// ```
/// use consis_rust::{AfterCommit, TransactionScope};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let ran = Arc::new(AtomicBool::new(false));
/// let scope = TransactionScope::new();
/// let flag = Arc::clone(&ran);
/// scope.run_after_commit(Box::new(move || flag.store(true, Ordering::SeqCst)));
/// assert!(!ran.load(Ordering::SeqCst));
///
/// scope.commit();
/// assert!(ran.load(Ordering::SeqCst));
/// ```
#[derive(Default)]
pub struct TransactionScope {
    actions: Mutex<Vec<CommitAction>>,
    rollback_actions: Mutex<Vec<CommitAction>>,
}

fn drain(actions: &Mutex<Vec<CommitAction>>) -> Vec<CommitAction> {
    std::mem::take(&mut *actions.lock().unwrap_or_else(PoisonError::into_inner))
}

impl TransactionScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of actions waiting for the commit.
    pub fn pending(&self) -> usize {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run every registered action in registration order.
    pub fn commit(self) -> usize {
        drain(&self.rollback_actions);
        let actions = drain(&self.actions);
        let count = actions.len();
        for action in actions {
            action();
        }
        count
    }

    /// Discard every post-commit action and run the rollback actions.
    /// Returns the number of post-commit actions discarded.
    pub fn rollback(self) -> usize {
        self.roll_back()
    }

    fn roll_back(&self) -> usize {
        let count = drain(&self.actions).len();
        let undo = drain(&self.rollback_actions);
        if count > 0 || !undo.is_empty() {
            debug!(discarded = count, undone = undo.len(), "transaction rolled back");
        }
        for action in undo {
            action();
        }
        count
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        self.roll_back();
    }
}

impl AfterCommit for TransactionScope {
    fn run_after_commit(&self, action: CommitAction) {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
    }

    fn run_after_rollback(&self, action: CommitAction) {
        self.rollback_actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
    }
}
