use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GateState {
    Pending,
    Ready,
    Closed,
}

/// Outcome of a bounded wait on the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateWait {
    Ready,
    Closed,
    /// The timeout elapsed first.
    Pending,
}

/// Single-fire broadcast: "the application has finished starting".
///
/// `ready()` releases every current and future waiter. `close()` releases
/// them too, but tells them the signal will never come. Whichever happens
/// first wins; the gate never goes back to pending.
#[derive(Clone)]
pub struct ReadinessGate {
    inner: Arc<(Mutex<GateState>, Condvar)>,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(GateState::Pending), Condvar::new())),
        }
    }

    fn state(&self) -> MutexGuard<'_, GateState> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fire the gate. Returns `true` only for the call that fired it.
    pub fn ready(&self) -> bool {
        self.transition(GateState::Ready)
    }

    /// Release waiters without firing.
    pub fn close(&self) -> bool {
        self.transition(GateState::Closed)
    }

    fn transition(&self, to: GateState) -> bool {
        let mut state = self.state();
        if *state != GateState::Pending {
            return false;
        }
        *state = to;
        drop(state);
        self.inner.1.notify_all();
        true
    }

    pub fn is_ready(&self) -> bool {
        *self.state() == GateState::Ready
    }

    pub fn is_closed(&self) -> bool {
        *self.state() == GateState::Closed
    }

    /// Block until the gate fires (`true`) or is closed (`false`).
    pub fn wait(&self) -> bool {
        let state = self.state();
        let state = self
            .inner
            .1
            .wait_while(state, |s| *s == GateState::Pending)
            .unwrap_or_else(PoisonError::into_inner);
        *state == GateState::Ready
    }

    pub fn wait_timeout(&self, timeout: Duration) -> GateWait {
        let deadline = Instant::now() + timeout;
        let mut state = self.state();
        loop {
            match *state {
                GateState::Ready => return GateWait::Ready,
                GateState::Closed => return GateWait::Closed,
                GateState::Pending => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return GateWait::Pending;
            }
            state = self
                .inner
                .1
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}
