use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{GateWait, ReadinessGate};
use crate::bus::{Listener, Message};
use crate::error::{ConsistencyError, ConsistencyResult};

/// Callback run for every delivered message. `Ok` acks, `Err` nacks.
pub type MessageHandler = Arc<dyn Fn(&Message) -> ConsistencyResult<()> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SubscriptionState {
    Created = 0,
    WaitingReady = 1,
    Running = 2,
    Stopped = 3,
}

impl SubscriptionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SubscriptionState::Created,
            1 => SubscriptionState::WaitingReady,
            2 => SubscriptionState::Running,
            _ => SubscriptionState::Stopped,
        }
    }
}

/// Counters from a subscription worker.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubscriptionStats {
    pub handled: usize,
    pub failed: usize,
    pub polls: usize,
    /// Receive/ack/nack errors reported by the transport.
    pub errors: usize,
}

struct Shared {
    state: AtomicU8,
    stats: Mutex<SubscriptionStats>,
}

impl Shared {
    fn state(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: SubscriptionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Move to `Running` unless the subscription was closed meanwhile.
    fn enter_running(&self) -> bool {
        let mut current = self.state.load(Ordering::SeqCst);
        loop {
            if current == SubscriptionState::Stopped as u8 {
                return false;
            }
            match self.state.compare_exchange(
                current,
                SubscriptionState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn record(&self, update: impl FnOnce(&mut SubscriptionStats)) {
        update(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// A listener bound to one destination, driven by its own thread.
pub struct QueueSubscription {
    destination: String,
    listener: Arc<dyn Listener>,
    handler: MessageHandler,
    poll_interval: Duration,
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl QueueSubscription {
    pub fn new<L: Listener + 'static>(
        destination: impl Into<String>,
        listener: Arc<L>,
        handler: MessageHandler,
        poll_interval: Duration,
    ) -> Self {
        Self {
            destination: destination.into(),
            listener,
            handler,
            poll_interval,
            shared: Arc::new(Shared {
                state: AtomicU8::new(SubscriptionState::Created as u8),
                stats: Mutex::new(SubscriptionStats::default()),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Start receiving immediately.
    pub fn start(&self) -> ConsistencyResult<()> {
        self.spawn(None)
    }

    /// Start a worker that receives nothing until `gate` fires.
    pub fn start_gated(&self, gate: ReadinessGate) -> ConsistencyResult<()> {
        self.spawn(Some(gate))
    }

    fn spawn(&self, gate: Option<ReadinessGate>) -> ConsistencyResult<()> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() || self.shared.state() != SubscriptionState::Created {
            return Err(ConsistencyError::IllegalState(format!(
                "subscription on {} already started or closed",
                self.destination
            )));
        }
        // Leave Created before the worker exists; an ungated worker passes
        // straight through WaitingReady.
        self.shared.set_state(SubscriptionState::WaitingReady);

        let (stop_tx, stop_rx) = channel();
        let ctx = WorkerContext {
            destination: self.destination.clone(),
            listener: Arc::clone(&self.listener),
            handler: Arc::clone(&self.handler),
            poll_interval: self.poll_interval,
            shared: Arc::clone(&self.shared),
        };

        let handle = thread::Builder::new()
            .name(format!("consis-sub:{}", self.destination))
            .spawn(move || ctx.run(stop_rx, gate))
            .map_err(|e| {
                self.shared.set_state(SubscriptionState::Created);
                ConsistencyError::IllegalState(format!("cannot spawn subscription worker: {}", e))
            })?;

        *worker = Some(Worker { stop_tx, handle });
        debug!(destination = %self.destination, "subscription started");
        Ok(())
    }

    /// `true` once the worker has passed its gate and is receiving.
    pub fn is_started(&self) -> bool {
        self.shared.state() == SubscriptionState::Running
    }

    pub fn state(&self) -> SubscriptionState {
        self.shared.state()
    }

    pub fn stats(&self) -> SubscriptionStats {
        self.shared
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop receiving and wait for the worker to exit.
    ///
    /// A message already being handled is finished and acked or nacked
    /// first. Safe to call repeatedly and from any state.
    pub fn close(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.shared.set_state(SubscriptionState::Stopped);

        if let Some(worker) = worker {
            let _ = worker.stop_tx.send(());
            if worker.handle.thread().id() == thread::current().id() {
                return;
            }
            if worker.handle.join().is_err() {
                warn!(destination = %self.destination, "subscription worker panicked");
            }
            info!(destination = %self.destination, "subscription closed");
        }
    }

    /// Signal the worker to stop without waiting for it.
    pub fn signal_stop(&self) {
        if let Some(worker) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            let _ = worker.stop_tx.send(());
        }
    }
}

impl Drop for QueueSubscription {
    fn drop(&mut self) {
        self.signal_stop();
        self.shared.set_state(SubscriptionState::Stopped);
    }
}

struct WorkerContext {
    destination: String,
    listener: Arc<dyn Listener>,
    handler: MessageHandler,
    poll_interval: Duration,
    shared: Arc<Shared>,
}

fn stop_requested(stop_rx: &Receiver<()>) -> bool {
    match stop_rx.try_recv() {
        Ok(()) | Err(TryRecvError::Disconnected) => true,
        Err(TryRecvError::Empty) => false,
    }
}

impl WorkerContext {
    fn run(self, stop_rx: Receiver<()>, gate: Option<ReadinessGate>) {
        if let Some(gate) = gate {
            loop {
                if stop_requested(&stop_rx) {
                    return;
                }
                match gate.wait_timeout(self.poll_interval) {
                    GateWait::Ready => break,
                    GateWait::Closed => {
                        debug!(destination = %self.destination, "gate closed before ready");
                        return;
                    }
                    GateWait::Pending => {}
                }
            }
        }

        if !self.shared.enter_running() {
            return;
        }
        debug!(destination = %self.destination, "subscription receiving");

        let timeout_ms = self.poll_interval.as_millis() as u64;
        loop {
            if stop_requested(&stop_rx) {
                break;
            }
            self.shared.record(|s| s.polls += 1);

            match self.listener.listen(&self.destination, timeout_ms) {
                Ok(None) => {}
                Ok(Some(message)) => {
                    if stop_requested(&stop_rx) {
                        self.nack(&message, "subscription closing");
                        break;
                    }
                    self.dispatch(&message);
                }
                Err(err) => {
                    self.shared.record(|s| s.errors += 1);
                    warn!(destination = %self.destination, error = %err, "receive failed");
                    thread::sleep(self.poll_interval);
                }
            }
        }
    }

    fn dispatch(&self, message: &Message) {
        match (self.handler)(message) {
            Ok(()) => {
                self.shared.record(|s| s.handled += 1);
                if let Err(err) = self.listener.ack(&self.destination, &message.id) {
                    self.shared.record(|s| s.errors += 1);
                    warn!(destination = %self.destination, message_id = %message.id, error = %err, "ack failed");
                }
            }
            Err(err) => {
                self.shared.record(|s| s.failed += 1);
                warn!(destination = %self.destination, message_id = %message.id, error = %err, "handler failed, requesting redelivery");
                self.nack(message, &err.to_string());
            }
        }
    }

    fn nack(&self, message: &Message, reason: &str) {
        if let Err(err) = self.listener.nack(&self.destination, &message.id, reason) {
            self.shared.record(|s| s.errors += 1);
            warn!(destination = %self.destination, message_id = %message.id, error = %err, "nack failed");
        }
    }
}
