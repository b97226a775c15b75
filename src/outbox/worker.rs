//! Background compensation sweeps.

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::handler::{CompensationResult, ConsistencyHandler};
use crate::bus::Transport;
use crate::codec::Codec;
use crate::error::ConsistencyResult;
use crate::store::ConsistencyStore;

/// Anything that can run one compensation sweep.
pub trait Compensator: Send + Sync + 'static {
    fn compensate(&self, max_count: usize) -> ConsistencyResult<Option<CompensationResult>>;
}

impl<S, T, C> Compensator for ConsistencyHandler<S, T, C>
where
    S: ConsistencyStore + 'static,
    T: Transport + 'static,
    C: Codec,
{
    fn compensate(&self, max_count: usize) -> ConsistencyResult<Option<CompensationResult>> {
        ConsistencyHandler::compensate(self, max_count)
    }
}

impl<K: Compensator + ?Sized> Compensator for Arc<K> {
    fn compensate(&self, max_count: usize) -> ConsistencyResult<Option<CompensationResult>> {
        (**self).compensate(max_count)
    }
}

/// Statistics from the compensation worker.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompensationStats {
    pub sweeps: usize,
    pub sent: usize,
    pub failed: usize,
    /// Sweeps skipped because the handler was not started.
    pub idle: usize,
    pub errors: usize,
}

/// A background thread that calls `compensate` on a fixed interval.
///
/// ```ignore
/// let handler = Arc::new(ConsistencyHandler::new(store, queue, config)?);
/// handler.start()?;
/// let worker = CompensationWorker::spawn(Arc::clone(&handler), 100, Duration::from_secs(30));
/// // ...
/// let stats = worker.stop();
/// ```
pub struct CompensationWorker {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<CompensationStats>>,
}

impl CompensationWorker {
    /// Sweep up to `batch_size` records every `interval`. The first sweep
    /// runs immediately.
    pub fn spawn<K: Compensator>(compensator: K, batch_size: usize, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = channel();

        let handle = thread::spawn(move || {
            let mut stats = CompensationStats::default();

            loop {
                stats.sweeps += 1;
                match compensator.compensate(batch_size) {
                    Ok(Some(result)) => {
                        stats.sent += result.sent;
                        stats.failed += result.failed;
                    }
                    Ok(None) => stats.idle += 1,
                    Err(err) => {
                        stats.errors += 1;
                        warn!(error = %err, "compensation sweep failed");
                    }
                }

                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }

            debug!(sweeps = stats.sweeps, sent = stats.sent, "compensation worker stopped");
            stats
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the worker to stop and wait for it to finish.
    pub fn stop(mut self) -> CompensationStats {
        let _ = self.stop_tx.send(());
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => CompensationStats::default(),
        }
    }

    /// Signal the worker to stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

impl Drop for CompensationWorker {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
