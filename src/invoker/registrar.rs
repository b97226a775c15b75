use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::{local_host_info, ConsistencyInvoker, InvokerDispatch};
use crate::bus::Transport;
use crate::codec::{Codec, JsonCodec};
use crate::error::{ConsistencyError, ConsistencyResult};
use crate::subscription::{QueueSubscription, ReadinessGate, SubscriptionState, SubscriptionStats};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

struct Registration {
    invoker_name: &'static str,
    subscription: QueueSubscription,
}

/// Binds consumer callbacks to destinations.
///
/// Registration can happen at any time, but no subscription receives a
/// message before `start()` is called: every subscription is started
/// behind the registrar's readiness gate.
///
/// ```
/// use consis_rust::bus::InMemoryQueue;
/// use consis_rust::{InvokeError, InvokerRegistrar};
/// use std::sync::Arc;
///
/// let registrar = InvokerRegistrar::new(Arc::new(InMemoryQueue::new()));
/// registrar
///     .register_invoker("orders.created", |order: serde_json::Value| -> Result<(), InvokeError> {
///         println!("reserving stock for {}", order["id"]);
///         Ok(())
///     })
///     .unwrap();
/// registrar.start();
/// assert!(registrar.is_registered("orders.created"));
/// registrar.destroy();
/// ```
pub struct InvokerRegistrar<T, C = JsonCodec> {
    transport: Arc<T>,
    codec: C,
    gate: ReadinessGate,
    registrations: Mutex<HashMap<String, Registration>>,
    host_info: String,
    poll_interval: Duration,
}

impl<T: Transport + 'static> InvokerRegistrar<T, JsonCodec> {
    pub fn new(transport: Arc<T>) -> Self {
        Self::with_codec(transport, JsonCodec)
    }
}

impl<T, C> InvokerRegistrar<T, C>
where
    T: Transport + 'static,
    C: Codec + Clone,
{
    pub fn with_codec(transport: Arc<T>, codec: C) -> Self {
        Self {
            transport,
            codec,
            gate: ReadinessGate::new(),
            registrations: Mutex::new(HashMap::new()),
            host_info: local_host_info(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_host_info(mut self, host_info: impl Into<String>) -> Self {
        self.host_info = host_info.into();
        self
    }

    fn registrations(&self) -> MutexGuard<'_, HashMap<String, Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe `invoker` to `destination`.
    ///
    /// Fails with `IllegalState` when the destination already has a live
    /// registration; `unregister` it first to replace it.
    pub fn register_invoker<P, I>(&self, destination: &str, invoker: I) -> ConsistencyResult<()>
    where
        P: DeserializeOwned + 'static,
        I: ConsistencyInvoker<P>,
    {
        if destination.trim().is_empty() {
            return Err(ConsistencyError::InvalidArgument(
                "destination must not be empty".into(),
            ));
        }
        if self.gate.is_closed() {
            return Err(ConsistencyError::IllegalState(
                "registrar has been destroyed".into(),
            ));
        }

        let mut registrations = self.registrations();
        if let Some(existing) = registrations.get(destination) {
            return Err(ConsistencyError::IllegalState(format!(
                "destination {} already bound to {}, cannot bind {}",
                destination,
                existing.invoker_name,
                invoker.name()
            )));
        }

        let invoker_name = invoker.name();
        let handler = InvokerDispatch::<P, I, C, T>::new(
            destination,
            invoker,
            self.codec.clone(),
            Arc::clone(&self.transport),
            self.host_info.clone(),
        )
        .into_handler();
        let subscription = QueueSubscription::new(
            destination,
            Arc::clone(&self.transport),
            handler,
            self.poll_interval,
        );
        subscription.start_gated(self.gate.clone())?;

        info!(destination, invoker = invoker_name, "consistency invoker registered");
        registrations.insert(
            destination.to_string(),
            Registration {
                invoker_name,
                subscription,
            },
        );
        Ok(())
    }

    /// Application-ready signal. Releases every gated subscription.
    pub fn start(&self) {
        if self.gate.ready() {
            info!(destinations = self.registrations().len(), "consistency invokers ready");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    /// Close the subscription on `destination` and free the name.
    pub fn unregister(&self, destination: &str) -> ConsistencyResult<bool> {
        let removed = self.registrations().remove(destination);
        match removed {
            Some(registration) => {
                registration.subscription.close();
                debug!(destination, "consistency invoker unregistered");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close every subscription and release anything still waiting on
    /// the gate. Later registrations are rejected.
    pub fn destroy(&self) {
        self.gate.close();
        let drained: Vec<Registration> = self.registrations().drain().map(|(_, r)| r).collect();
        for registration in &drained {
            registration.subscription.close();
        }
        if !drained.is_empty() {
            info!(closed = drained.len(), "consistency invokers destroyed");
        }
    }

    pub fn destinations(&self) -> Vec<String> {
        let mut destinations: Vec<String> = self.registrations().keys().cloned().collect();
        destinations.sort();
        destinations
    }

    pub fn is_registered(&self, destination: &str) -> bool {
        self.registrations().contains_key(destination)
    }

    pub fn host_info(&self) -> &str {
        &self.host_info
    }

    pub fn subscription_state(&self, destination: &str) -> Option<SubscriptionState> {
        self.registrations()
            .get(destination)
            .map(|r| r.subscription.state())
    }

    pub fn stats(&self, destination: &str) -> Option<SubscriptionStats> {
        self.registrations()
            .get(destination)
            .map(|r| r.subscription.stats())
    }
}

impl<T, C> Drop for InvokerRegistrar<T, C> {
    fn drop(&mut self) {
        self.gate.close();
    }
}
