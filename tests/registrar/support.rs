//! Shared fixtures for registrar tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use consis_rust::bus::{InMemoryQueue, Message};
use consis_rust::{InvokeError, InvokerRegistrar, CONFIRM_LEVEL_HEADER, TX_ID_HEADER};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

pub const POLL: Duration = Duration::from_millis(10);
pub const HOST: &str = "consumer-1[10.0.0.7]";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub id: u64,
    pub sku: String,
}

pub fn registrar(queue: &InMemoryQueue) -> InvokerRegistrar<InMemoryQueue> {
    init_tracing();
    InvokerRegistrar::new(Arc::new(queue.clone()))
        .with_poll_interval(POLL)
        .with_host_info(HOST)
}

/// A message as a producer would send it.
pub fn order_message(tx_id: &str, id: u64, level: u8, reply_to: Option<&str>) -> Message {
    let payload = serde_json::to_vec(&OrderCreated {
        id,
        sku: format!("SKU-{}", id),
    })
    .unwrap();
    let mut message = Message::new(tx_id, payload)
        .with_header(TX_ID_HEADER, tx_id)
        .with_header(CONFIRM_LEVEL_HEADER, level.to_string());
    message.reply_to = reply_to.map(str::to_string);
    message
}

/// Invoker that records every order it sees.
pub fn recording_invoker(
    seen: &Arc<Mutex<Vec<OrderCreated>>>,
) -> impl Fn(OrderCreated) -> Result<(), InvokeError> + Send + Sync + 'static {
    let seen = Arc::clone(seen);
    move |order: OrderCreated| {
        seen.lock().unwrap().push(order);
        Ok(())
    }
}

pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
