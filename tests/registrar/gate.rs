//! Readiness gate behaviour.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use consis_rust::bus::{InMemoryQueue, Sender};
use consis_rust::subscription::{ReadinessGate, SubscriptionState};

use crate::support::{order_message, recording_invoker, registrar, wait_for};

// ============================================================================
// Nothing is delivered before start()
// ============================================================================

#[test]
fn messages_wait_for_application_ready() {
    let queue = InMemoryQueue::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let registrar = registrar(&queue);

    registrar
        .register_invoker("orders.created", recording_invoker(&seen))
        .unwrap();
    queue.send("orders.created", order_message("tx-1", 1, 1, None)).unwrap();
    queue.send("orders.created", order_message("tx-2", 2, 1, None)).unwrap();

    thread::sleep(Duration::from_millis(80));
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(queue.pending("orders.created"), 2);
    assert_eq!(
        registrar.subscription_state("orders.created"),
        Some(SubscriptionState::WaitingReady)
    );

    registrar.start();
    registrar.start();

    assert!(wait_for(|| seen.lock().unwrap().len() == 2));
    let ids: Vec<u64> = seen.lock().unwrap().iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(
        registrar.subscription_state("orders.created"),
        Some(SubscriptionState::Running)
    );

    registrar.destroy();
}

#[test]
fn registration_after_start_receives_immediately() {
    let queue = InMemoryQueue::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let registrar = registrar(&queue);
    registrar.start();

    registrar
        .register_invoker("orders.created", recording_invoker(&seen))
        .unwrap();
    queue.send("orders.created", order_message("tx-1", 1, 1, None)).unwrap();

    assert!(wait_for(|| seen.lock().unwrap().len() == 1));
    registrar.destroy();
}

// ============================================================================
// Shutdown paths
// ============================================================================

#[test]
fn destroy_before_ready_releases_waiting_subscriptions() {
    let queue = InMemoryQueue::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let registrar = registrar(&queue);

    registrar
        .register_invoker("orders.created", recording_invoker(&seen))
        .unwrap();
    registrar
        .register_invoker("orders.cancelled", recording_invoker(&seen))
        .unwrap();

    registrar.destroy();
    registrar.start();
    queue.send("orders.created", order_message("tx-1", 1, 1, None)).unwrap();

    thread::sleep(Duration::from_millis(50));
    assert!(seen.lock().unwrap().is_empty());
    assert!(!registrar.is_ready());
    assert!(registrar.destinations().is_empty());
}

#[test]
fn standalone_gate_is_single_fire() {
    let gate = ReadinessGate::new();
    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let gate = gate.clone();
            thread::spawn(move || gate.wait())
        })
        .collect();

    assert!(gate.ready());
    assert!(!gate.ready());
    for waiter in waiters {
        assert!(waiter.join().unwrap());
    }
    // Late waiters pass straight through
    assert!(gate.wait());
}
