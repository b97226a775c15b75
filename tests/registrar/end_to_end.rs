//! Producer and consumer sharing one in-memory broker.

use std::sync::{Arc, Mutex};

use consis_rust::bus::InMemoryQueue;
use consis_rust::store::{ConsistencyStore, InMemoryConsistencyStore};
use consis_rust::{
    ConfirmLevel, ConfirmStatus, ConsistencyConfig, ConsistencyHandler, Keyed, RetryStatus,
    TransactionScope,
};

use crate::support::{recording_invoker, registrar, wait_for, OrderCreated, HOST, POLL};

#[test]
fn executed_level_round_trip() {
    let queue = InMemoryQueue::new();
    let store = InMemoryConsistencyStore::new();

    let producer = ConsistencyHandler::new(
        Arc::new(store.clone()),
        Arc::new(queue.clone()),
        ConsistencyConfig::new()
            .with_confirm_destination("orders.confirm")
            .with_poll_interval(POLL),
    )
    .unwrap();
    producer.start().unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let consumer = registrar(&queue);
    consumer
        .register_invoker("orders.created", recording_invoker(&seen))
        .unwrap();
    consumer.start();

    let order = OrderCreated {
        id: 42,
        sku: "SKU-42".into(),
    };
    let tx = TransactionScope::new();
    let record = producer
        .handle(
            "orders.created",
            &Keyed::new(order.id.to_string(), &order),
            ConfirmLevel::Executed,
            &tx,
        )
        .unwrap();
    tx.commit();

    assert!(wait_for(|| store
        .get_by_id(record.id)
        .unwrap()
        .is_some_and(|r| r.is_executed())));

    assert_eq!(*seen.lock().unwrap(), vec![order]);

    let stored = store.get_by_id(record.id).unwrap().unwrap();
    assert_eq!(stored.confirm_status, ConfirmStatus::Executed);
    assert_eq!(stored.retry_status, RetryStatus::No);
    assert_eq!(stored.biz_id, "42");
    assert_eq!(stored.execute_host.as_deref(), Some(HOST));
    assert!(stored.confirm_execute_time.is_some());

    // Nothing left to compensate
    assert_eq!(producer.compensate(10).unwrap().unwrap().selected, 0);

    consumer.destroy();
    producer.destroy();
}

#[test]
fn sent_level_round_trip_needs_no_reply() {
    let queue = InMemoryQueue::new();
    let store = InMemoryConsistencyStore::new();
    let producer = ConsistencyHandler::new(
        Arc::new(store.clone()),
        Arc::new(queue.clone()),
        ConsistencyConfig::new()
            .with_confirm_destination("orders.confirm")
            .with_poll_interval(POLL),
    )
    .unwrap();
    producer.start().unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let consumer = registrar(&queue);
    consumer
        .register_invoker("orders.created", recording_invoker(&seen))
        .unwrap();
    consumer.start();

    let order = OrderCreated {
        id: 7,
        sku: "SKU-7".into(),
    };
    let tx = TransactionScope::new();
    let record = producer.handle_sent("orders.created", &Keyed::new("7", &order), &tx).unwrap();
    tx.commit();

    assert!(wait_for(|| seen.lock().unwrap().len() == 1));
    let stored = store.get_by_id(record.id).unwrap().unwrap();
    assert_eq!(stored.confirm_status, ConfirmStatus::Sent);
    assert_eq!(stored.retry_status, RetryStatus::No);
    assert_eq!(queue.sent_count("orders.confirm"), 0);

    consumer.destroy();
    producer.destroy();
}
