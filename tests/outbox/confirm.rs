//! Execution replies arriving at the producer.

use std::thread;
use std::time::{Duration, Instant};

use consis_rust::bus::{Listener, Message, Sender};
use consis_rust::store::ConsistencyStore;
use consis_rust::{
    ConfirmLevel, ConfirmMessage, ConfirmStatus, NoTransaction, RetryStatus, TX_ID_HEADER,
};
use serde_json::json;

use crate::support::Harness;

const CONFIRM_QUEUE: &str = "orders.confirm";

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn executed_record(h: &Harness) -> u64 {
    h.handler
        .handle("orders.created", &json!({"id": 42}), ConfirmLevel::Executed, &NoTransaction)
        .unwrap()
        .id
}

// ============================================================================
// Reply listener
// ============================================================================

#[test]
fn reply_on_confirm_queue_marks_record_executed() {
    let h = Harness::with_confirm(CONFIRM_QUEUE);
    h.handler.start().unwrap();
    let id = executed_record(&h);
    let tx_id = h.store.get_by_id(id).unwrap().unwrap().tx_id;

    let reply = ConfirmMessage::executed(tx_id, "node-b[10.0.0.2]");
    h.queue.send(CONFIRM_QUEUE, reply.to_message().unwrap()).unwrap();

    assert!(wait_for(|| h.store.get_by_id(id).unwrap().unwrap().is_executed()));
    let stored = h.store.get_by_id(id).unwrap().unwrap();
    assert_eq!(stored.retry_status, RetryStatus::No);
    assert_eq!(stored.execute_host.as_deref(), Some("node-b[10.0.0.2]"));
    assert_eq!(stored.confirm_execute_time, Some(reply.execute_time));

    h.handler.destroy();
}

#[test]
fn reply_listener_is_not_open_before_start() {
    let h = Harness::with_confirm(CONFIRM_QUEUE);
    let id = executed_record(&h);
    let tx_id = h.store.get_by_id(id).unwrap().unwrap().tx_id;

    h.queue
        .send(CONFIRM_QUEUE, ConfirmMessage::executed(tx_id, "h").to_message().unwrap())
        .unwrap();
    thread::sleep(Duration::from_millis(50));

    assert_eq!(h.queue.pending(CONFIRM_QUEUE), 1);
    assert_eq!(
        h.store.get_by_id(id).unwrap().unwrap().confirm_status,
        ConfirmStatus::Sent
    );
}

#[test]
fn failure_and_malformed_replies_are_consumed_and_ignored() {
    let h = Harness::with_confirm(CONFIRM_QUEUE);
    h.handler.start().unwrap();
    let id = executed_record(&h);
    let tx_id = h.store.get_by_id(id).unwrap().unwrap().tx_id;

    let failed = ConfirmMessage::failed(tx_id, "h").to_message().unwrap();
    let failed_id = failed.id.clone();
    h.queue.send(CONFIRM_QUEUE, failed).unwrap();
    h.queue
        .send(CONFIRM_QUEUE, Message::with_string_payload("garbage-1", "{not json"))
        .unwrap();
    h.queue
        .send(
            CONFIRM_QUEUE,
            ConfirmMessage::executed("unknown-tx", "h").to_message().unwrap(),
        )
        .unwrap();

    assert!(wait_for(|| h.queue.acknowledged().len() == 3));
    let acked = h.queue.acknowledged();
    assert!(acked.contains(&failed_id));
    assert!(acked.contains(&"garbage-1".to_string()));
    assert_eq!(h.queue.redelivered(), 0);

    let stored = h.store.get_by_id(id).unwrap().unwrap();
    assert_eq!(stored.confirm_status, ConfirmStatus::Sent);
    assert_eq!(stored.retry_status, RetryStatus::Yes);

    h.handler.destroy();
}

// ============================================================================
// Monotonic confirm status
// ============================================================================

#[test]
fn stale_copy_cannot_regress_executed_record() {
    let h = Harness::with_confirm(CONFIRM_QUEUE);
    let id = executed_record(&h);
    let mut stale = h.store.get_by_id(id).unwrap().unwrap();
    assert_eq!(stale.confirm_status, ConfirmStatus::Sent);

    let reply = ConfirmMessage::executed(stale.tx_id.clone(), "node-b[10.0.0.2]");
    assert!(h.handler.apply_confirmation(&reply).unwrap());
    assert!(!h.handler.apply_confirmation(&reply).unwrap());

    // A manual resend from the stale copy still leaves the record executed
    assert!(h.handler.attempt_send(&mut stale).unwrap());

    let stored = h.store.get_by_id(id).unwrap().unwrap();
    assert_eq!(stored.confirm_status, ConfirmStatus::Executed);
    assert_eq!(stored.retry_status, RetryStatus::No);
    assert_eq!(stored.execute_host.as_deref(), Some("node-b[10.0.0.2]"));
}

#[test]
fn executed_level_keeps_retrying_until_confirmed() {
    let h = Harness::with_confirm(CONFIRM_QUEUE);
    let id = executed_record(&h);

    let stored = h.store.get_by_id(id).unwrap().unwrap();
    assert_eq!(stored.confirm_status, ConfirmStatus::Sent);
    assert_eq!(stored.retry_status, RetryStatus::Yes);
    assert_eq!(
        h.store.query_by_status(ConfirmStatus::Sent).unwrap().len(),
        1
    );
}

// ============================================================================
// Resends while an earlier copy is in flight
// ============================================================================

#[test]
fn resend_does_not_collide_with_in_flight_copy() {
    let h = Harness::with_confirm(CONFIRM_QUEUE);
    let id = executed_record(&h);
    let mut record = h.store.get_by_id(id).unwrap().unwrap();
    assert!(h.handler.attempt_send(&mut record).unwrap());

    let first = h.queue.listen("orders.created", 0).unwrap().unwrap();
    let second = h.queue.listen("orders.created", 0).unwrap().unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(first.header(TX_ID_HEADER), second.header(TX_ID_HEADER));

    h.queue.ack("orders.created", &first.id).unwrap();
    h.queue
        .nack("orders.created", &second.id, "consumer busy")
        .unwrap();
    assert_eq!(h.queue.pending("orders.created"), 1);
}
