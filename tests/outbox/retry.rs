//! Backoff, expiry and compensation.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{TimeDelta, Utc};
use consis_rust::store::{ConsistencyStore, InMemoryConsistencyStore};
use consis_rust::{
    CompensationResult, CompensationWorker, ConfirmStatus, ConsistencyRecord, NoTransaction,
    RetryStatus, TransactionScope, EXHAUSTED_CAUSE, ROLLED_BACK_CAUSE,
};
use serde_json::json;

use crate::support::Harness;

fn make_due(store: &InMemoryConsistencyStore, id: u64) {
    let mut record = store.get_by_id(id).unwrap().unwrap();
    record.retry_time = Utc::now() - TimeDelta::seconds(1);
    store.update(&record).unwrap();
}

fn persist_failed(h: &Harness) -> ConsistencyRecord {
    h.queue.fail_next(1);
    h.handler
        .handle_sent("orders.created", &json!({"id": 1}), &NoTransaction)
        .unwrap()
}

// ============================================================================
// Tiered backoff
// ============================================================================

#[test]
fn eleventh_interval_is_floored_to_ten_minutes() {
    let h = Harness::plain();
    h.queue.fail_next(11);

    let record = ConsistencyRecord::new("orders.created", br#"{"id":7}"#.to_vec())
        .with_retry_interval(60);
    let record = h.handler.handle_record(record, &NoTransaction).unwrap();

    let mut intervals = Vec::new();
    let stored = h.store.get_by_id(record.id).unwrap().unwrap();
    intervals.push(stored.retry_interval);
    assert_eq!(stored.retry_count, 1);

    for expected_count in 2..=11 {
        let mut current = h.store.get_by_id(record.id).unwrap().unwrap();
        assert!(!h.handler.attempt_send(&mut current).unwrap());
        let stored = h.store.get_by_id(record.id).unwrap().unwrap();
        assert_eq!(stored.retry_count, expected_count);
        intervals.push(stored.retry_interval);
    }

    assert_eq!(intervals[..10], [60; 10]);
    assert_eq!(intervals[10], 600);

    let stored = h.store.get_by_id(record.id).unwrap().unwrap();
    assert_eq!(stored.retry_status, RetryStatus::Yes);
    assert_eq!(stored.confirm_status, ConfirmStatus::Initial);
    let scheduled = stored.retry_time - stored.updated_at;
    assert!(scheduled >= TimeDelta::seconds(599));
    assert_eq!(h.queue.sent_count("orders.created"), 0);

    // Broker is back: the next attempt goes through
    let mut current = stored;
    assert!(h.handler.attempt_send(&mut current).unwrap());
    assert_eq!(h.queue.sent_count("orders.created"), 1);
}

// ============================================================================
// Compensation sweep
// ============================================================================

#[test]
fn compensate_resends_due_records() {
    let h = Harness::plain();
    h.handler.start().unwrap();
    let record = persist_failed(&h);

    // Not due yet
    assert_eq!(
        h.handler.compensate(10).unwrap(),
        Some(CompensationResult::default())
    );

    make_due(&h.store, record.id);
    let result = h.handler.compensate(10).unwrap().unwrap();
    assert_eq!(result.selected, 1);
    assert_eq!(result.sent, 1);

    let stored = h.store.get_by_id(record.id).unwrap().unwrap();
    assert_eq!(stored.confirm_status, ConfirmStatus::Sent);
    assert_eq!(stored.retry_status, RetryStatus::No);
    assert_eq!(stored.retry_count, 2);
    assert_eq!(stored.fail_cause, None);
}

#[test]
fn compensate_respects_batch_size() {
    let h = Harness::plain();
    h.handler.start().unwrap();
    for _ in 0..3 {
        let record = persist_failed(&h);
        make_due(&h.store, record.id);
    }

    let first = h.handler.compensate(2).unwrap().unwrap();
    assert_eq!((first.selected, first.sent), (2, 2));
    let second = h.handler.compensate(2).unwrap().unwrap();
    assert_eq!((second.selected, second.sent), (1, 1));
    assert_eq!(h.queue.sent_count("orders.created"), 3);
}

#[test]
fn compensate_before_start_is_a_sentinel() {
    let h = Harness::plain();
    let record = persist_failed(&h);
    make_due(&h.store, record.id);

    assert_eq!(h.handler.compensate(10).unwrap(), None);
    assert_eq!(h.queue.sent_count("orders.created"), 0);
}

#[test]
fn rolled_back_record_is_never_compensated() {
    let h = Harness::plain();
    h.handler.start().unwrap();
    let tx = TransactionScope::new();
    let record = h
        .handler
        .handle_sent("orders.created", &json!({"id": 1}), &tx)
        .unwrap();
    tx.rollback();

    // Well past the first retry window
    make_due(&h.store, record.id);
    let result = h.handler.compensate(10).unwrap().unwrap();
    assert_eq!(result.selected, 0);
    assert_eq!(h.queue.sent_count("orders.created"), 0);

    let stored = h.store.get_by_id(record.id).unwrap().unwrap();
    assert_eq!(stored.retry_status, RetryStatus::No);
    assert_eq!(stored.fail_cause.as_deref(), Some(ROLLED_BACK_CAUSE));
}

#[test]
fn dropped_scope_retires_the_record() {
    let h = Harness::plain();
    h.handler.start().unwrap();
    let record = {
        let tx = TransactionScope::new();
        h.handler
            .handle_sent("orders.created", &json!({"id": 2}), &tx)
            .unwrap()
    };

    make_due(&h.store, record.id);
    assert_eq!(h.handler.compensate(10).unwrap().unwrap().selected, 0);
    assert_eq!(h.queue.sent_count("orders.created"), 0);
}

#[test]
fn committed_record_is_not_retired() {
    let h = Harness::plain();
    h.queue.fail_next(1);
    let tx = TransactionScope::new();
    let record = h
        .handler
        .handle_sent("orders.created", &json!({"id": 3}), &tx)
        .unwrap();
    tx.commit();

    let stored = h.store.get_by_id(record.id).unwrap().unwrap();
    assert_eq!(stored.retry_status, RetryStatus::Yes);
    assert_eq!(stored.retry_count, 1);
}

// ============================================================================
// Expiry and terminal state
// ============================================================================

#[test]
fn expired_record_is_abandoned_without_publish() {
    let h = Harness::plain();
    h.handler.start().unwrap();
    let record = persist_failed(&h);

    let mut stored = h.store.get_by_id(record.id).unwrap().unwrap();
    stored.first_sent_time = Utc::now() - TimeDelta::days(10) - TimeDelta::minutes(1);
    stored.retry_time = Utc::now() - TimeDelta::seconds(1);
    h.store.update(&stored).unwrap();

    let result = h.handler.compensate(10).unwrap().unwrap();
    assert_eq!((result.selected, result.sent, result.failed), (1, 0, 1));

    let stored = h.store.get_by_id(record.id).unwrap().unwrap();
    assert_eq!(stored.retry_status, RetryStatus::No);
    assert_eq!(stored.fail_cause.as_deref(), Some(EXHAUSTED_CAUSE));
    assert_eq!(h.queue.sent_count("orders.created"), 0);
}

#[test]
fn record_out_of_attempts_is_abandoned() {
    let h = Harness::plain();
    h.handler.start().unwrap();
    let record = persist_failed(&h);

    let mut stored = h.store.get_by_id(record.id).unwrap().unwrap();
    stored.retry_count = 100;
    stored.retry_time = Utc::now() - TimeDelta::seconds(1);
    h.store.update(&stored).unwrap();

    h.handler.compensate(10).unwrap();

    let stored = h.store.get_by_id(record.id).unwrap().unwrap();
    assert_eq!(stored.retry_status, RetryStatus::No);
    assert_eq!(stored.retry_count, 100);
    assert_eq!(stored.fail_cause.as_deref(), Some(EXHAUSTED_CAUSE));
}

#[test]
fn terminal_records_are_never_selected_again() {
    let h = Harness::plain();
    h.handler.start().unwrap();
    let record = h
        .handler
        .handle_sent("orders.created", &json!({"id": 1}), &NoTransaction)
        .unwrap();

    let mut stored = h.store.get_by_id(record.id).unwrap().unwrap();
    stored.retry_time = Utc::now() - TimeDelta::days(1);
    h.store.update(&stored).unwrap();

    for _ in 0..3 {
        assert_eq!(h.handler.compensate(10).unwrap().unwrap().selected, 0);
    }
    assert_eq!(h.queue.sent_count("orders.created"), 1);
    assert_eq!(
        h.store.query_by_status(ConfirmStatus::Sent).unwrap().len(),
        1
    );
}

// ============================================================================
// Background worker
// ============================================================================

#[test]
fn compensation_worker_drives_retries() {
    let h = Harness::plain();
    let handler = Arc::new(h.handler);
    handler.start().unwrap();

    h.queue.fail_next(1);
    let record = handler
        .handle_sent("orders.created", &json!({"id": 1}), &NoTransaction)
        .unwrap();
    make_due(&h.store, record.id);

    let worker = CompensationWorker::spawn(Arc::clone(&handler), 10, Duration::from_millis(10));

    let deadline = Instant::now() + Duration::from_secs(2);
    while h.queue.sent_count("orders.created") == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    let stats = worker.stop();

    assert_eq!(h.queue.sent_count("orders.created"), 1);
    assert_eq!(stats.sent, 1);
    assert!(stats.sweeps >= 1);
    assert_eq!(stats.errors, 0);
}
