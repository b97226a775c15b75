use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::StoreError;
use crate::record::{ConfirmStatus, ConsistencyRecord};

/// Durable storage for consistency records.
///
/// Implementations must serialize concurrent `update`s to the same record
/// id (row-level locking or equivalent). The core adds an in-process
/// per-record lock on top but does no optimistic concurrency control of
/// its own, so two processes sharing a store rely on this guarantee.
pub trait ConsistencyStore: Send + Sync {
    /// Persist a new record and return its assigned id.
    ///
    /// Fails with `Duplicate` when the transaction id is already known.
    fn add(&self, record: &ConsistencyRecord) -> Result<u64, StoreError>;

    /// Overwrite the stored record with the same id.
    fn update(&self, record: &ConsistencyRecord) -> Result<(), StoreError>;

    fn get_by_id(&self, id: u64) -> Result<Option<ConsistencyRecord>, StoreError>;

    fn get_by_tx_id(&self, tx_id: &str) -> Result<Option<ConsistencyRecord>, StoreError>;

    /// Up to `limit` records with `retry_status = Yes` and `retry_time <= now`,
    /// in any order.
    fn query_retry_eligible(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConsistencyRecord>, StoreError>;

    /// All records currently in `status`, for out-of-band inspection.
    fn query_by_status(&self, status: ConfirmStatus)
        -> Result<Vec<ConsistencyRecord>, StoreError>;
}

impl<S: ConsistencyStore + ?Sized> ConsistencyStore for Arc<S> {
    fn add(&self, record: &ConsistencyRecord) -> Result<u64, StoreError> {
        (**self).add(record)
    }

    fn update(&self, record: &ConsistencyRecord) -> Result<(), StoreError> {
        (**self).update(record)
    }

    fn get_by_id(&self, id: u64) -> Result<Option<ConsistencyRecord>, StoreError> {
        (**self).get_by_id(id)
    }

    fn get_by_tx_id(&self, tx_id: &str) -> Result<Option<ConsistencyRecord>, StoreError> {
        (**self).get_by_tx_id(tx_id)
    }

    fn query_retry_eligible(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConsistencyRecord>, StoreError> {
        (**self).query_retry_eligible(limit, now)
    }

    fn query_by_status(
        &self,
        status: ConfirmStatus,
    ) -> Result<Vec<ConsistencyRecord>, StoreError> {
        (**self).query_by_status(status)
    }
}
