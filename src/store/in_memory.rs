use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use super::{ConsistencyStore, StoreError};
use crate::record::{ConfirmStatus, ConsistencyRecord};

/// Thread-safe in-memory store.
///
/// Cloning creates another handle to the same storage, so a test can keep
/// one clone for assertions while the handler owns the other.
#[derive(Clone)]
pub struct InMemoryConsistencyStore {
    records: Arc<RwLock<BTreeMap<u64, ConsistencyRecord>>>,
    tx_index: Arc<RwLock<HashMap<String, u64>>>,
    seq: Arc<AtomicU64>,
}

impl InMemoryConsistencyStore {
    pub fn new() -> Self {
        InMemoryConsistencyStore {
            records: Arc::new(RwLock::new(BTreeMap::new())),
            tx_index: Arc::new(RwLock::new(HashMap::new())),
            seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Snapshot of every stored record, ordered by id.
    pub fn all(&self) -> Result<Vec<ConsistencyRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::LockPoisoned("read"))?;
        Ok(records.values().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryConsistencyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsistencyStore for InMemoryConsistencyStore {
    fn add(&self, record: &ConsistencyRecord) -> Result<u64, StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::LockPoisoned("write"))?;
        let mut tx_index = self
            .tx_index
            .write()
            .map_err(|_| StoreError::LockPoisoned("tx index write"))?;

        if tx_index.contains_key(&record.tx_id) {
            return Err(StoreError::Duplicate(record.tx_id.clone()));
        }

        let id = self.seq.fetch_add(1, Ordering::SeqCst);
        let mut stored = record.clone();
        stored.id = id;
        stored.updated_at = Utc::now();
        tx_index.insert(stored.tx_id.clone(), id);
        records.insert(id, stored);
        Ok(id)
    }

    fn update(&self, record: &ConsistencyRecord) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::LockPoisoned("write"))?;
        let slot = records
            .get_mut(&record.id)
            .ok_or_else(|| StoreError::NotFound(record.id.to_string()))?;
        *slot = record.clone();
        slot.updated_at = Utc::now();
        Ok(())
    }

    fn get_by_id(&self, id: u64) -> Result<Option<ConsistencyRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::LockPoisoned("read"))?;
        Ok(records.get(&id).cloned())
    }

    fn get_by_tx_id(&self, tx_id: &str) -> Result<Option<ConsistencyRecord>, StoreError> {
        let id = {
            let tx_index = self
                .tx_index
                .read()
                .map_err(|_| StoreError::LockPoisoned("tx index read"))?;
            match tx_index.get(tx_id) {
                Some(id) => *id,
                None => return Ok(None),
            }
        };
        self.get_by_id(id)
    }

    fn query_retry_eligible(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConsistencyRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::LockPoisoned("read"))?;
        Ok(records
            .values()
            .filter(|record| record.is_due(now))
            .take(limit)
            .cloned()
            .collect())
    }

    fn query_by_status(
        &self,
        status: ConfirmStatus,
    ) -> Result<Vec<ConsistencyRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::LockPoisoned("read"))?;
        Ok(records
            .values()
            .filter(|record| record.confirm_status == status)
            .cloned()
            .collect())
    }
}
