use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{DeleteOutcome, RecordStore, StoreError};
use crate::models::{DreamRecord, NewDream};

#[derive(Debug)]
struct State {
    next_id: i64,
    records: BTreeMap<i64, DreamRecord>,
}

/// Process-local store; contents vanish on restart.
#[derive(Debug)]
pub struct MemoryRecordStore {
    state: RwLock<State>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                next_id: 1,
                records: BTreeMap::new(),
            }),
        }
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, dream: NewDream) -> Result<DreamRecord, StoreError> {
        let mut state = self.state.write().await;
        let id = state.next_id;
        state.next_id += 1;

        let record = DreamRecord::from_new(id, Utc::now(), dream);
        state.records.insert(id, record.clone());
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<DreamRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state.records.values().cloned().collect())
    }

    async fn delete_by_id(&self, id: i64) -> Result<DeleteOutcome, StoreError> {
        let mut state = self.state.write().await;
        Ok(match state.records.remove(&id) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        })
    }

    async fn describe(&self) -> Result<String, StoreError> {
        let state = self.state.read().await;
        Ok(format!("in-memory ({} records)", state.records.len()))
    }
}
