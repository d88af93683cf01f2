//! Dream record persistence
//!
//! Records are append-only: insert, list, delete by id. Writes are
//! serialized so ids stay unique and strictly increasing; deleted ids are
//! never handed out again.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DreamRecord, NewDream};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Atomically append a record and return it with its assigned id.
    async fn insert(&self, dream: NewDream) -> Result<DreamRecord, StoreError>;

    /// All records, ordered by id ascending.
    async fn list(&self) -> Result<Vec<DreamRecord>, StoreError>;

    async fn delete_by_id(&self, id: i64) -> Result<DeleteOutcome, StoreError>;

    /// Short backend status line for health reporting.
    async fn describe(&self) -> Result<String, StoreError>;
}
