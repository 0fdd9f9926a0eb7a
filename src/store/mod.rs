//! Key-value persistence behind the leaderboard.
//!
//! The leaderboard lives under a single key as one JSON document, so backends
//! only need whole-value `get` and `put`. Every `put` replaces the previous
//! value atomically; readers never observe a partial write.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use thiserror::Error;

use crate::config::{Config, StoreBackend};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait KvStore: Send + Sync {
    /// Short backend name reported by the health probe.
    fn backend(&self) -> &'static str;

    /// Absent keys are `Ok(None)`, not an error.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

pub fn open(config: &Config) -> Result<Arc<dyn KvStore>, StoreError> {
    Ok(match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(&config.database_path)?),
    })
}
