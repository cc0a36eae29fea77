use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reveal_core::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage is closed")]
    Closed,
}

/// One persisted key/value pair with its last write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagRecord {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Synchronous key-value contract consumed from the controller's event loop.
///
/// Mirrors origin-scoped browser storage: string keys, string values.
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the write cannot be accepted.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Durable backend for flags.
#[async_trait]
pub trait FlagRepository: Send + Sync {
    /// Load every stored flag.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be queried.
    async fn load_flags(&self) -> Result<Vec<FlagRecord>, StorageError>;

    /// Fetch a single flag.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be queried.
    async fn get_flag(&self, key: &str) -> Result<Option<FlagRecord>, StorageError>;

    /// Insert or overwrite a flag.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn put_flag(&self, record: &FlagRecord) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    clock: Clock,
    flags: Arc<Mutex<HashMap<String, FlagRecord>>>,
    writes: Arc<Mutex<u64>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Number of accepted writes, across both the sync and async contracts.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn write_count(&self) -> Result<u64, StorageError> {
        let guard = self
            .writes
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(*guard)
    }

    fn store(&self, record: FlagRecord) -> Result<(), StorageError> {
        let mut guard = self
            .flags
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(record.key.clone(), record);
        let mut writes = self
            .writes
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *writes += 1;
        Ok(())
    }

    fn fetch(&self, key: &str) -> Result<Option<FlagRecord>, StorageError> {
        let guard = self
            .flags
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }
}

impl KeyValueStore for InMemoryRepository {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.fetch(key)?.map(|record| record.value))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.store(FlagRecord {
            key: key.to_string(),
            value: value.to_string(),
            updated_at: self.clock.now(),
        })
    }
}

#[async_trait]
impl FlagRepository for InMemoryRepository {
    async fn load_flags(&self) -> Result<Vec<FlagRecord>, StorageError> {
        let guard = self
            .flags
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut records: Vec<FlagRecord> = guard.values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn get_flag(&self, key: &str) -> Result<Option<FlagRecord>, StorageError> {
        self.fetch(key)
    }

    async fn put_flag(&self, record: &FlagRecord) -> Result<(), StorageError> {
        self.store(record.clone())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub flags: Arc<dyn FlagRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let flags: Arc<dyn FlagRepository> = Arc::new(InMemoryRepository::new());
        Self { flags }
    }
}
