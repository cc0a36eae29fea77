//! Write-through cache that serves the synchronous [`KeyValueStore`] contract
//! on top of an async [`FlagRepository`].
//!
//! Reads are answered from a snapshot taken at open time plus local writes.
//! Writes update the snapshot immediately and are persisted by a background task
//! in the order they were issued.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use reveal_core::Clock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::repository::{FlagRecord, FlagRepository, KeyValueStore, StorageError};

pub struct DurableStore {
    clock: Clock,
    cache: Mutex<HashMap<String, String>>,
    writes: Mutex<Option<mpsc::UnboundedSender<FlagRecord>>>,
}

/// Background writer owned by whoever opened the store.
pub struct DurableStoreWriter {
    join: JoinHandle<usize>,
}

impl DurableStore {
    /// Load every flag from `repo` and start the writer task.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the initial load fails.
    pub async fn open(
        repo: Arc<dyn FlagRepository>,
        clock: Clock,
    ) -> Result<(Arc<Self>, DurableStoreWriter), StorageError> {
        let cache: HashMap<String, String> = repo
            .load_flags()
            .await?
            .into_iter()
            .map(|record| (record.key, record.value))
            .collect();
        tracing::debug!(flags = cache.len(), "loaded persisted flags");

        let (tx, rx) = mpsc::unbounded_channel();
        let join = tokio::spawn(run_writer(repo, rx));

        let store = Arc::new(Self {
            clock,
            cache: Mutex::new(cache),
            writes: Mutex::new(Some(tx)),
        });
        Ok((store, DurableStoreWriter { join }))
    }

    /// Stop accepting writes. Already queued writes are still persisted.
    pub fn close(&self) {
        if let Ok(mut writes) = self.writes.lock() {
            writes.take();
        }
    }
}

impl DurableStoreWriter {
    /// Wait for the writer to drain after [`DurableStore::close`].
    ///
    /// Returns the number of records persisted.
    pub async fn finished(self) -> usize {
        match self.join.await {
            Ok(written) => written,
            Err(err) => {
                tracing::warn!(error = %err, "flag writer task failed");
                0
            }
        }
    }
}

impl KeyValueStore for DurableStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .cache
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let record = FlagRecord {
            key: key.to_string(),
            value: value.to_string(),
            updated_at: self.clock.now(),
        };

        {
            let writes = self
                .writes
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            let sender = writes.as_ref().ok_or(StorageError::Closed)?;
            sender.send(record).map_err(|_| StorageError::Closed)?;
        }

        let mut guard = self
            .cache
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

async fn run_writer(
    repo: Arc<dyn FlagRepository>,
    mut rx: mpsc::UnboundedReceiver<FlagRecord>,
) -> usize {
    let mut written = 0;
    while let Some(record) = rx.recv().await {
        match repo.put_flag(&record).await {
            Ok(()) => {
                written += 1;
                tracing::debug!(key = %record.key, "flag persisted");
            }
            Err(err) => {
                tracing::warn!(key = %record.key, error = %err, "failed to persist flag");
            }
        }
    }
    written
}
