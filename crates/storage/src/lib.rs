#![forbid(unsafe_code)]

pub mod durable;
pub mod repository;
pub mod sqlite;

pub use durable::{DurableStore, DurableStoreWriter};
pub use repository::{FlagRecord, FlagRepository, InMemoryRepository, KeyValueStore, Storage, StorageError};
