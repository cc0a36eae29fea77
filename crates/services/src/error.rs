//! Shared error types for the services crate.

use thiserror::Error;

use reveal_core::page::PageError;
use reveal_core::{ConfigError, ListenerError};
use storage::repository::StorageError;

/// Failure of a single reveal side effect. Logged and never propagated.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RevealStepError {
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("{failed} of {total} elements rejected the change")]
    Partial { failed: usize, total: usize },
}

/// Errors emitted by the initialization surface.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}
