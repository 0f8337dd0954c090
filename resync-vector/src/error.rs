//! Vector store error taxonomy (spec §4.1, §7).

use resync_core::StorageError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum VectorStoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, VectorStoreError>;

impl VectorStoreError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(s) if s.is_retryable())
    }
}
