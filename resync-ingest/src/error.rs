use resync_core::CoreError;
use resync_vector::VectorStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Vector(#[from] VectorStoreError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("integration error: {0}")]
    Integration(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
