use resync_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("data parsing error: {0}")]
    DataParsing(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, MemoryError>;
