use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("data parsing error: {0}")]
    DataParsing(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("lock unavailable: {0}")]
    LockUnavailable(String),
}

pub type Result<T> = std::result::Result<T, AuditError>;
