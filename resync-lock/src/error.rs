use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("validation error: {0}")]
    Validation(String),
    /// Acquire failed because the key is already held — not a failure of
    /// the lock service, only of this caller's attempt (spec §4.8, §7).
    #[error("lock unavailable: {0}")]
    Unavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, LockError>;
