use resync_audit::AuditError;
use resync_core::CoreError;
use resync_memory::MemoryError;
use resync_retrieval::RetrievalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("integration error: {0}")]
    Integration(String),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
