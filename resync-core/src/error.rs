//! Shared error taxonomy (spec §7).
//!
//! Every crate in the workspace defines its own `thiserror` enum for
//! operation-specific failures, but the categories below are common enough
//! to live once and be converted into with `#[from]` at crate boundaries.

use std::time::Duration;
use thiserror::Error;

/// Errors that cut across storage, locking, and integration boundaries.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    /// Malformed input: empty identifiers, wrong vector dimension, etc.
    /// Surfaced to the caller, never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Storage backend failure, subdivided so callers can decide whether to retry.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Lock held by another owner; not an error condition for the system,
    /// only for the caller that lost the race.
    #[error("lock unavailable: {0}")]
    LockUnavailable(String),

    /// JSON/metadata corruption encountered on read. Callers skip the
    /// offending entry rather than halting the batch.
    #[error("data parsing error: {0}")]
    DataParsing(String),

    /// Failure from an out-of-core capability (LLM, embedder, TWS client).
    #[error("integration error: {0}")]
    Integration(String),

    /// Deadline exceeded on an external call.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Catch-all for unexpected audit-subsystem failures. Always logged
    /// with full context by the caller before propagation.
    #[error("audit error: {0}")]
    Audit(String),
}

/// Storage-specific failure, distinguishing transient connection problems
/// (retried by the caller with [`RetryPolicy`]) from query-level failures
/// (surfaced immediately).
#[derive(Debug, Error, Clone)]
pub enum StorageError {
    /// Could not reach or maintain a connection to the backing store.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backing store rejected or failed to execute a well-formed request.
    #[error("query error: {0}")]
    Query(String),

    /// The connection pool has no available connections within its wait budget.
    #[error("pool exhausted: {0}")]
    PoolExhausted(String),
}

impl StorageError {
    /// Connection failures are the only class of storage error the caller
    /// should retry (spec §7 propagation policy).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Bounded exponential backoff for connection-error retry.
///
/// Defaults match spec §7: base 1s, cap 4s, max 3 attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(4),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given attempt (0-indexed: attempt 0 is the first retry).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base.saturating_mul(1 << attempt.min(16));
        scaled.min(self.cap)
    }

    /// Run `op`, retrying up to `max_attempts` times while it returns a
    /// retryable [`StorageError::Connection`]. Any other error (or an
    /// exhausted retry budget) is returned immediately.
    pub async fn retry<T, F, Fut>(&self, mut op: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, StorageError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    tracing::warn!(attempt, error = %e, "retrying after connection error");
                    tokio::time::sleep(self.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
