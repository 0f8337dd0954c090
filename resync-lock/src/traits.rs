//! The `DistributedLock` capability (spec §4.8).

use crate::error::Result;
use async_trait::async_trait;

/// A held lock. Dropping without calling `release` leaves the lock to
/// expire naturally via its TTL — this type carries no `Drop` impl because
/// release is fallible and async; callers must call it explicitly.
#[derive(Debug, Clone)]
pub struct LockHandle {
    pub key: String,
    pub token: String,
}

#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// `SET key token NX PX ttl_ms`. Fails with `LockError::Unavailable` if
    /// already held.
    async fn acquire(&self, key: &str, ttl_ms: u64) -> Result<LockHandle>;

    /// Compare-and-delete by `handle.token`; returns `false` (not an error)
    /// if the lock had already expired and been re-acquired by someone
    /// else, or never existed.
    async fn release(&self, handle: &LockHandle) -> Result<bool>;

    /// Administrative: delete `key` unconditionally, regardless of owner.
    async fn force_release(&self, key: &str) -> Result<bool>;

    /// Delete keys under this lock's prefix whose remaining TTL is at or
    /// below `max_age_seconds`. Returns the count removed.
    async fn cleanup_expired(&self, max_age_seconds: u64) -> Result<u64>;
}
