//! The `AuditQueue` capability (spec §4.9).

use crate::error::Result;
use crate::record::{AuditMetrics, AuditRecord, AuditStatus};
use async_trait::async_trait;

#[async_trait]
pub trait AuditQueue: Send + Sync {
    /// Reject (return `false`) if `memory_id` already exists; otherwise
    /// left-push to the queue and store status=pending + full record.
    async fn add(&self, record: AuditRecord) -> Result<bool>;

    /// Read the first `limit` queued ids; for each still `pending`, return
    /// its record. Malformed entries are skipped with a warning.
    async fn get_pending(&self, limit: usize) -> Result<Vec<AuditRecord>>;

    /// Requires an existing record; sets `status` and stamps `reviewed_at`.
    /// `status` must be `approved` or `rejected`.
    async fn update_status(&self, memory_id: &str, status: AuditStatus) -> Result<bool>;

    async fn is_approved(&self, memory_id: &str) -> Result<bool>;

    /// Removes from the queue list, status map, and data map.
    async fn delete(&self, memory_id: &str) -> Result<bool>;

    async fn queue_length(&self) -> Result<usize>;

    async fn metrics(&self) -> Result<AuditMetrics>;

    /// Delete `approved`/`rejected` entries whose `reviewed_at` is older
    /// than `days_old`. Returns the count removed.
    async fn cleanup_processed(&self, days_old: u32) -> Result<u64>;
}
