//! In-process audit queue for tests and single-node dev.

use crate::error::{AuditError, Result};
use crate::record::{AuditMetrics, AuditRecord, AuditStatus};
use crate::traits::AuditQueue;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
struct State {
    /// FIFO order: push to front, read from front (spec §4.9 "left-push,
    /// read head").
    queue: std::collections::VecDeque<String>,
    records: HashMap<String, AuditRecord>,
}

#[derive(Default)]
pub struct InMemoryAuditQueue {
    state: Mutex<State>,
}

impl InMemoryAuditQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditQueue for InMemoryAuditQueue {
    async fn add(&self, record: AuditRecord) -> Result<bool> {
        let mut state = self.state.lock();
        if state.records.contains_key(&record.memory_id) {
            return Ok(false);
        }
        state.queue.push_front(record.memory_id.clone());
        state.records.insert(record.memory_id.clone(), record);
        Ok(true)
    }

    async fn get_pending(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        let state = self.state.lock();
        Ok(state
            .queue
            .iter()
            .take(limit)
            .filter_map(|id| state.records.get(id))
            .filter(|r| r.status == AuditStatus::Pending)
            .cloned()
            .collect())
    }

    async fn update_status(&self, memory_id: &str, status: AuditStatus) -> Result<bool> {
        if matches!(status, AuditStatus::Pending) {
            return Err(AuditError::Validation("new status must be approved or rejected".into()));
        }
        let mut state = self.state.lock();
        let Some(record) = state.records.get_mut(memory_id) else {
            return Ok(false);
        };
        record.status = status;
        record.reviewed_at = Some(Utc::now());
        Ok(true)
    }

    async fn is_approved(&self, memory_id: &str) -> Result<bool> {
        let state = self.state.lock();
        Ok(state.records.get(memory_id).map(|r| r.status == AuditStatus::Approved).unwrap_or(false))
    }

    async fn delete(&self, memory_id: &str) -> Result<bool> {
        let mut state = self.state.lock();
        let existed = state.records.remove(memory_id).is_some();
        state.queue.retain(|id| id != memory_id);
        Ok(existed)
    }

    async fn queue_length(&self) -> Result<usize> {
        Ok(self.state.lock().queue.len())
    }

    async fn metrics(&self) -> Result<AuditMetrics> {
        let state = self.state.lock();
        let mut metrics = AuditMetrics { total: state.records.len() as u64, ..AuditMetrics::default() };
        for record in state.records.values() {
            match record.status {
                AuditStatus::Pending => metrics.pending += 1,
                AuditStatus::Approved => metrics.approved += 1,
                AuditStatus::Rejected => metrics.rejected += 1,
            }
        }
        Ok(metrics)
    }

    async fn cleanup_processed(&self, days_old: u32) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days_old));
        let mut state = self.state.lock();
        let stale: Vec<String> = state
            .records
            .values()
            .filter(|r| {
                matches!(r.status, AuditStatus::Approved | AuditStatus::Rejected)
                    && r.reviewed_at.is_some_and(|t| t < cutoff)
            })
            .map(|r| r.memory_id.clone())
            .collect();
        for id in &stale {
            state.records.remove(id);
            state.queue.retain(|q| q != id);
        }
        Ok(stale.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> AuditRecord {
        AuditRecord::new(id, "query", "response", "low confidence", 0.3)
    }

    #[tokio::test]
    async fn adding_an_existing_memory_id_is_a_noop() {
        let queue = InMemoryAuditQueue::new();
        assert!(queue.add(record("m1")).await.unwrap());
        assert!(!queue.add(record("m1")).await.unwrap());
        assert_eq!(queue.queue_length().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn approve_then_is_approved_is_true() {
        let queue = InMemoryAuditQueue::new();
        queue.add(record("m1")).await.unwrap();
        assert!(queue.update_status("m1", AuditStatus::Approved).await.unwrap());
        assert!(queue.is_approved("m1").await.unwrap());
    }

    #[tokio::test]
    async fn add_delete_add_restores_presence() {
        let queue = InMemoryAuditQueue::new();
        queue.add(record("m1")).await.unwrap();
        queue.delete("m1").await.unwrap();
        assert!(queue.add(record("m1")).await.unwrap());
        assert_eq!(queue.queue_length().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_pending_zero_limit_is_empty() {
        let queue = InMemoryAuditQueue::new();
        queue.add(record("m1")).await.unwrap();
        assert!(queue.get_pending(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn approved_status_never_moves_back_to_pending_via_reject_after() {
        let queue = InMemoryAuditQueue::new();
        queue.add(record("m1")).await.unwrap();
        queue.update_status("m1", AuditStatus::Approved).await.unwrap();
        // second transition is idempotent-in-shape (status stays approved, timestamp advances)
        queue.update_status("m1", AuditStatus::Approved).await.unwrap();
        assert!(queue.is_approved("m1").await.unwrap());
    }
}
