//! Redis-backed `AuditQueue` (spec §4.9): `audit:queue` list, `audit:status`
//! and `audit:data` hashes, written together via a pipeline. Cross-structure
//! atomicity is not guaranteed (Redis has no cross-structure transaction
//! without WATCH/MULTI) — the read path tolerates a missing/malformed entry
//! by skipping it rather than failing the batch (spec §9 open question).

use crate::error::{AuditError, Result};
use crate::record::{AuditMetrics, AuditRecord, AuditStatus};
use crate::traits::AuditQueue;
use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use tracing::warn;

const QUEUE_KEY: &str = "audit:queue";
const STATUS_KEY: &str = "audit:status";
const DATA_KEY: &str = "audit:data";

pub struct RedisAuditQueue {
    pool: Pool,
}

impl RedisAuditQueue {
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection> {
        self.pool.get().await.map_err(|e| AuditError::Storage(format!("redis pool: {e}")))
    }
}

#[async_trait]
impl AuditQueue for RedisAuditQueue {
    async fn add(&self, record: AuditRecord) -> Result<bool> {
        let mut conn = self.connection().await?;
        let exists: bool = conn
            .hexists(STATUS_KEY, &record.memory_id)
            .await
            .map_err(|e| AuditError::Storage(format!("redis HEXISTS: {e}")))?;
        if exists {
            return Ok(false);
        }

        let payload = serde_json::to_string(&record)
            .map_err(|e| AuditError::DataParsing(format!("serializing audit record: {e}")))?;

        let mut pipe = redis::pipe();
        pipe.lpush(QUEUE_KEY, &record.memory_id)
            .hset(STATUS_KEY, &record.memory_id, record.status.as_str())
            .hset(DATA_KEY, &record.memory_id, payload);
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| AuditError::Storage(format!("redis pipeline: {e}")))?;
        Ok(true)
    }

    async fn get_pending(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let ids: Vec<String> = conn
            .lrange(QUEUE_KEY, 0, limit as isize - 1)
            .await
            .map_err(|e| AuditError::Storage(format!("redis LRANGE: {e}")))?;

        let mut pending = Vec::new();
        for id in ids {
            let status: Option<String> = conn
                .hget(STATUS_KEY, &id)
                .await
                .map_err(|e| AuditError::Storage(format!("redis HGET status: {e}")))?;
            if status.as_deref() != Some(AuditStatus::Pending.as_str()) {
                continue;
            }
            let Some(data): Option<String> = conn
                .hget(DATA_KEY, &id)
                .await
                .map_err(|e| AuditError::Storage(format!("redis HGET data: {e}")))?
            else {
                warn!(memory_id = %id, "pending status with no data, skipping");
                continue;
            };
            match serde_json::from_str::<AuditRecord>(&data) {
                Ok(record) => pending.push(record),
                Err(err) => warn!(memory_id = %id, error = %err, "malformed audit data, skipping"),
            }
        }
        Ok(pending)
    }

    async fn update_status(&self, memory_id: &str, status: AuditStatus) -> Result<bool> {
        if matches!(status, AuditStatus::Pending) {
            return Err(AuditError::Validation("new status must be approved or rejected".into()));
        }
        let mut conn = self.connection().await?;
        let exists: bool = conn
            .hexists(STATUS_KEY, memory_id)
            .await
            .map_err(|e| AuditError::Storage(format!("redis HEXISTS: {e}")))?;
        if !exists {
            return Ok(false);
        }

        let data: Option<String> = conn
            .hget(DATA_KEY, memory_id)
            .await
            .map_err(|e| AuditError::Storage(format!("redis HGET data: {e}")))?;

        let mut pipe = redis::pipe();
        pipe.hset(STATUS_KEY, memory_id, status.as_str());
        if let Some(data) = data {
            match serde_json::from_str::<AuditRecord>(&data) {
                Ok(mut record) => {
                    record.status = status;
                    record.reviewed_at = Some(Utc::now());
                    if let Ok(payload) = serde_json::to_string(&record) {
                        pipe.hset(DATA_KEY, memory_id, payload);
                    }
                }
                Err(err) => warn!(memory_id, error = %err, "malformed audit data, status updated without timestamp"),
            }
        }
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| AuditError::Storage(format!("redis pipeline: {e}")))?;
        Ok(true)
    }

    async fn is_approved(&self, memory_id: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        let status: Option<String> = conn
            .hget(STATUS_KEY, memory_id)
            .await
            .map_err(|e| AuditError::Storage(format!("redis HGET: {e}")))?;
        Ok(status.as_deref() == Some(AuditStatus::Approved.as_str()))
    }

    async fn delete(&self, memory_id: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        let existed: bool = conn
            .hexists(STATUS_KEY, memory_id)
            .await
            .map_err(|e| AuditError::Storage(format!("redis HEXISTS: {e}")))?;

        let mut pipe = redis::pipe();
        pipe.lrem(QUEUE_KEY, 0, memory_id)
            .hdel(STATUS_KEY, memory_id)
            .hdel(DATA_KEY, memory_id);
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| AuditError::Storage(format!("redis pipeline: {e}")))?;
        Ok(existed)
    }

    async fn queue_length(&self) -> Result<usize> {
        let mut conn = self.connection().await?;
        let len: usize = conn.llen(QUEUE_KEY).await.map_err(|e| AuditError::Storage(format!("redis LLEN: {e}")))?;
        Ok(len)
    }

    async fn metrics(&self) -> Result<AuditMetrics> {
        let mut conn = self.connection().await?;
        let statuses: Vec<String> = conn
            .hvals(STATUS_KEY)
            .await
            .map_err(|e| AuditError::Storage(format!("redis HVALS: {e}")))?;
        let mut metrics = AuditMetrics { total: statuses.len() as u64, ..AuditMetrics::default() };
        for status in statuses {
            match status.as_str() {
                "pending" => metrics.pending += 1,
                "approved" => metrics.approved += 1,
                "rejected" => metrics.rejected += 1,
                _ => {}
            }
        }
        Ok(metrics)
    }

    async fn cleanup_processed(&self, days_old: u32) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days_old));
        let mut conn = self.connection().await?;
        let ids: Vec<String> = conn
            .hkeys(STATUS_KEY)
            .await
            .map_err(|e| AuditError::Storage(format!("redis HKEYS: {e}")))?;

        let mut cleaned = 0u64;
        for id in ids {
            let Some(data): Option<String> = conn
                .hget(DATA_KEY, &id)
                .await
                .map_err(|e| AuditError::Storage(format!("redis HGET: {e}")))?
            else {
                continue;
            };
            let Ok(record) = serde_json::from_str::<AuditRecord>(&data) else {
                continue;
            };
            let processed = matches!(record.status, AuditStatus::Approved | AuditStatus::Rejected);
            if processed && record.reviewed_at.is_some_and(|t| t < cutoff) {
                let mut pipe = redis::pipe();
                pipe.lrem(QUEUE_KEY, 0, &id).hdel(STATUS_KEY, &id).hdel(DATA_KEY, &id);
                pipe.query_async::<()>(&mut conn)
                    .await
                    .map_err(|e| AuditError::Storage(format!("redis pipeline: {e}")))?;
                cleaned += 1;
            }
        }
        Ok(cleaned)
    }
}
