//! Redis-backed implementation of [`DistributedLock`] (spec §4.8), grounded
//! in the `SET NX PX` + compare-and-delete Lua pattern: `redis::Script`
//! already does "invoke by SHA, fall back to `EVAL` on `NOSCRIPT`" for us.

use crate::error::{LockError, Result};
use crate::traits::{DistributedLock, LockHandle};
use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::{AsyncCommands, Script};
use tracing::warn;
use uuid::Uuid;

const RELEASE_SCRIPT: &str = r"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
";

pub struct RedisLock {
    pool: Pool,
    key_prefix: String,
    release_script: Script,
}

impl RedisLock {
    #[must_use]
    pub fn new(pool: Pool, key_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            key_prefix: key_prefix.into(),
            release_script: Script::new(RELEASE_SCRIPT),
        }
    }

    fn lock_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| LockError::Storage(format!("redis pool: {e}")))
    }
}

#[async_trait]
impl DistributedLock for RedisLock {
    async fn acquire(&self, key: &str, ttl_ms: u64) -> Result<LockHandle> {
        if key.is_empty() {
            return Err(LockError::Validation("lock key must not be empty".into()));
        }
        let lock_key = self.lock_key(key);
        let token = Uuid::new_v4().to_string();
        let mut conn = self.connection().await?;

        let set_result: Option<String> = redis::cmd("SET")
            .arg(&lock_key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Storage(format!("redis SET NX PX: {e}")))?;
        let acquired = set_result.is_some();

        if !acquired {
            return Err(LockError::Unavailable(format!("lock already held: {key}")));
        }

        Ok(LockHandle { key: lock_key, token })
    }

    async fn release(&self, handle: &LockHandle) -> Result<bool> {
        if handle.token.len() != 36 || handle.token.matches('-').count() != 4 {
            return Err(LockError::Validation("lock token is not a UUID".into()));
        }
        let mut conn = self.connection().await?;
        let result: i64 = self
            .release_script
            .key(&handle.key)
            .arg(&handle.token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockError::Storage(format!("release script: {e}")))?;
        Ok(result == 1)
    }

    async fn force_release(&self, key: &str) -> Result<bool> {
        let lock_key = self.lock_key(key);
        let mut conn = self.connection().await?;
        let deleted: i64 = conn
            .del(&lock_key)
            .await
            .map_err(|e| LockError::Storage(format!("redis DEL: {e}")))?;
        if deleted > 0 {
            warn!(lock_key, "force-released audit lock");
        }
        Ok(deleted > 0)
    }

    async fn cleanup_expired(&self, max_age_seconds: u64) -> Result<u64> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}:*", self.key_prefix);
        let keys: Vec<String> = conn
            .keys(&pattern)
            .await
            .map_err(|e| LockError::Storage(format!("redis KEYS: {e}")))?;

        let mut cleaned = 0u64;
        for key in keys {
            let ttl: i64 = conn
                .ttl(&key)
                .await
                .map_err(|e| LockError::Storage(format!("redis TTL: {e}")))?;
            if ttl <= max_age_seconds as i64 {
                let _: i64 = conn
                    .del(&key)
                    .await
                    .map_err(|e| LockError::Storage(format!("redis DEL: {e}")))?;
                cleaned += 1;
            }
        }
        Ok(cleaned)
    }
}
