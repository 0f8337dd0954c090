//! In-process lock for tests and single-node dev (spec §9 "swap
//! implementations at startup").

use crate::error::{LockError, Result};
use crate::traits::{DistributedLock, LockHandle};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

struct Held {
    token: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryLock {
    held: Mutex<HashMap<String, Held>>,
}

impl InMemoryLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributedLock for InMemoryLock {
    async fn acquire(&self, key: &str, ttl_ms: u64) -> Result<LockHandle> {
        if key.is_empty() {
            return Err(LockError::Validation("lock key must not be empty".into()));
        }
        let mut held = self.held.lock().unwrap();
        if let Some(existing) = held.get(key) {
            if existing.expires_at > Instant::now() {
                return Err(LockError::Unavailable(format!("lock already held: {key}")));
            }
        }
        let token = Uuid::new_v4().to_string();
        held.insert(
            key.to_string(),
            Held { token: token.clone(), expires_at: Instant::now() + Duration::from_millis(ttl_ms) },
        );
        Ok(LockHandle { key: key.to_string(), token })
    }

    async fn release(&self, handle: &LockHandle) -> Result<bool> {
        let mut held = self.held.lock().unwrap();
        match held.get(&handle.key) {
            Some(existing) if existing.token == handle.token => {
                held.remove(&handle.key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn force_release(&self, key: &str) -> Result<bool> {
        Ok(self.held.lock().unwrap().remove(key).is_some())
    }

    async fn cleanup_expired(&self, max_age_seconds: u64) -> Result<u64> {
        let mut held = self.held.lock().unwrap();
        let threshold = Duration::from_secs(max_age_seconds);
        let before = held.len();
        held.retain(|_, h| h.expires_at.saturating_duration_since(Instant::now()) > threshold);
        Ok((before - held.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_one_of_five_racing_acquirers_succeeds() {
        let lock = InMemoryLock::new();
        let mut successes = 0;
        for _ in 0..5 {
            if lock.acquire("memory:X", 30_000).await.is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn release_with_wrong_token_returns_false_without_side_effects() {
        let lock = InMemoryLock::new();
        let handle = lock.acquire("k", 30_000).await.unwrap();
        let forged = LockHandle { key: handle.key.clone(), token: Uuid::new_v4().to_string() };
        assert!(!lock.release(&forged).await.unwrap());
        assert!(lock.release(&handle).await.unwrap());
    }

    #[tokio::test]
    async fn acquire_on_empty_key_is_a_validation_error() {
        let lock = InMemoryLock::new();
        assert!(matches!(lock.acquire("", 1000).await, Err(LockError::Validation(_))));
    }

    #[tokio::test]
    async fn release_then_reacquire_then_release_leaves_no_lock() {
        let lock = InMemoryLock::new();
        let h1 = lock.acquire("k", 30_000).await.unwrap();
        lock.release(&h1).await.unwrap();
        let h2 = lock.acquire("k", 30_000).await.unwrap();
        assert!(lock.release(&h2).await.unwrap());
    }
}
