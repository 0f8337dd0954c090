//! Cross-session memory extracted by an LLM at session end, with pull and
//! push retrieval modes (spec §4.11).

use crate::error::{MemoryError, Result};
use crate::types::{
    DeclarativeCategory, DeclarativeMemory, LongTermMemoryEntry, MemoryProvenance, ProceduralCategory,
    ProceduralMemory, RetrievalMode, VerificationStatus,
};
use async_trait::async_trait;
use resync_core::capabilities::{EmbeddingProvider, LlmProvider};
use resync_core::sha256_hex;
use resync_vector::cosine_similarity;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// `{put, get, list_for_user, delete, delete_all_for_user}` backend
/// capability, mirroring the dual-backend shape used throughout this repo.
#[async_trait]
pub trait LongTermMemoryStore: Send + Sync {
    async fn put(&self, entry: LongTermMemoryEntry) -> Result<()>;
    async fn get(&self, memory_id: &str) -> Result<Option<LongTermMemoryEntry>>;
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<LongTermMemoryEntry>>;
    async fn delete(&self, memory_id: &str) -> Result<bool>;
    async fn delete_all_for_user(&self, user_id: &str) -> Result<u64>;
    /// content-hash -> memory_id, for dedup on extraction.
    async fn find_by_content_hash(&self, user_id: &str, content_hash: &str) -> Result<Option<String>>;
}

pub struct InMemoryLongTermStore {
    entries: parking_lot::Mutex<HashMap<String, LongTermMemoryEntry>>,
    content_hashes: parking_lot::Mutex<HashMap<(String, String), String>>,
}

impl InMemoryLongTermStore {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: parking_lot::Mutex::new(HashMap::new()), content_hashes: parking_lot::Mutex::new(HashMap::new()) }
    }
}

impl Default for InMemoryLongTermStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LongTermMemoryStore for InMemoryLongTermStore {
    async fn put(&self, entry: LongTermMemoryEntry) -> Result<()> {
        let user_id = entry.user_id().to_string();
        let content_hash = sha256_hex(entry.content_text());
        let memory_id = entry.memory_id().to_string();
        self.content_hashes.lock().insert((user_id, content_hash), memory_id.clone());
        self.entries.lock().insert(memory_id, entry);
        Ok(())
    }

    async fn get(&self, memory_id: &str) -> Result<Option<LongTermMemoryEntry>> {
        Ok(self.entries.lock().get(memory_id).cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<LongTermMemoryEntry>> {
        Ok(self.entries.lock().values().filter(|e| e.user_id() == user_id).cloned().collect())
    }

    async fn delete(&self, memory_id: &str) -> Result<bool> {
        Ok(self.entries.lock().remove(memory_id).is_some())
    }

    async fn delete_all_for_user(&self, user_id: &str) -> Result<u64> {
        let mut entries = self.entries.lock();
        let to_remove: Vec<String> =
            entries.values().filter(|e| e.user_id() == user_id).map(|e| e.memory_id().to_string()).collect();
        for id in &to_remove {
            entries.remove(id);
        }
        self.content_hashes.lock().retain(|(uid, _), _| uid != user_id);
        Ok(to_remove.len() as u64)
    }

    async fn find_by_content_hash(&self, user_id: &str, content_hash: &str) -> Result<Option<String>> {
        Ok(self.content_hashes.lock().get(&(user_id.to_string(), content_hash.to_string())).cloned())
    }
}

pub struct RedisLongTermStore {
    pool: deadpool_redis::Pool,
    key_prefix: String,
}

impl RedisLongTermStore {
    #[must_use]
    pub fn new(pool: deadpool_redis::Pool, key_prefix: impl Into<String>) -> Self {
        Self { pool, key_prefix: key_prefix.into() }
    }

    fn entry_key(&self, memory_id: &str) -> String {
        format!("{}:entry:{}", self.key_prefix, memory_id)
    }

    fn user_index_key(&self, user_id: &str) -> String {
        format!("{}:user:{}", self.key_prefix, user_id)
    }

    fn hash_index_key(&self, user_id: &str) -> String {
        format!("{}:hash:{}", self.key_prefix, user_id)
    }
}

#[async_trait]
impl LongTermMemoryStore for RedisLongTermStore {
    async fn put(&self, entry: LongTermMemoryEntry) -> Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.pool.get().await.map_err(|e| MemoryError::Storage(format!("redis pool: {e}")))?;
        let payload =
            serde_json::to_string(&entry).map_err(|e| MemoryError::DataParsing(format!("serializing entry: {e}")))?;
        let user_id = entry.user_id().to_string();
        let memory_id = entry.memory_id().to_string();
        let content_hash = sha256_hex(entry.content_text());

        let _: () = redis::pipe()
            .set(self.entry_key(&memory_id), payload)
            .sadd(self.user_index_key(&user_id), &memory_id)
            .hset(self.hash_index_key(&user_id), content_hash, &memory_id)
            .query_async(&mut conn)
            .await
            .map_err(|e| MemoryError::Storage(format!("redis pipeline: {e}")))?;
        Ok(())
    }

    async fn get(&self, memory_id: &str) -> Result<Option<LongTermMemoryEntry>> {
        use redis::AsyncCommands;
        let mut conn = self.pool.get().await.map_err(|e| MemoryError::Storage(format!("redis pool: {e}")))?;
        let raw: Option<String> =
            conn.get(self.entry_key(memory_id)).await.map_err(|e| MemoryError::Storage(format!("redis GET: {e}")))?;
        match raw {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| MemoryError::DataParsing(format!("entry JSON: {e}"))),
        }
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<LongTermMemoryEntry>> {
        use redis::AsyncCommands;
        let mut conn = self.pool.get().await.map_err(|e| MemoryError::Storage(format!("redis pool: {e}")))?;
        let ids: Vec<String> = conn
            .smembers(self.user_index_key(user_id))
            .await
            .map_err(|e| MemoryError::Storage(format!("redis SMEMBERS: {e}")))?;

        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.get(&id).await? {
                entries.push(entry);
            } else {
                tracing::warn!(memory_id = %id, "user index referenced a missing entry, skipping");
            }
        }
        Ok(entries)
    }

    async fn delete(&self, memory_id: &str) -> Result<bool> {
        use redis::AsyncCommands;
        let Some(entry) = self.get(memory_id).await? else {
            return Ok(false);
        };
        let mut conn = self.pool.get().await.map_err(|e| MemoryError::Storage(format!("redis pool: {e}")))?;
        let content_hash = sha256_hex(entry.content_text());
        let _: () = redis::pipe()
            .del(self.entry_key(memory_id))
            .srem(self.user_index_key(entry.user_id()), memory_id)
            .hdel(self.hash_index_key(entry.user_id()), content_hash)
            .query_async(&mut conn)
            .await
            .map_err(|e| MemoryError::Storage(format!("redis pipeline: {e}")))?;
        Ok(true)
    }

    async fn delete_all_for_user(&self, user_id: &str) -> Result<u64> {
        use redis::AsyncCommands;
        let entries = self.list_for_user(user_id).await?;
        let count = entries.len() as u64;
        let mut conn = self.pool.get().await.map_err(|e| MemoryError::Storage(format!("redis pool: {e}")))?;
        let mut pipe = redis::pipe();
        for entry in &entries {
            pipe.del(self.entry_key(entry.memory_id()));
        }
        pipe.del(self.user_index_key(user_id));
        pipe.del(self.hash_index_key(user_id));
        let _: () =
            pipe.query_async(&mut conn).await.map_err(|e| MemoryError::Storage(format!("redis pipeline: {e}")))?;
        Ok(count)
    }

    async fn find_by_content_hash(&self, user_id: &str, content_hash: &str) -> Result<Option<String>> {
        use redis::AsyncCommands;
        let mut conn = self.pool.get().await.map_err(|e| MemoryError::Storage(format!("redis pool: {e}")))?;
        conn.hget(self.hash_index_key(user_id), content_hash)
            .await
            .map_err(|e| MemoryError::Storage(format!("redis HGET: {e}")))
    }
}

/// What the LLM is asked to return at session end; the extractor validates
/// each item before it becomes a stored memory.
#[derive(Debug, Deserialize)]
pub struct ExtractionCandidate {
    pub memory_type: String,
    pub category: String,
    pub content: String,
    pub trigger: Option<String>,
    pub confidence: f32,
}

pub struct MemoryExtractor {
    llm: Arc<dyn LlmProvider>,
}

impl MemoryExtractor {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Ask the LLM to extract candidate long-term memories from a
    /// transcript, dropping anything that fails schema validation.
    pub async fn extract(
        &self,
        user_id: &str,
        session_id: &str,
        transcript: &str,
    ) -> Result<Vec<LongTermMemoryEntry>> {
        let prompt = format!(
            "Extract durable facts, preferences, and behavioral patterns worth \
             remembering about this user from the conversation below. Respond as a \
             JSON array of objects with fields memory_type (declarative|procedural), \
             category, content, trigger (procedural only), confidence (0.0-1.0).\n\n{transcript}"
        );
        let params = resync_core::capabilities::CompletionParams::default();
        let raw = self.llm.complete(&prompt, &params).await?;

        let candidates: Vec<ExtractionCandidate> = serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "extractor LLM returned unparseable JSON, extracting nothing");
            Vec::new()
        });

        let mut entries = Vec::new();
        for candidate in candidates {
            match validate_candidate(candidate, user_id, session_id) {
                Ok(entry) => entries.push(entry),
                Err(reason) => tracing::warn!(%reason, "dropping invalid extraction candidate"),
            }
        }
        Ok(entries)
    }
}

fn validate_candidate(candidate: ExtractionCandidate, user_id: &str, session_id: &str) -> std::result::Result<LongTermMemoryEntry, String> {
    if !(0.0..=1.0).contains(&candidate.confidence) {
        return Err(format!("confidence {} out of range", candidate.confidence));
    }
    if candidate.content.trim().is_empty() {
        return Err("empty content".to_string());
    }
    let provenance = MemoryProvenance::new(session_id, "extractor", Vec::new());

    match candidate.memory_type.as_str() {
        "declarative" => {
            let category = match candidate.category.as_str() {
                "preference" => DeclarativeCategory::Preference,
                "fact" => DeclarativeCategory::Fact,
                "context" => DeclarativeCategory::Context,
                other => return Err(format!("unknown declarative category {other}")),
            };
            Ok(LongTermMemoryEntry::Declarative(DeclarativeMemory {
                memory_id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                category,
                content: candidate.content,
                confidence: candidate.confidence,
                provenance,
                embedding: None,
            }))
        }
        "procedural" => {
            let category = match candidate.category.as_str() {
                "workflow" => ProceduralCategory::Workflow,
                "habit" => ProceduralCategory::Habit,
                "rule" => ProceduralCategory::Rule,
                other => return Err(format!("unknown procedural category {other}")),
            };
            let trigger = candidate.trigger.ok_or_else(|| "procedural memory missing trigger".to_string())?;
            Ok(LongTermMemoryEntry::Procedural(ProceduralMemory {
                memory_id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                category,
                pattern: candidate.content,
                trigger,
                confidence: candidate.confidence,
                provenance,
                embedding: None,
            }))
        }
        other => Err(format!("unknown memory_type {other}")),
    }
}

/// Orchestrates extraction, storage with content-hash dedup, retrieval,
/// verification, and per-user deletion (spec §4.11).
pub struct LongTermMemoryManager {
    store: Arc<dyn LongTermMemoryStore>,
    extractor: MemoryExtractor,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl LongTermMemoryManager {
    #[must_use]
    pub fn new(store: Arc<dyn LongTermMemoryStore>, extractor: MemoryExtractor, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, extractor, embedder }
    }

    /// Extract memories from a session transcript and persist the novel
    /// ones, skipping anything that dedups against an existing entry for
    /// this user.
    pub async fn extract_and_store(&self, user_id: &str, session_id: &str, transcript: &str) -> Result<usize> {
        let candidates = self.extractor.extract(user_id, session_id, transcript).await?;
        let mut stored = 0;
        for mut entry in candidates {
            let content_hash = sha256_hex(entry.content_text());
            if self.store.find_by_content_hash(user_id, &content_hash).await?.is_some() {
                continue;
            }
            let embedding = self.embedder.embed(entry.content_text()).await?;
            match &mut entry {
                LongTermMemoryEntry::Declarative(d) => d.embedding = Some(embedding),
                LongTermMemoryEntry::Procedural(p) => p.embedding = Some(embedding),
            }
            self.store.put(entry).await?;
            stored += 1;
        }
        Ok(stored)
    }

    /// Pull: explicit query by user, ranked by confidence descending.
    /// Push: similarity search against an embedded current turn.
    pub async fn retrieve(&self, user_id: &str, mode: RetrievalMode) -> Result<Vec<LongTermMemoryEntry>> {
        let all = self.store.list_for_user(user_id).await?;
        let confirmed_or_unverified: Vec<LongTermMemoryEntry> = all
            .into_iter()
            .filter(|e| e.provenance().verification_status != VerificationStatus::Rejected)
            .collect();

        match mode {
            RetrievalMode::Pull { min_confidence } => {
                let mut results: Vec<LongTermMemoryEntry> =
                    confirmed_or_unverified.into_iter().filter(|e| e.confidence() >= min_confidence).collect();
                results.sort_by(|a, b| b.confidence().partial_cmp(&a.confidence()).unwrap_or(std::cmp::Ordering::Equal));
                Ok(results)
            }
            RetrievalMode::Push { query_embedding, similarity_threshold } => {
                let mut scored: Vec<(f32, LongTermMemoryEntry)> = confirmed_or_unverified
                    .into_iter()
                    .filter_map(|e| {
                        let embedding = e.embedding()?;
                        let score = cosine_similarity(&query_embedding, embedding);
                        (score >= similarity_threshold).then_some((score, e))
                    })
                    .collect();
                scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
                Ok(scored.into_iter().map(|(_, e)| e).collect())
            }
        }
    }

    pub async fn confirm(&self, memory_id: &str) -> Result<bool> {
        self.set_verification(memory_id, VerificationStatus::Confirmed).await
    }

    pub async fn reject(&self, memory_id: &str) -> Result<bool> {
        self.set_verification(memory_id, VerificationStatus::Rejected).await
    }

    async fn set_verification(&self, memory_id: &str, status: VerificationStatus) -> Result<bool> {
        let Some(mut entry) = self.store.get(memory_id).await? else {
            return Ok(false);
        };
        entry.set_verification(status);
        self.store.put(entry).await?;
        Ok(true)
    }

    /// Delete every memory for a user, for privacy/compliance requests.
    pub async fn delete_user_memories(&self, user_id: &str) -> Result<u64> {
        self.store.delete_all_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resync_core::capabilities::CompletionParams;
    use resync_core::CoreResult;

    struct FakeEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        fn name(&self) -> &str {
            "fake"
        }
        fn dimensions(&self) -> usize {
            3
        }
        async fn embed_batch(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
        }
    }

    struct FakeLlm {
        response: String,
    }

    #[async_trait]
    impl LlmProvider for FakeLlm {
        fn name(&self) -> &str {
            "fake"
        }
        async fn complete(&self, _prompt: &str, _params: &CompletionParams) -> CoreResult<String> {
            Ok(self.response.clone())
        }
    }

    fn manager(response: &str) -> LongTermMemoryManager {
        let store: Arc<dyn LongTermMemoryStore> = Arc::new(InMemoryLongTermStore::new());
        let extractor = MemoryExtractor::new(Arc::new(FakeLlm { response: response.to_string() }));
        LongTermMemoryManager::new(store, extractor, Arc::new(FakeEmbedder))
    }

    #[tokio::test]
    async fn extracting_twice_from_identical_content_dedups_the_second_time() {
        let mgr = manager(
            r#"[{"memory_type":"declarative","category":"preference","content":"prefers dark mode","confidence":0.9}]"#,
        );
        let first = mgr.extract_and_store("u1", "s1", "transcript").await.unwrap();
        let second = mgr.extract_and_store("u1", "s2", "transcript").await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn invalid_confidence_is_dropped_not_stored() {
        let mgr = manager(
            r#"[{"memory_type":"declarative","category":"fact","content":"x","confidence":5.0}]"#,
        );
        let stored = mgr.extract_and_store("u1", "s1", "t").await.unwrap();
        assert_eq!(stored, 0);
    }

    #[tokio::test]
    async fn rejected_memory_is_excluded_from_pull_retrieval() {
        let mgr = manager(
            r#"[{"memory_type":"declarative","category":"fact","content":"likes tea","confidence":0.8}]"#,
        );
        mgr.extract_and_store("u1", "s1", "t").await.unwrap();
        let all = mgr.retrieve("u1", RetrievalMode::Pull { min_confidence: 0.0 }).await.unwrap();
        assert_eq!(all.len(), 1);
        mgr.reject(all[0].memory_id()).await.unwrap();
        let after = mgr.retrieve("u1", RetrievalMode::Pull { min_confidence: 0.0 }).await.unwrap();
        assert!(after.is_empty());
    }

    #[tokio::test]
    async fn delete_user_memories_removes_everything_for_that_user() {
        let mgr = manager(
            r#"[{"memory_type":"declarative","category":"fact","content":"likes tea","confidence":0.8}]"#,
        );
        mgr.extract_and_store("u1", "s1", "t").await.unwrap();
        let deleted = mgr.delete_user_memories("u1").await.unwrap();
        assert_eq!(deleted, 1);
        let after = mgr.retrieve("u1", RetrievalMode::Pull { min_confidence: 0.0 }).await.unwrap();
        assert!(after.is_empty());
    }
}
