//! Session-scoped short-term memory: turn contract, anaphora resolution,
//! and prompt context assembly (spec §4.10).

use crate::error::{MemoryError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use resync_core::entities::extract_entities;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Most-recent-first entity references, scanned from turn content (spec
/// §4.10 step 3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferencedEntities {
    pub jobs: Vec<String>,
    pub error_codes: Vec<String>,
    pub workstations: Vec<String>,
}

impl ReferencedEntities {
    fn merge_front(list: &mut Vec<String>, fresh: Vec<String>) {
        for entity in fresh.into_iter().rev() {
            list.retain(|e| e != &entity);
            list.insert(0, entity);
        }
    }

    fn merge(&mut self, text: &str) {
        let entities = extract_entities(text);
        Self::merge_front(&mut self.jobs, entities.jobs);
        Self::merge_front(&mut self.error_codes, entities.error_codes);
        Self::merge_front(&mut self.workstations, entities.workstations);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub turn_count: u32,
    pub referenced_entities: ReferencedEntities,
    pub last_active: DateTime<Utc>,
}

impl ConversationSession {
    fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            turn_count: 0,
            referenced_entities: ReferencedEntities::default(),
            last_active: Utc::now(),
        }
    }
}

/// `{get, put, delete, scan_expired}` backend capability (spec §4.10); the
/// in-memory and Redis implementations share this interface exactly.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<ConversationSession>>;
    async fn put(&self, session: &ConversationSession) -> Result<()>;
    async fn delete(&self, session_id: &str) -> Result<()>;
    /// Session ids whose `last_active` is older than `idle_ttl`.
    async fn scan_expired(&self, idle_ttl: Duration) -> Result<Vec<String>>;
}

pub struct InMemorySessionStore {
    sessions: parking_lot::Mutex<HashMap<String, ConversationSession>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self { sessions: parking_lot::Mutex::new(HashMap::new()) }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<ConversationSession>> {
        Ok(self.sessions.lock().get(session_id).cloned())
    }

    async fn put(&self, session: &ConversationSession) -> Result<()> {
        self.sessions.lock().insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.sessions.lock().remove(session_id);
        Ok(())
    }

    async fn scan_expired(&self, idle_ttl: Duration) -> Result<Vec<String>> {
        let cutoff = Utc::now() - chrono::Duration::from_std(idle_ttl).unwrap_or_default();
        Ok(self
            .sessions
            .lock()
            .values()
            .filter(|s| s.last_active < cutoff)
            .map(|s| s.session_id.clone())
            .collect())
    }
}

pub struct RedisSessionStore {
    pool: deadpool_redis::Pool,
    key_prefix: String,
}

impl RedisSessionStore {
    #[must_use]
    pub fn new(pool: deadpool_redis::Pool, key_prefix: impl Into<String>) -> Self {
        Self { pool, key_prefix: key_prefix.into() }
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}:{}", self.key_prefix, session_id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<ConversationSession>> {
        use redis::AsyncCommands;
        let mut conn = self.pool.get().await.map_err(|e| MemoryError::Storage(format!("redis pool: {e}")))?;
        let raw: Option<String> =
            conn.get(self.key(session_id)).await.map_err(|e| MemoryError::Storage(format!("redis GET: {e}")))?;
        match raw {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| MemoryError::DataParsing(format!("session JSON: {e}"))),
        }
    }

    async fn put(&self, session: &ConversationSession) -> Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.pool.get().await.map_err(|e| MemoryError::Storage(format!("redis pool: {e}")))?;
        let payload = serde_json::to_string(session)
            .map_err(|e| MemoryError::DataParsing(format!("serializing session: {e}")))?;
        conn.set::<_, _, ()>(self.key(&session.session_id), payload)
            .await
            .map_err(|e| MemoryError::Storage(format!("redis SET: {e}")))?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.pool.get().await.map_err(|e| MemoryError::Storage(format!("redis pool: {e}")))?;
        conn.del::<_, ()>(self.key(session_id)).await.map_err(|e| MemoryError::Storage(format!("redis DEL: {e}")))?;
        Ok(())
    }

    async fn scan_expired(&self, idle_ttl: Duration) -> Result<Vec<String>> {
        use redis::AsyncCommands;
        let mut conn = self.pool.get().await.map_err(|e| MemoryError::Storage(format!("redis pool: {e}")))?;
        let pattern = format!("{}:*", self.key_prefix);
        let keys: Vec<String> =
            conn.keys(&pattern).await.map_err(|e| MemoryError::Storage(format!("redis KEYS: {e}")))?;
        let cutoff = Utc::now() - chrono::Duration::from_std(idle_ttl).unwrap_or_default();

        let mut expired = Vec::new();
        for key in keys {
            let raw: Option<String> =
                conn.get(&key).await.map_err(|e| MemoryError::Storage(format!("redis GET: {e}")))?;
            if let Some(json) = raw {
                if let Ok(session) = serde_json::from_str::<ConversationSession>(&json) {
                    if session.last_active < cutoff {
                        expired.push(session.session_id);
                    }
                }
            }
        }
        Ok(expired)
    }
}

const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(3600);

/// Session-scoped memory atop a pluggable [`SessionStore`].
pub struct ConversationMemory {
    store: Arc<dyn SessionStore>,
    idle_ttl: Duration,
}

impl ConversationMemory {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store, idle_ttl: DEFAULT_IDLE_TTL }
    }

    #[must_use]
    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    /// Append a user/assistant turn, updating `turn_count`, `last_active`,
    /// and `referenced_entities`, then persist (spec §4.10 turn contract).
    /// Creates the session if `session_id` is `None`, returning the new id.
    ///
    /// # Errors
    /// Propagates the backend's read/write failure.
    pub async fn add_turn(
        &self,
        session_id: Option<&str>,
        user_msg: &str,
        assistant_msg: &str,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<ConversationSession> {
        let mut session = match session_id {
            Some(id) => self.store.get(id).await?.unwrap_or_else(|| ConversationSession::new(id)),
            None => ConversationSession::new(Uuid::new_v4().to_string()),
        };

        let metadata = metadata.unwrap_or_default();
        session.messages.push(Message { role: Role::User, content: user_msg.to_string(), timestamp: Utc::now(), metadata: metadata.clone() });
        session.messages.push(Message { role: Role::Assistant, content: assistant_msg.to_string(), timestamp: Utc::now(), metadata });
        session.turn_count += 1;
        session.last_active = Utc::now();
        session.referenced_entities.merge(user_msg);
        session.referenced_entities.merge(assistant_msg);

        self.store.put(&session).await?;
        Ok(session)
    }

    /// Rewrite pronouns/demonstratives in `new_message` by substituting the
    /// most recently referenced entity of compatible kind. Returns the
    /// message unchanged if no compatible entity exists (spec §4.10).
    #[must_use]
    pub fn resolve_reference(context: &ConversationSession, new_message: &str) -> String {
        resolve_reference_impl(&context.referenced_entities, new_message)
    }

    /// Last `max_messages` turns formatted as `User: ... / Assistant: ...`.
    pub async fn get_context_for_prompt(&self, session_id: &str, max_messages: usize) -> Result<String> {
        let Some(session) = self.store.get(session_id).await? else {
            return Ok(String::new());
        };
        let start = session.messages.len().saturating_sub(max_messages);
        Ok(session.messages[start..]
            .iter()
            .map(|m| {
                let speaker = match m.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                format!("{speaker}: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<ConversationSession>> {
        self.store.get(session_id).await
    }

    pub async fn clear(&self, session_id: &str) -> Result<()> {
        self.store.delete(session_id).await
    }

    /// Sessions idle past the configured TTL. Callers expire them via
    /// `clear`.
    pub async fn expired_sessions(&self) -> Result<Vec<String>> {
        self.store.scan_expired(self.idle_ttl).await
    }
}

const PRONOUNS_JOB: &[&str] = &["it", "this job", "that job", "the job"];
const PRONOUNS_WORKSTATION: &[&str] = &["there", "that workstation", "the workstation"];

fn resolve_reference_impl(entities: &ReferencedEntities, message: &str) -> String {
    let lower = message.to_lowercase();

    if let Some(job) = entities.jobs.first() {
        for pronoun in PRONOUNS_JOB {
            if let Some(pos) = lower.find(pronoun) {
                let mut rewritten = message.to_string();
                rewritten.replace_range(pos..pos + pronoun.len(), job);
                return rewritten;
            }
        }
    }
    if let Some(workstation) = entities.workstations.first() {
        for pronoun in PRONOUNS_WORKSTATION {
            if let Some(pos) = lower.find(pronoun) {
                let mut rewritten = message.to_string();
                rewritten.replace_range(pos..pos + pronoun.len(), workstation);
                return rewritten;
            }
        }
    }
    message.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn turn_count_matches_user_and_assistant_message_counts() {
        let memory = ConversationMemory::new(Arc::new(InMemorySessionStore::new()));
        let session = memory.add_turn(None, "show me AWSBH001", "here is the status", None).await.unwrap();
        let session = memory.add_turn(Some(&session.session_id), "restart it", "done", None).await.unwrap();
        assert_eq!(session.turn_count, 2);
        let user_count = session.messages.iter().filter(|m| m.role == Role::User).count();
        let assistant_count = session.messages.iter().filter(|m| m.role == Role::Assistant).count();
        assert_eq!(user_count, assistant_count);
        assert_eq!(session.turn_count as usize, user_count);
    }

    #[tokio::test]
    async fn restart_it_resolves_to_the_referenced_job() {
        let memory = ConversationMemory::new(Arc::new(InMemorySessionStore::new()));
        let session = memory.add_turn(None, "show me AWSBH001", "here is the status", None).await.unwrap();
        let rewritten = ConversationMemory::resolve_reference(&session, "restart it");
        assert_eq!(rewritten, "restart AWSBH001");
    }

    #[tokio::test]
    async fn message_with_no_compatible_entity_is_unchanged() {
        let session = ConversationSession::new("s1");
        let rewritten = ConversationMemory::resolve_reference(&session, "restart it");
        assert_eq!(rewritten, "restart it");
    }

    #[tokio::test]
    async fn clear_removes_the_session_immediately() {
        let memory = ConversationMemory::new(Arc::new(InMemorySessionStore::new()));
        let session = memory.add_turn(None, "hi", "hello", None).await.unwrap();
        memory.clear(&session.session_id).await.unwrap();
        assert!(memory.get(&session.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn context_for_prompt_formats_last_n_turns() {
        let memory = ConversationMemory::new(Arc::new(InMemorySessionStore::new()));
        let session = memory.add_turn(None, "hi", "hello", None).await.unwrap();
        let context = memory.get_context_for_prompt(&session.session_id, 2).await.unwrap();
        assert_eq!(context, "User: hi\nAssistant: hello");
    }
}
