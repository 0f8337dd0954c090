//! ABOUTME: Session-scoped conversation memory and LLM-extracted long-term memory
//! ABOUTME: Anaphora resolution plus declarative/procedural memory lifecycle (spec §4.10, §4.11)

pub mod conversation;
pub mod error;
pub mod long_term;
pub mod types;

pub use conversation::{
    ConversationMemory, ConversationSession, InMemorySessionStore, Message, RedisSessionStore, ReferencedEntities,
    Role, SessionStore,
};
pub use error::{MemoryError, Result};
pub use long_term::{
    ExtractionCandidate, InMemoryLongTermStore, LongTermMemoryManager, LongTermMemoryStore, MemoryExtractor,
    RedisLongTermStore,
};
pub use types::{
    DeclarativeCategory, DeclarativeMemory, LongTermMemoryEntry, MemoryProvenance, MemoryType, ProceduralCategory,
    ProceduralMemory, RetrievalMode, VerificationStatus,
};
