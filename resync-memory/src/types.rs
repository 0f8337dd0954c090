//! Shared long-term memory domain types (spec §3, §4.11).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Unverified,
    Confirmed,
    Rejected,
}

/// Header carried by every long-term memory entry, recording where it came
/// from and how reliable it is considered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryProvenance {
    pub source_session: String,
    pub extracted_at: DateTime<Utc>,
    pub extractor_model: String,
    pub source_turns: Vec<u32>,
    pub verification_status: VerificationStatus,
}

impl MemoryProvenance {
    #[must_use]
    pub fn new(source_session: impl Into<String>, extractor_model: impl Into<String>, source_turns: Vec<u32>) -> Self {
        Self {
            source_session: source_session.into(),
            extracted_at: Utc::now(),
            extractor_model: extractor_model.into(),
            source_turns,
            verification_status: VerificationStatus::Unverified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarativeCategory {
    Preference,
    Fact,
    Context,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProceduralCategory {
    Workflow,
    Habit,
    Rule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclarativeMemory {
    pub memory_id: String,
    pub user_id: String,
    pub category: DeclarativeCategory,
    pub content: String,
    pub confidence: f32,
    pub provenance: MemoryProvenance,
    /// Embedding of `content`, used by push retrieval's similarity search.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProceduralMemory {
    pub memory_id: String,
    pub user_id: String,
    pub category: ProceduralCategory,
    pub pattern: String,
    pub trigger: String,
    pub confidence: f32,
    pub provenance: MemoryProvenance,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Declarative,
    Procedural,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "memory_type", rename_all = "snake_case")]
pub enum LongTermMemoryEntry {
    Declarative(DeclarativeMemory),
    Procedural(ProceduralMemory),
}

impl LongTermMemoryEntry {
    #[must_use]
    pub fn memory_id(&self) -> &str {
        match self {
            Self::Declarative(d) => &d.memory_id,
            Self::Procedural(p) => &p.memory_id,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        match self {
            Self::Declarative(d) => &d.user_id,
            Self::Procedural(p) => &p.user_id,
        }
    }

    #[must_use]
    pub fn confidence(&self) -> f32 {
        match self {
            Self::Declarative(d) => d.confidence,
            Self::Procedural(p) => p.confidence,
        }
    }

    #[must_use]
    pub fn content_text(&self) -> &str {
        match self {
            Self::Declarative(d) => &d.content,
            Self::Procedural(p) => &p.pattern,
        }
    }

    #[must_use]
    pub fn provenance(&self) -> &MemoryProvenance {
        match self {
            Self::Declarative(d) => &d.provenance,
            Self::Procedural(p) => &p.provenance,
        }
    }

    #[must_use]
    pub fn embedding(&self) -> Option<&[f32]> {
        match self {
            Self::Declarative(d) => d.embedding.as_deref(),
            Self::Procedural(p) => p.embedding.as_deref(),
        }
    }

    pub fn set_verification(&mut self, status: VerificationStatus) {
        match self {
            Self::Declarative(d) => d.provenance.verification_status = status,
            Self::Procedural(p) => p.provenance.verification_status = status,
        }
    }
}

/// Explicit-query vs similarity-driven retrieval (spec §4.11).
#[derive(Debug, Clone)]
pub enum RetrievalMode {
    /// Explicit query by user_id/category/min_confidence, ranked by
    /// confidence.
    Pull { min_confidence: f32 },
    /// Embed the current turn and retrieve memories above a cosine
    /// similarity threshold.
    Push { query_embedding: Vec<f32>, similarity_threshold: f32 },
}
