//! Shared domain types (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a chunk's content originated, used to weight trust during retrieval
/// and audit review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    Verified,
    Official,
    Curated,
    Community,
    Generated,
}

/// Structured metadata carried alongside every chunk's content (spec §3,
/// §9 "no map-of-any" design note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub doc_type: String,
    pub source_tier: SourceTier,
    /// 1 (most authoritative) .. 5 (least).
    pub authority_tier: u8,
    #[serde(default)]
    pub is_deprecated: bool,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub chunk_type: Option<String>,
    #[serde(default)]
    pub section_path: Vec<String>,
    #[serde(default)]
    pub parent_headers: Vec<String>,
    #[serde(default)]
    pub error_codes: Vec<String>,
    #[serde(default)]
    pub job_names: Vec<String>,
    /// Workstation names mentioned in the chunk, used for BM25 field
    /// boosting (spec §4.2). Not enumerated in the distilled data model but
    /// required by the field-boost weights it specifies.
    #[serde(default)]
    pub workstations: Vec<String>,
    #[serde(default)]
    pub token_count: usize,
}

impl ChunkMetadata {
    #[must_use]
    pub fn new(doc_type: impl Into<String>, source_tier: SourceTier, authority_tier: u8) -> Self {
        Self {
            doc_type: doc_type.into(),
            source_tier,
            authority_tier,
            is_deprecated: false,
            last_updated: Utc::now(),
            platform: None,
            environment: None,
            chunk_type: None,
            section_path: Vec::new(),
            parent_headers: Vec::new(),
            error_codes: Vec::new(),
            job_names: Vec::new(),
            workstations: Vec::new(),
            token_count: 0,
        }
    }
}

/// Identifies a chunk within a document: `(document_id, ordinal)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    pub document_id: String,
    pub ordinal: u32,
}

impl ChunkId {
    #[must_use]
    pub fn new(document_id: impl Into<String>, ordinal: u32) -> Self {
        Self {
            document_id: document_id.into(),
            ordinal,
        }
    }

    #[must_use]
    pub fn as_key(&self) -> String {
        format!("{}::{}", self.document_id, self.ordinal)
    }
}

/// A unit of retrieval: text, its embedding, and structured metadata.
///
/// Invariants (spec §3): `sha256` uniquely identifies `content`; inserting
/// a chunk whose `sha256` already exists in the collection is a no-op;
/// `embedding.len()` always equals the collection's configured dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub content: String,
    pub embedding: Vec<f32>,
    pub sha256: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    #[must_use]
    pub fn new(
        chunk_id: ChunkId,
        content: String,
        embedding: Vec<f32>,
        metadata: ChunkMetadata,
    ) -> Self {
        let sha256 = sha256_hex(&content);
        Self {
            chunk_id,
            content,
            embedding,
            sha256,
            metadata,
        }
    }
}

/// Compute the content hash used for idempotent ingestion (spec §4.7 step 1).
/// Normalizes whitespace before hashing so trivial formatting changes don't
/// defeat deduplication.
#[must_use]
pub fn sha256_hex(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let normalized: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A logical group of chunks sharing a `document_id` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub tenant: String,
    pub source: String,
    pub ingested_at: DateTime<Utc>,
}

/// A chunk retrieved from the vector store, with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    pub document_id: String,
    pub chunk_id: ChunkId,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub similarity: f32,
}

/// Exact-equality filters applied to chunk metadata (or `sha256`) during the
/// candidate phase of vector search.
pub type MetadataFilter = HashMap<String, serde_json::Value>;

/// Entity-resolution key for jobs (spec §3): two jobs with the same name in
/// different folders are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub folder_path: String,
    pub name: String,
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.folder_path, self.name)
    }
}
