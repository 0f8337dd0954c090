//! The `VectorStore` capability (spec §4.1).

use crate::error::Result;
use async_trait::async_trait;
use resync_core::{Chunk, MetadataFilter, VectorHit};

/// Query parameters for the two-phase search.
#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub k: usize,
    pub filters: MetadataFilter,
}

impl VectorQuery {
    #[must_use]
    pub fn new(vector: Vec<f32>, k: usize) -> Self {
        Self {
            vector,
            k,
            filters: MetadataFilter::new(),
        }
    }

    #[must_use]
    pub fn with_filters(mut self, filters: MetadataFilter) -> Self {
        self.filters = filters;
        self
    }
}

/// Persists chunk embeddings and performs approximate nearest-neighbor
/// search. A chunk row carries `(collection, document_id, chunk_id,
/// content, embedding, metadata, sha256)` (spec §4.1).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert a batch of chunks as a single multi-row statement. Conflict
    /// key is `(collection, document_id, chunk_id)`; on conflict, content,
    /// embedding, metadata, sha256 and `updated_at` are replaced.
    ///
    /// # Errors
    /// Returns [`crate::error::VectorStoreError::Validation`] if any chunk's
    /// embedding dimension doesn't match `dim`, or a storage error.
    async fn upsert_batch(&self, collection: &str, chunks: &[Chunk], dim: usize) -> Result<()>;

    /// Two-phase search (spec §4.1):
    /// 1. candidate phase — rank by Hamming distance on binary-quantized
    ///    embeddings, keep top `max(10k, 50)`, with metadata/sha256 filters
    ///    applied here.
    /// 2. rescore phase — true cosine similarity on half-precision vectors
    ///    for the candidates, sorted descending, return top `k`.
    async fn search(&self, collection: &str, query: &VectorQuery) -> Result<Vec<VectorHit>>;

    /// Short-circuits re-ingestion of unchanged chunks.
    async fn exists_by_sha256(&self, collection: &str, sha256: &str) -> Result<bool>;

    /// Delete all chunks for a document — the first half of atomic logical
    /// replacement on reindex (spec §4.7).
    async fn delete_by_document_id(&self, collection: &str, document_id: &str) -> Result<()>;

    /// Read back the whole corpus, used by the BM25 index builder (spec
    /// §4.2) to construct its inverted index.
    async fn get_all_documents(&self, collection: &str, limit: usize) -> Result<Vec<Chunk>>;
}
