//! Idempotent ingestion pipeline: dedup by content hash, batch embed,
//! upsert, and atomic-by-document reindex (spec §4.7).

use crate::chunker::RawChunk;
use crate::error::Result;
use crate::metrics::IngestMetrics;
use resync_core::{sha256_hex, Chunk, ChunkId, EmbeddingProvider};
use resync_vector::VectorStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

const DEFAULT_BATCH_SIZE: usize = 128;

pub struct IngestorConfig {
    pub read_collection: String,
    pub write_collection: String,
    pub embed_dim: usize,
    pub batch_size: usize,
}

impl IngestorConfig {
    #[must_use]
    pub fn new(read_collection: impl Into<String>, write_collection: impl Into<String>, embed_dim: usize) -> Self {
        Self {
            read_collection: read_collection.into(),
            write_collection: write_collection.into(),
            embed_dim,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

pub struct Ingestor {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: IngestorConfig,
    metrics: IngestMetrics,
}

impl Ingestor {
    #[must_use]
    pub fn new(vector_store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>, config: IngestorConfig) -> Self {
        Self {
            vector_store,
            embedder,
            config,
            metrics: IngestMetrics::new(),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &IngestMetrics {
        &self.metrics
    }

    /// Ingest `document_id`'s chunks: dedup by sha256 against the read
    /// collection, batch-embed the rest, upsert into the write collection.
    /// Returns the number of chunks actually written (post-dedup).
    ///
    /// # Errors
    /// Propagates embedding or vector-store failures.
    pub async fn ingest(&self, document_id: &str, chunks: Vec<RawChunk>) -> Result<usize> {
        let mut pending = Vec::with_capacity(chunks.len());
        for raw in chunks {
            let sha256 = sha256_hex(&raw.content);
            if self
                .vector_store
                .exists_by_sha256(&self.config.read_collection, &sha256)
                .await?
            {
                self.metrics.record_dedup_hit();
                continue;
            }
            pending.push((raw, sha256));
        }

        let mut written = 0usize;
        for batch in pending.chunks(self.config.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|(raw, _)| raw.contextualized_content.clone()).collect();
            let bytes: u64 = texts.iter().map(|t| t.len() as u64).sum();

            let start = Instant::now();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            self.metrics.record_embed(bytes, start.elapsed());

            let mut to_upsert = Vec::with_capacity(batch.len());
            for ((raw, sha256), embedding) in batch.iter().zip(embeddings) {
                if embedding.len() != self.config.embed_dim {
                    warn!(
                        document_id,
                        ordinal = raw.ordinal,
                        expected = self.config.embed_dim,
                        got = embedding.len(),
                        "embedding dimension mismatch, skipping chunk"
                    );
                    continue;
                }
                let mut chunk = Chunk::new(
                    ChunkId::new(document_id, raw.ordinal),
                    raw.content.clone(),
                    embedding,
                    raw.metadata.clone(),
                );
                chunk.sha256 = sha256.clone();
                to_upsert.push(chunk);
            }

            if to_upsert.is_empty() {
                continue;
            }
            let start = Instant::now();
            self.vector_store
                .upsert_batch(&self.config.write_collection, &to_upsert, self.config.embed_dim)
                .await?;
            self.metrics.record_upsert(to_upsert.len() as u64, start.elapsed());
            written += to_upsert.len();
        }

        Ok(written)
    }

    /// Atomic logical replacement: delete all of `document_id`'s chunks in
    /// the write collection, then ingest the new set. Serialize calls per
    /// document at the caller to honor the "never a mixture" guarantee
    /// (spec §4.7).
    ///
    /// # Errors
    /// Propagates delete or ingest failures.
    pub async fn reindex(&self, document_id: &str, chunks: Vec<RawChunk>) -> Result<usize> {
        self.vector_store
            .delete_by_document_id(&self.config.write_collection, document_id)
            .await?;
        self.ingest(document_id, chunks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{chunk_document, ChunkerConfig};
    use async_trait::async_trait;
    use resync_core::SourceTier;
    use resync_vector::InMemoryVectorStore;

    struct FakeEmbedder {
        dim: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        fn name(&self) -> &str {
            "fake"
        }
        fn dimensions(&self) -> usize {
            self.dim
        }
        async fn embed_batch(&self, texts: &[String]) -> resync_core::CoreResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1; self.dim]).collect())
        }
    }

    fn ingestor() -> Ingestor {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = Arc::new(FakeEmbedder { dim: 4 });
        Ingestor::new(store, embedder, IngestorConfig::new("col", "col", 4))
    }

    #[tokio::test]
    async fn reingesting_same_document_is_a_full_dedup() {
        let ingestor = ingestor();
        let text = "# Title\n\nFirst paragraph.\n\n## Sub\n\nSecond paragraph.\n";
        let chunks = chunk_document("Doc", text, "runbook", SourceTier::Official, 1, &ChunkerConfig::default());
        let expected = chunks.len();

        let first = ingestor.ingest("doc-1", chunks.clone()).await.unwrap();
        assert_eq!(first, expected);

        let second = ingestor.ingest("doc-1", chunks).await.unwrap();
        assert_eq!(second, 0);
        assert_eq!(ingestor.metrics().snapshot().dedup_hits as usize, expected);
    }

    #[tokio::test]
    async fn reindex_replaces_the_documents_chunks() {
        let ingestor = ingestor();
        let v1 = chunk_document("Doc", "# A\n\nold content here.\n", "runbook", SourceTier::Official, 1, &ChunkerConfig::default());
        ingestor.ingest("doc-1", v1).await.unwrap();

        let v2 = chunk_document("Doc", "# A\n\nbrand new content here.\n", "runbook", SourceTier::Official, 1, &ChunkerConfig::default());
        let written = ingestor.reindex("doc-1", v2).await.unwrap();
        assert_eq!(written, 1);
    }
}
