//! In-memory `VectorStore` backend, used for tests and local development.

use crate::error::{Result, VectorStoreError};
use crate::quantize::{binary_quantize, candidate_pool_size, cosine_similarity, hamming_distance};
use crate::traits::{VectorQuery, VectorStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use resync_core::{Chunk, VectorHit};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Default)]
pub struct InMemoryVectorStore {
    // collection -> (document_id, ordinal) -> chunk
    rows: RwLock<HashMap<String, HashMap<String, Chunk>>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn metadata_matches(chunk: &Chunk, filters: &resync_core::MetadataFilter) -> bool {
        for (key, expected) in filters {
            let actual = match key.as_str() {
                "sha256" => Value::String(chunk.sha256.clone()),
                "doc_type" => Value::String(chunk.metadata.doc_type.clone()),
                "platform" => chunk
                    .metadata
                    .platform
                    .clone()
                    .map_or(Value::Null, Value::String),
                "environment" => chunk
                    .metadata
                    .environment
                    .clone()
                    .map_or(Value::Null, Value::String),
                "is_deprecated" => Value::Bool(chunk.metadata.is_deprecated),
                _ => continue,
            };
            if &actual != expected {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert_batch(&self, collection: &str, chunks: &[Chunk], dim: usize) -> Result<()> {
        for chunk in chunks {
            if chunk.embedding.len() != dim {
                return Err(VectorStoreError::Validation(format!(
                    "embedding dimension {} does not match collection dimension {dim}",
                    chunk.embedding.len()
                )));
            }
        }
        let mut rows = self.rows.write();
        let table = rows.entry(collection.to_string()).or_default();
        for chunk in chunks {
            table.insert(chunk.chunk_id.as_key(), chunk.clone());
        }
        Ok(())
    }

    async fn search(&self, collection: &str, query: &VectorQuery) -> Result<Vec<VectorHit>> {
        let rows = self.rows.read();
        let Some(table) = rows.get(collection) else {
            return Ok(Vec::new());
        };

        let query_bits = binary_quantize(&query.vector);
        let mut candidates: Vec<(&Chunk, u32)> = table
            .values()
            .filter(|c| Self::metadata_matches(c, &query.filters))
            .map(|c| (c, hamming_distance(&query_bits, &binary_quantize(&c.embedding))))
            .collect();
        candidates.sort_by_key(|(_, dist)| *dist);
        candidates.truncate(candidate_pool_size(query.k));

        let mut rescored: Vec<VectorHit> = candidates
            .into_iter()
            .map(|(chunk, _)| VectorHit {
                document_id: chunk.chunk_id.document_id.clone(),
                chunk_id: chunk.chunk_id.clone(),
                content: chunk.content.clone(),
                metadata: chunk.metadata.clone(),
                similarity: cosine_similarity(&query.vector, &chunk.embedding),
            })
            .collect();
        rescored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        rescored.truncate(query.k);
        Ok(rescored)
    }

    async fn exists_by_sha256(&self, collection: &str, sha256: &str) -> Result<bool> {
        let rows = self.rows.read();
        Ok(rows
            .get(collection)
            .is_some_and(|table| table.values().any(|c| c.sha256 == sha256)))
    }

    async fn delete_by_document_id(&self, collection: &str, document_id: &str) -> Result<()> {
        let mut rows = self.rows.write();
        if let Some(table) = rows.get_mut(collection) {
            table.retain(|_, c| c.chunk_id.document_id != document_id);
        }
        Ok(())
    }

    async fn get_all_documents(&self, collection: &str, limit: usize) -> Result<Vec<Chunk>> {
        let rows = self.rows.read();
        Ok(rows
            .get(collection)
            .map(|table| table.values().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use resync_core::{ChunkId, ChunkMetadata, SourceTier};

    fn chunk(doc: &str, ord: u32, content: &str, vec: Vec<f32>) -> Chunk {
        Chunk::new(
            ChunkId::new(doc, ord),
            content.to_string(),
            vec,
            ChunkMetadata {
                last_updated: Utc::now(),
                ..ChunkMetadata::new("doc", SourceTier::Official, 1)
            },
        )
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_sha256() {
        let store = InMemoryVectorStore::new();
        let c1 = chunk("d1", 0, "hello world", vec![1.0, 0.0, 0.0]);
        store.upsert_batch("col", &[c1.clone()], 3).await.unwrap();
        store.upsert_batch("col", &[c1.clone()], 3).await.unwrap();
        let all = store.get_all_documents("col", 100).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(store.exists_by_sha256("col", &c1.sha256).await.unwrap());
    }

    #[tokio::test]
    async fn wrong_dimension_is_a_validation_error() {
        let store = InMemoryVectorStore::new();
        let c1 = chunk("d1", 0, "x", vec![1.0, 0.0]);
        let err = store.upsert_batch("col", &[c1], 3).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Validation(_)));
    }

    #[tokio::test]
    async fn search_returns_nearest_by_cosine() {
        let store = InMemoryVectorStore::new();
        let near = chunk("d1", 0, "near", vec![1.0, 0.0, 0.0]);
        let far = chunk("d1", 1, "far", vec![0.0, 1.0, 0.0]);
        store.upsert_batch("col", &[near.clone(), far], 3).await.unwrap();

        let query = VectorQuery::new(vec![1.0, 0.0, 0.0], 1);
        let hits = store.search("col", &query).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "near");
    }

    #[tokio::test]
    async fn reindex_deletes_then_reinserts_atomically() {
        let store = InMemoryVectorStore::new();
        let c1 = chunk("d1", 0, "v1", vec![1.0, 0.0, 0.0]);
        store.upsert_batch("col", &[c1], 3).await.unwrap();
        store.delete_by_document_id("col", "d1").await.unwrap();
        assert!(store.get_all_documents("col", 10).await.unwrap().is_empty());

        let c2 = chunk("d1", 0, "v2", vec![0.0, 1.0, 0.0]);
        store.upsert_batch("col", &[c2], 3).await.unwrap();
        let all = store.get_all_documents("col", 10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "v2");
    }
}
