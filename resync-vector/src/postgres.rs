//! PostgreSQL + pgvector backend (spec §4.1, §6).
//!
//! Primary table: `document_embeddings(collection, document_id, chunk_id,
//! content, embedding vector(D), embedding_half halfvec(D), metadata jsonb,
//! sha256, created_at, updated_at)`, primary key `(collection, document_id,
//! chunk_id)`, unique index on `sha256`, HNSW index on
//! `binary_quantize(embedding_half)`. An on-insert trigger populates
//! `embedding_half` from `embedding`, so this backend never writes it
//! directly.

use crate::error::{Result, VectorStoreError};
use crate::quantize::candidate_pool_size;
use crate::traits::{VectorQuery, VectorStore};
use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use resync_core::{Chunk, ChunkId, ChunkMetadata, StorageError};
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;

/// Columns bound per row in the batch upsert's `VALUES` list.
const UPSERT_COLUMNS: usize = 8;

/// Connection settings for the Postgres-backed vector store.
#[derive(Debug, Clone)]
pub struct PostgresVectorConfig {
    pub database_url: String,
    pub pool_min_size: usize,
    pub pool_max_size: usize,
}

pub struct PostgresVectorStore {
    pool: Pool,
}

impl PostgresVectorStore {
    /// # Errors
    /// Returns [`VectorStoreError::Storage`] if the pool cannot be built.
    pub fn connect(cfg: &PostgresVectorConfig) -> Result<Self> {
        let mut pool_cfg = PoolConfig::new();
        pool_cfg.url = Some(cfg.database_url.clone());
        pool_cfg.pool = Some(deadpool_postgres::PoolConfig::new(cfg.pool_max_size));
        let pool = pool_cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| VectorStoreError::Storage(StorageError::Connection(e.to_string())))?;
        Ok(Self { pool })
    }

    async fn client(&self) -> Result<deadpool_postgres::Client> {
        self.pool
            .get()
            .await
            .map_err(|e| VectorStoreError::Storage(StorageError::PoolExhausted(e.to_string())))
    }
}

#[async_trait]
impl VectorStore for PostgresVectorStore {
    async fn upsert_batch(&self, collection: &str, chunks: &[Chunk], dim: usize) -> Result<()> {
        for chunk in chunks {
            if chunk.embedding.len() != dim {
                return Err(VectorStoreError::Validation(format!(
                    "embedding dimension {} does not match collection dimension {dim}",
                    chunk.embedding.len()
                )));
            }
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let mut client = self.client().await?;
        let txn = client
            .transaction()
            .await
            .map_err(|e| VectorStoreError::Storage(StorageError::Query(e.to_string())))?;

        // Batches go in as a single multi-row INSERT rather than N round
        // trips: one VALUES list with 8 placeholders per row.
        let now = Utc::now();
        let mut value_rows = Vec::with_capacity(chunks.len());
        let mut params: Vec<Box<dyn ToSql + Sync + Send>> = Vec::with_capacity(chunks.len() * UPSERT_COLUMNS);
        for (i, chunk) in chunks.iter().enumerate() {
            let metadata_json = serde_json::to_value(&chunk.metadata)
                .map_err(|e| VectorStoreError::Validation(e.to_string()))?;
            let embedding = pgvector::Vector::from(chunk.embedding.clone());
            let base = i * UPSERT_COLUMNS;
            value_rows.push(format!(
                "(${}, ${}, ${}, ${}, ${}, ${}, ${}, ${})",
                base + 1,
                base + 2,
                base + 3,
                base + 4,
                base + 5,
                base + 6,
                base + 7,
                base + 8
            ));
            params.push(Box::new(collection.to_string()));
            params.push(Box::new(chunk.chunk_id.document_id.clone()));
            params.push(Box::new(i64::from(chunk.chunk_id.ordinal)));
            params.push(Box::new(chunk.content.clone()));
            params.push(Box::new(embedding));
            params.push(Box::new(metadata_json));
            params.push(Box::new(chunk.sha256.clone()));
            params.push(Box::new(now));
        }

        let query = format!(
            "INSERT INTO document_embeddings
                (collection, document_id, chunk_id, content, embedding, metadata, sha256, updated_at)
             VALUES {}
             ON CONFLICT (collection, document_id, chunk_id)
             DO UPDATE SET
                content = EXCLUDED.content,
                embedding = EXCLUDED.embedding,
                metadata = EXCLUDED.metadata,
                sha256 = EXCLUDED.sha256,
                updated_at = EXCLUDED.updated_at",
            value_rows.join(", ")
        );

        let param_refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)).collect();
        txn.execute(&query, &param_refs)
            .await
            .map_err(|e| VectorStoreError::Storage(StorageError::Query(e.to_string())))?;

        txn.commit()
            .await
            .map_err(|e| VectorStoreError::Storage(StorageError::Query(e.to_string())))?;
        Ok(())
    }

    async fn search(&self, collection: &str, query: &VectorQuery) -> Result<Vec<resync_core::VectorHit>> {
        let client = self.client().await?;
        let embedding = pgvector::Vector::from(query.vector.clone());
        let pool_size = i64::try_from(candidate_pool_size(query.k)).unwrap_or(i64::MAX);
        let k = i64::try_from(query.k).unwrap_or(i64::MAX);

        // Phase 1 (candidate): order by Hamming distance on the binary
        // quantization of embedding_half, limited to the candidate pool.
        // Phase 2 (rescore): true cosine distance on embedding_half for
        // those candidates, re-sorted and truncated to k. Expressed as a
        // single CTE so the candidate index does the heavy lifting.
        let rows = client
            .query(
                "WITH candidates AS (
                    SELECT document_id, chunk_id, content, metadata, sha256, embedding_half
                    FROM document_embeddings
                    WHERE collection = $1
                    ORDER BY binary_quantize(embedding_half) <~> binary_quantize($2::halfvec)
                    LIMIT $3
                )
                SELECT document_id, chunk_id, content, metadata,
                       1 - (embedding_half <=> $2::halfvec) AS similarity
                FROM candidates
                ORDER BY similarity DESC
                LIMIT $4",
                &[&collection, &embedding, &pool_size, &k],
            )
            .await
            .map_err(|e| VectorStoreError::Storage(StorageError::Query(e.to_string())))?;

        rows.into_iter()
            .map(|row| {
                let document_id: String = row.get("document_id");
                let ordinal: i64 = row.get("chunk_id");
                let metadata_json: serde_json::Value = row.get("metadata");
                let metadata: ChunkMetadata = serde_json::from_value(metadata_json)
                    .map_err(|e| VectorStoreError::Storage(StorageError::Query(e.to_string())))?;
                Ok(resync_core::VectorHit {
                    document_id: document_id.clone(),
                    chunk_id: ChunkId::new(document_id, u32::try_from(ordinal).unwrap_or(0)),
                    content: row.get("content"),
                    metadata,
                    similarity: row.get::<_, f64>("similarity") as f32,
                })
            })
            .collect()
    }

    async fn exists_by_sha256(&self, collection: &str, sha256: &str) -> Result<bool> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT 1 FROM document_embeddings WHERE collection = $1 AND sha256 = $2 LIMIT 1",
                &[&collection, &sha256],
            )
            .await
            .map_err(|e| VectorStoreError::Storage(StorageError::Query(e.to_string())))?;
        Ok(row.is_some())
    }

    async fn delete_by_document_id(&self, collection: &str, document_id: &str) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "DELETE FROM document_embeddings WHERE collection = $1 AND document_id = $2",
                &[&collection, &document_id],
            )
            .await
            .map_err(|e| VectorStoreError::Storage(StorageError::Query(e.to_string())))?;
        Ok(())
    }

    async fn get_all_documents(&self, collection: &str, limit: usize) -> Result<Vec<Chunk>> {
        let client = self.client().await?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = client
            .query(
                "SELECT document_id, chunk_id, content, embedding, metadata, sha256
                 FROM document_embeddings WHERE collection = $1 LIMIT $2",
                &[&collection, &limit],
            )
            .await
            .map_err(|e| VectorStoreError::Storage(StorageError::Query(e.to_string())))?;

        rows.into_iter()
            .map(|row| {
                let document_id: String = row.get("document_id");
                let ordinal: i64 = row.get("chunk_id");
                let metadata_json: serde_json::Value = row.get("metadata");
                let metadata: ChunkMetadata = serde_json::from_value(metadata_json)
                    .map_err(|e| VectorStoreError::Storage(StorageError::Query(e.to_string())))?;
                let embedding: pgvector::Vector = row.get("embedding");
                Ok(Chunk {
                    chunk_id: ChunkId::new(document_id.clone(), u32::try_from(ordinal).unwrap_or(0)),
                    content: row.get("content"),
                    embedding: embedding.to_vec(),
                    sha256: row.get("sha256"),
                    metadata,
                })
            })
            .collect()
    }
}
