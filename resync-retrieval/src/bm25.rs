//! In-memory BM25 keyword index (spec §4.2).
//!
//! Single writer (rebuild), many readers; the previous index stays live
//! for in-flight readers until the new one swaps in atomically (spec §5).

use crate::tokenizer::tokenize;
use arc_swap::ArcSwap;
use resync_core::Chunk;
use resync_vector::VectorStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

const K1: f32 = 1.5;
const B: f32 = 0.75;

const JOB_NAME_BOOST: f32 = 4.0;
const ERROR_CODE_BOOST: f32 = 3.5;
const WORKSTATION_BOOST: f32 = 3.0;

struct Posting {
    /// term -> (doc index, term frequency including field-boosted repeats)
    term_doc_freq: HashMap<String, f32>,
}

struct Document {
    chunk: Chunk,
    length: f32,
}

struct Index {
    documents: Vec<Document>,
    postings: Vec<Posting>,
    doc_freq: HashMap<String, usize>,
    avg_doc_length: f32,
}

impl Index {
    fn empty() -> Self {
        Self {
            documents: Vec::new(),
            postings: Vec::new(),
            doc_freq: HashMap::new(),
            avg_doc_length: 0.0,
        }
    }

    fn build(chunks: Vec<Chunk>) -> Self {
        if chunks.is_empty() {
            return Self::empty();
        }

        let mut documents = Vec::with_capacity(chunks.len());
        let mut postings = Vec::with_capacity(chunks.len());
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut total_length = 0.0f32;

        for chunk in chunks {
            let mut term_counts: HashMap<String, f32> = HashMap::new();
            for token in tokenize(&chunk.content) {
                *term_counts.entry(token).or_insert(0.0) += 1.0;
            }

            for job_name in &chunk.metadata.job_names {
                for token in tokenize(job_name) {
                    *term_counts.entry(token).or_insert(0.0) += JOB_NAME_BOOST;
                }
            }
            for error_code in &chunk.metadata.error_codes {
                for token in tokenize(error_code) {
                    *term_counts.entry(token).or_insert(0.0) += ERROR_CODE_BOOST;
                }
            }
            for workstation in &chunk.metadata.workstations {
                for token in tokenize(workstation) {
                    *term_counts.entry(token).or_insert(0.0) += WORKSTATION_BOOST;
                }
            }

            let length: f32 = term_counts.values().sum();
            total_length += length;

            for term in term_counts.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }

            documents.push(Document { chunk, length });
            postings.push(Posting { term_doc_freq: term_counts });
        }

        let avg_doc_length = total_length / documents.len() as f32;

        Self {
            documents,
            postings,
            doc_freq,
            avg_doc_length,
        }
    }

    fn score(&self, query_terms: &[String]) -> Vec<(usize, f32)> {
        let n = self.documents.len() as f32;
        let mut scores: HashMap<usize, f32> = HashMap::new();

        for term in query_terms {
            let Some(&df) = self.doc_freq.get(term) else {
                continue;
            };
            let idf = ((n - df as f32 + 0.5) / (df as f32 + 0.5) + 1.0).ln();

            for (doc_idx, posting) in self.postings.iter().enumerate() {
                let Some(&tf) = posting.term_doc_freq.get(term) else {
                    continue;
                };
                let doc_len = self.documents[doc_idx].length;
                let denom = tf + K1 * (1.0 - B + B * doc_len / self.avg_doc_length.max(1.0));
                let term_score = idf * (tf * (K1 + 1.0)) / denom.max(1e-6);
                *scores.entry(doc_idx).or_insert(0.0) += term_score;
            }
        }

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        ranked
    }
}

/// In-memory keyword index, rebuilt from the vector store's corpus.
pub struct Bm25Index {
    vector_store: Arc<dyn VectorStore>,
    collection: String,
    inner: ArcSwap<Index>,
    build_lock: Mutex<()>,
}

impl Bm25Index {
    #[must_use]
    pub fn new(vector_store: Arc<dyn VectorStore>, collection: impl Into<String>) -> Self {
        Self {
            vector_store,
            collection: collection.into(),
            inner: ArcSwap::from_pointee(Index::empty()),
            build_lock: Mutex::new(()),
        }
    }

    /// Rebuild the index from the current corpus. Globally serialized;
    /// concurrent readers keep using the prior index until this swap
    /// completes (spec §5).
    ///
    /// # Errors
    /// Propagates the vector store's read failure.
    pub async fn rebuild(&self, limit: usize) -> resync_vector::Result<()> {
        let _guard = self.build_lock.lock().await;
        let chunks = self.vector_store.get_all_documents(&self.collection, limit).await?;
        self.inner.store(Arc::new(Index::build(chunks)));
        Ok(())
    }

    /// Returns `[(chunk_index, score)]` descending; an empty query returns
    /// empty. Triggers a build on first use if the index hasn't been built
    /// yet.
    ///
    /// # Errors
    /// Propagates the vector store's read failure if this is the first call.
    pub async fn search(&self, query: &str, limit: usize) -> resync_vector::Result<Vec<(usize, f32)>> {
        if self.inner.load().documents.is_empty() {
            self.rebuild(limit.max(10_000)).await?;
        }
        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let index = self.inner.load();
        let mut ranked = index.score(&terms);
        ranked.truncate(limit);
        Ok(ranked)
    }

    #[must_use]
    pub fn chunk_at(&self, index: usize) -> Option<Chunk> {
        self.inner.load().documents.get(index).map(|d| d.chunk.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.load().documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use resync_core::{ChunkId, ChunkMetadata, SourceTier};
    use resync_vector::InMemoryVectorStore;

    fn chunk(doc: &str, ord: u32, content: &str, job_names: Vec<String>) -> Chunk {
        Chunk::new(
            ChunkId::new(doc, ord),
            content.to_string(),
            vec![0.0; 3],
            ChunkMetadata {
                job_names,
                last_updated: Utc::now(),
                ..ChunkMetadata::new("runbook", SourceTier::Official, 1)
            },
        )
    }

    #[tokio::test]
    async fn exact_job_name_ranks_first() {
        let store = Arc::new(InMemoryVectorStore::new());
        store
            .upsert_batch(
                "col",
                &[
                    chunk("d1", 0, "Job AWSBH001 fails with RC=8", vec!["AWSBH001".into()]),
                    chunk("d2", 0, "general scheduling documentation", vec![]),
                ],
                3,
            )
            .await
            .unwrap();

        let bm25 = Bm25Index::new(store, "col");
        let results = bm25.search("AWSBH001", 10).await.unwrap();
        assert_eq!(results[0].0, 0);
        assert!(results[0].1 > 0.0);
    }

    #[tokio::test]
    async fn empty_query_returns_empty() {
        let store = Arc::new(InMemoryVectorStore::new());
        let bm25 = Bm25Index::new(store, "col");
        assert!(bm25.search("", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rc_variants_match_the_same_document() {
        let store = Arc::new(InMemoryVectorStore::new());
        store
            .upsert_batch("col", &[chunk("d1", 0, "ended abnormally RC=8", vec![])], 3)
            .await
            .unwrap();
        let bm25 = Bm25Index::new(store, "col");
        let a = bm25.search("rc 8", 10).await.unwrap();
        let b = bm25.search("RC8", 10).await.unwrap();
        assert_eq!(a.len(), b.len());
        assert!(!a.is_empty());
    }
}
