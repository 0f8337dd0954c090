//! `HybridRetriever`: fuses vector + BM25, classifies the query, calls the
//! gated reranker (spec §4.4).

use crate::bm25::Bm25Index;
use crate::classify::{QueryClass, QueryClassificationCache, RetrievalWeights};
use crate::error::Result;
use crate::reranker::{RerankCandidate, RerankGatingPolicy, Reranker};
use parking_lot::Mutex;
use resync_core::EmbeddingProvider;
use resync_vector::{VectorQuery, VectorStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct HybridConfig {
    pub defaults: RetrievalWeights,
    pub k_init_multiplier: usize,
    pub max_candidates: usize,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            defaults: RetrievalWeights { vector: 0.6, bm25: 0.4 },
            k_init_multiplier: 4,
            max_candidates: 10,
            cache_capacity: 1000,
            cache_ttl: Duration::from_secs(1800),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetrievalMetricsSnapshot {
    pub query_count: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_latency: Duration,
    pub total_results: u64,
}

impl RetrievalMetricsSnapshot {
    #[must_use]
    pub fn avg_latency_ms(&self) -> f64 {
        if self.query_count == 0 {
            0.0
        } else {
            self.total_latency.as_secs_f64() * 1000.0 / self.query_count as f64
        }
    }

    #[must_use]
    pub fn avg_results(&self) -> f64 {
        if self.query_count == 0 {
            0.0
        } else {
            self.total_results as f64 / self.query_count as f64
        }
    }

    #[must_use]
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

pub struct HybridRetriever {
    vector_store: Arc<dyn VectorStore>,
    bm25: Arc<Bm25Index>,
    reranker: Arc<dyn Reranker>,
    gating: RerankGatingPolicy,
    cache: QueryClassificationCache,
    collection: String,
    embedder: Arc<dyn EmbeddingProvider>,
    config: HybridConfig,
    metrics: Mutex<RetrievalMetricsSnapshot>,
}

impl HybridRetriever {
    #[must_use]
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        bm25: Arc<Bm25Index>,
        reranker: Arc<dyn Reranker>,
        gating: RerankGatingPolicy,
        embedder: Arc<dyn EmbeddingProvider>,
        collection: impl Into<String>,
        config: HybridConfig,
    ) -> Self {
        Self {
            vector_store,
            bm25,
            reranker,
            gating,
            cache: QueryClassificationCache::new(config.cache_capacity, config.cache_ttl),
            collection: collection.into(),
            embedder,
            config,
            metrics: Mutex::new(RetrievalMetricsSnapshot::default()),
        }
    }

    /// Fuse vector + BM25 candidates for `query`, gate-rerank, and return
    /// the top `k`.
    ///
    /// # Errors
    /// Propagates embedding, vector store, or reranker failures.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RerankCandidate>> {
        let start = Instant::now();
        let (class, cache_hit) = self.cache.get_or_classify(query);
        let weights = class.weights(self.config.defaults);
        let k_init = k * self.config.k_init_multiplier;

        let vector_hits = {
            let embedding = self.embedder.embed(query).await?;
            self.vector_store
                .search(&self.collection, &VectorQuery::new(embedding, k_init))
                .await?
        };
        let bm25_hits = self.bm25.search(query, k_init).await?;

        let fused = fuse(&vector_hits, &bm25_hits, self.bm25.as_ref(), weights);
        let mut candidates: Vec<RerankCandidate> = fused.into_values().collect();
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        candidates.truncate(self.config.max_candidates);

        let mut results = self.gating.apply(self.reranker.as_ref(), query, candidates).await?;
        results.truncate(k);

        let mut metrics = self.metrics.lock();
        metrics.query_count += 1;
        metrics.total_latency += start.elapsed();
        metrics.total_results += results.len() as u64;
        if cache_hit {
            metrics.cache_hits += 1;
        } else {
            metrics.cache_misses += 1;
        }
        drop(metrics);

        Ok(results)
    }

    #[must_use]
    pub fn metrics(&self) -> RetrievalMetricsSnapshot {
        self.metrics.lock().clone()
    }

    #[must_use]
    pub fn classify(&self, query: &str) -> QueryClass {
        self.cache.get_or_classify(query).0
    }
}

fn min_max_normalize(scores: &mut [(String, f32)]) {
    let Some(&(_, max)) = scores
        .iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
    else {
        return;
    };
    let Some(&(_, min)) = scores
        .iter()
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
    else {
        return;
    };
    let range = (max - min).max(1e-6);
    for (_, score) in scores.iter_mut() {
        *score = (*score - min) / range;
    }
}

fn fuse(
    vector_hits: &[resync_core::VectorHit],
    bm25_hits: &[(usize, f32)],
    bm25: &Bm25Index,
    weights: RetrievalWeights,
) -> HashMap<String, RerankCandidate> {
    let mut vector_scores: Vec<(String, f32)> = vector_hits
        .iter()
        .map(|h| (h.chunk_id.as_key(), h.similarity))
        .collect();
    min_max_normalize(&mut vector_scores);
    let vector_norm: HashMap<String, f32> = vector_scores.into_iter().collect();

    let mut bm25_entries: Vec<(String, f32, usize)> = bm25_hits
        .iter()
        .filter_map(|&(idx, score)| bm25.chunk_at(idx).map(|c| (c.chunk_id.as_key(), score, idx)))
        .collect();
    let mut bm25_scores: Vec<(String, f32)> =
        bm25_entries.iter().map(|(k, s, _)| (k.clone(), *s)).collect();
    min_max_normalize(&mut bm25_scores);
    let bm25_norm: HashMap<String, f32> = bm25_scores.into_iter().collect();

    let mut fused: HashMap<String, RerankCandidate> = HashMap::new();

    for hit in vector_hits {
        let key = hit.chunk_id.as_key();
        let v = vector_norm.get(&key).copied().unwrap_or(0.0);
        let b = bm25_norm.get(&key).copied().unwrap_or(0.0);
        fused.insert(
            key,
            RerankCandidate {
                chunk: resync_core::Chunk {
                    chunk_id: hit.chunk_id.clone(),
                    content: hit.content.clone(),
                    embedding: Vec::new(),
                    sha256: String::new(),
                    metadata: hit.metadata.clone(),
                },
                score: weights.vector * v + weights.bm25 * b,
            },
        );
    }

    bm25_entries.sort_by(|a, b| a.0.cmp(&b.0));
    bm25_entries.dedup_by(|a, b| a.0 == b.0);
    for (key, _, idx) in bm25_entries {
        fused.entry(key.clone()).or_insert_with(|| {
            let chunk = bm25.chunk_at(idx).expect("index came from bm25 search results");
            let v = vector_norm.get(&key).copied().unwrap_or(0.0);
            let b = bm25_norm.get(&key).copied().unwrap_or(0.0);
            RerankCandidate {
                chunk,
                score: weights.vector * v + weights.bm25 * b,
            }
        });
    }

    fused
}
