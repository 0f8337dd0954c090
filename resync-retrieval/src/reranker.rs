//! Reranker with gating policy (spec §4.3).
//!
//! `NoOp` is the identity passthrough used when reranking is disabled;
//! `CrossEncoder` delegates to an external model capability. Gating keeps
//! the (expensive) cross-encoder off the hot path unless the fused
//! candidate list actually looks uncertain.

use async_trait::async_trait;
use resync_core::Chunk;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum RerankError {
    #[error("integration error: {0}")]
    Integration(String),
}

pub type Result<T> = std::result::Result<T, RerankError>;

/// A candidate carried through fusion and reranking.
#[derive(Debug, Clone)]
pub struct RerankCandidate {
    pub chunk: Chunk,
    pub score: f32,
}

/// `rerank(query, candidates) -> scored_candidates` capability (spec §4.3).
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, candidates: Vec<RerankCandidate>) -> Result<Vec<RerankCandidate>>;
}

/// Identity passthrough — the default when reranking is disabled.
#[derive(Debug, Default)]
pub struct NoOpReranker;

#[async_trait]
impl Reranker for NoOpReranker {
    async fn rerank(&self, _query: &str, candidates: Vec<RerankCandidate>) -> Result<Vec<RerankCandidate>> {
        Ok(candidates)
    }
}

/// External cross-encoder scoring capability, out of core (spec §1).
#[async_trait]
pub trait CrossEncoderModel: Send + Sync {
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>>;
}

/// Delegates scoring to an external cross-encoder model.
pub struct CrossEncoderReranker {
    model: std::sync::Arc<dyn CrossEncoderModel>,
}

impl CrossEncoderReranker {
    #[must_use]
    pub fn new(model: std::sync::Arc<dyn CrossEncoderModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    async fn rerank(&self, query: &str, mut candidates: Vec<RerankCandidate>) -> Result<Vec<RerankCandidate>> {
        let texts: Vec<String> = candidates.iter().map(|c| c.chunk.content.clone()).collect();
        let scores = self.model.score(query, &texts).await?;
        for (candidate, score) in candidates.iter_mut().zip(scores) {
            candidate.score = score;
        }
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        Ok(candidates)
    }
}

/// Decides when reranking is worth its cost (spec §4.3).
#[derive(Debug, Clone, Copy)]
pub struct RerankGatingPolicy {
    pub low_confidence_threshold: f32,
    pub margin_threshold: f32,
    pub max_candidates: usize,
}

impl Default for RerankGatingPolicy {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.35,
            margin_threshold: 0.05,
            max_candidates: 10,
        }
    }
}

impl RerankGatingPolicy {
    /// Trigger iff the top score is below the low-confidence threshold, or
    /// the rank-1/rank-2 margin is below the margin threshold. Candidates
    /// must already be sorted descending by `score`.
    #[must_use]
    pub fn should_rerank(&self, candidates: &[RerankCandidate]) -> bool {
        let Some(top) = candidates.first() else {
            return false;
        };
        if top.score < self.low_confidence_threshold {
            return true;
        }
        if let Some(second) = candidates.get(1) {
            if top.score - second.score < self.margin_threshold {
                return true;
            }
        }
        false
    }

    /// Apply the gate: pass the (capped) candidate list to `reranker` only
    /// when `should_rerank` is true, otherwise return candidates unchanged.
    ///
    /// # Errors
    /// Propagates the reranker's failure.
    pub async fn apply(
        &self,
        reranker: &dyn Reranker,
        query: &str,
        mut candidates: Vec<RerankCandidate>,
    ) -> Result<Vec<RerankCandidate>> {
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        if !self.should_rerank(&candidates) {
            return Ok(candidates);
        }
        let tail = candidates.split_off(candidates.len().min(self.max_candidates));
        let mut reranked = reranker.rerank(query, candidates).await?;
        reranked.extend(tail);
        Ok(reranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use resync_core::{ChunkId, ChunkMetadata, SourceTier};

    fn candidate(content: &str, score: f32) -> RerankCandidate {
        RerankCandidate {
            chunk: Chunk::new(
                ChunkId::new("d", 0),
                content.to_string(),
                vec![0.0],
                ChunkMetadata {
                    last_updated: Utc::now(),
                    ..ChunkMetadata::new("doc", SourceTier::Official, 1)
                },
            ),
            score,
        }
    }

    #[test]
    fn gate_triggers_on_low_top_score() {
        let policy = RerankGatingPolicy::default();
        assert!(policy.should_rerank(&[candidate("a", 0.2)]));
    }

    #[test]
    fn gate_triggers_on_narrow_margin() {
        let policy = RerankGatingPolicy::default();
        assert!(policy.should_rerank(&[candidate("a", 0.9), candidate("b", 0.87)]));
    }

    #[test]
    fn gate_stays_closed_when_confident_and_separated() {
        let policy = RerankGatingPolicy::default();
        assert!(!policy.should_rerank(&[candidate("a", 0.9), candidate("b", 0.5)]));
    }

    #[tokio::test]
    async fn noop_reranker_is_identity() {
        let candidates = vec![candidate("a", 0.5), candidate("b", 0.1)];
        let result = NoOpReranker.rerank("query", candidates.clone()).await.unwrap();
        assert_eq!(result.len(), candidates.len());
    }
}
