//! `QueryRouter`: chooses between the knowledge graph, hybrid retrieval, or
//! both, and never propagates a failure to the caller (spec §4.6).

use crate::hybrid::HybridRetriever;
use crate::reranker::RerankCandidate;
use resync_core::entities::extract_entities;
use resync_graph::KnowledgeGraph;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteIntent {
    Dependency,
    Impact,
    Conflict,
    HowTo,
    Explanation,
    Documentation,
    Other,
}

/// Coarse intent guess from surface cues; the real classifier lives in
/// `resync-agent` and can override this before routing.
#[must_use]
pub fn guess_intent(query: &str) -> RouteIntent {
    let q = query.to_lowercase();
    if q.contains("depend") || q.contains("upstream") || q.contains("predecessor") {
        RouteIntent::Dependency
    } else if q.contains("impact") || q.contains("downstream") || q.contains("affect") {
        RouteIntent::Impact
    } else if q.contains("conflict") || q.contains("contention") {
        RouteIntent::Conflict
    } else if q.starts_with("how") || q.contains("how to") || q.contains("how do") {
        RouteIntent::HowTo
    } else if q.contains("why") || q.contains("explain") {
        RouteIntent::Explanation
    } else if q.contains("documentation") || q.contains("docs") || q.contains("runbook") {
        RouteIntent::Documentation
    } else {
        RouteIntent::Other
    }
}

#[derive(Debug, Clone)]
pub struct GraphFacts {
    pub job_id: String,
    pub dependency_chain: Vec<String>,
    pub downstream_count: usize,
}

#[derive(Debug, Clone)]
pub struct RouteClassification {
    pub intent: RouteIntent,
    pub confidence: f32,
    pub entities: Vec<String>,
    pub used_graph: bool,
    pub used_rag: bool,
}

#[derive(Debug, Clone)]
pub struct RouteResult {
    pub documents: Vec<RerankCandidate>,
    pub graph_data: Vec<GraphFacts>,
    pub classification: RouteClassification,
    /// Set when every retrieval path failed; `documents` is empty but the
    /// call still returns `Ok` (spec §4.6: "never throws").
    pub degraded: bool,
}

pub struct QueryRouter {
    graph: Arc<dyn KnowledgeGraph>,
    hybrid: Arc<HybridRetriever>,
}

impl QueryRouter {
    #[must_use]
    pub fn new(graph: Arc<dyn KnowledgeGraph>, hybrid: Arc<HybridRetriever>) -> Self {
        Self { graph, hybrid }
    }

    /// Route `query`, merging graph and RAG paths per the routing rules.
    /// Never returns `Err`: any path's failure degrades that path to empty
    /// output and is logged, not propagated.
    pub async fn route(&self, query: &str, k: usize) -> RouteResult {
        let entities = extract_entities(query);
        let job_refs = entities.jobs.clone();
        let intent = guess_intent(query);

        let wants_graph = matches!(
            intent,
            RouteIntent::Dependency | RouteIntent::Impact | RouteIntent::Conflict
        ) || job_refs.len() > 1;
        let wants_rag = !matches!(
            intent,
            RouteIntent::Dependency | RouteIntent::Impact | RouteIntent::Conflict
        );

        let mut graph_data = Vec::new();
        let mut used_graph = false;
        if wants_graph {
            for job_id in &job_refs {
                match self.graph.dependency_chain(job_id, 5).await {
                    Ok(chain) => {
                        let downstream_count = self
                            .graph
                            .impact_analysis(job_id)
                            .await
                            .map(|a| a.downstream_jobs.len())
                            .unwrap_or(0);
                        graph_data.push(GraphFacts {
                            job_id: job_id.clone(),
                            dependency_chain: chain,
                            downstream_count,
                        });
                        used_graph = true;
                    }
                    Err(err) => {
                        warn!(%job_id, error = %err, "graph path failed, continuing without it");
                    }
                }
            }
        }

        let mut documents = Vec::new();
        let mut used_rag = false;
        let mut degraded = false;
        if wants_rag || graph_data.is_empty() {
            match self.hybrid.retrieve(query, k).await {
                Ok(results) => {
                    documents = results;
                    used_rag = true;
                }
                Err(err) => {
                    warn!(error = %err, "hybrid retrieval failed, falling back to empty result");
                    degraded = graph_data.is_empty();
                }
            }
        }

        let confidence = if used_graph && used_rag {
            0.9
        } else if used_graph || used_rag {
            0.7
        } else {
            0.0
        };

        RouteResult {
            documents,
            graph_data,
            classification: RouteClassification {
                intent,
                confidence,
                entities: job_refs,
                used_graph,
                used_rag,
            },
            degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_query_routes_to_graph() {
        assert_eq!(guess_intent("what does AWSBH001 depend on"), RouteIntent::Dependency);
    }

    #[test]
    fn how_to_query_routes_to_rag() {
        assert_eq!(guess_intent("how do I restart a failed job"), RouteIntent::HowTo);
    }

    #[test]
    fn impact_query_is_detected() {
        assert_eq!(guess_intent("what is the downstream impact of AWSBH001 failing"), RouteIntent::Impact);
    }
}
