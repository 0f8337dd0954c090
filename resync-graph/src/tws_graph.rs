//! Builds a [`Snapshot`] on demand from a [`TwsClient`] and caches it for a
//! short TTL (spec §4.5: "seconds-to-minutes").

use crate::error::Result;
use crate::traits::KnowledgeGraph;
use crate::types::{CriticalJob, EdgeKind, GraphEdge, GraphNode, ImpactAnalysis, ImpactLevel, NodeKind, Snapshot};
use async_trait::async_trait;
use parking_lot::Mutex;
use resync_core::TwsClient;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct CachedSnapshot {
    snapshot: Arc<Snapshot>,
    built_at: Instant,
}

/// [`KnowledgeGraph`] backed by an on-demand snapshot of the TWS
/// scheduler's dependency graph.
pub struct TwsKnowledgeGraph {
    client: Arc<dyn TwsClient>,
    ttl: Duration,
    cache: Mutex<Option<CachedSnapshot>>,
}

impl TwsKnowledgeGraph {
    #[must_use]
    pub fn new(client: Arc<dyn TwsClient>, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            cache: Mutex::new(None),
        }
    }

    async fn snapshot(&self) -> Arc<Snapshot> {
        if let Some(cached) = self.cache.lock().as_ref() {
            if cached.built_at.elapsed() < self.ttl {
                return cached.snapshot.clone();
            }
        }

        let built = Arc::new(self.build_snapshot().await.unwrap_or_default());
        *self.cache.lock() = Some(CachedSnapshot {
            snapshot: built.clone(),
            built_at: Instant::now(),
        });
        built
    }

    async fn build_snapshot(&self) -> std::result::Result<Snapshot, resync_core::CoreError> {
        let job_ids = self.client.all_job_ids().await?;
        let mut snapshot = Snapshot::default();
        let mut index_of = std::collections::HashMap::new();

        for job_id in &job_ids {
            let idx = snapshot.nodes.len();
            snapshot.nodes.push(GraphNode {
                id: job_id.clone(),
                kind: NodeKind::Job,
                name: job_id.clone(),
            });
            index_of.insert(job_id.clone(), idx);
        }

        for job_id in &job_ids {
            let &from = index_of.get(job_id).expect("just inserted");
            for dep in self.client.job_dependencies(job_id).await.unwrap_or_default() {
                let to = *index_of.entry(dep.clone()).or_insert_with(|| {
                    let idx = snapshot.nodes.len();
                    snapshot.nodes.push(GraphNode {
                        id: dep.clone(),
                        kind: NodeKind::Job,
                        name: dep,
                    });
                    idx
                });
                snapshot.edges.push(GraphEdge {
                    from,
                    to,
                    kind: EdgeKind::DependsOn,
                });
            }

            for resource in self.client.job_resources(job_id).await.unwrap_or_default() {
                let to = *index_of.entry(resource.clone()).or_insert_with(|| {
                    let idx = snapshot.nodes.len();
                    snapshot.nodes.push(GraphNode {
                        id: resource.clone(),
                        kind: NodeKind::Resource,
                        name: resource,
                    });
                    idx
                });
                snapshot.edges.push(GraphEdge {
                    from,
                    to,
                    kind: EdgeKind::Uses,
                });
            }
        }

        Ok(snapshot)
    }
}

#[async_trait]
impl KnowledgeGraph for TwsKnowledgeGraph {
    async fn dependency_chain(&self, job_id: &str, max_depth: usize) -> Result<Vec<String>> {
        let snapshot = self.snapshot().await;
        let Some(start) = snapshot.index_of(job_id) else {
            return Ok(Vec::new());
        };

        let mut chain = vec![job_id.to_string()];
        if max_depth == 0 {
            return Ok(chain);
        }

        let mut visited: HashSet<usize> = HashSet::from([start]);
        let mut frontier = VecDeque::from([(start, 0usize)]);
        while let Some((idx, depth)) = frontier.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for next in snapshot.neighbors(idx, EdgeKind::DependsOn, false) {
                if visited.insert(next) {
                    chain.push(snapshot.nodes[next].id.clone());
                    frontier.push_back((next, depth + 1));
                }
            }
        }
        Ok(chain)
    }

    async fn impact_analysis(&self, job_id: &str) -> Result<ImpactAnalysis> {
        let snapshot = self.snapshot().await;
        let Some(start) = snapshot.index_of(job_id) else {
            return Ok(ImpactAnalysis {
                downstream_jobs: Vec::new(),
                critical_paths: Vec::new(),
                estimated_impact_level: ImpactLevel::Low,
            });
        };

        let mut downstream = Vec::new();
        let mut visited = HashSet::from([start]);
        let mut frontier = VecDeque::from([start]);
        let mut paths: Vec<Vec<String>> = Vec::new();
        let mut path_so_far = vec![job_id.to_string()];

        while let Some(idx) = frontier.pop_front() {
            let children = snapshot.neighbors(idx, EdgeKind::DependsOn, true);
            if children.is_empty() && idx != start {
                paths.push(path_so_far.clone());
            }
            for next in children {
                if visited.insert(next) {
                    downstream.push(snapshot.nodes[next].id.clone());
                    path_so_far.push(snapshot.nodes[next].id.clone());
                    frontier.push_back(next);
                }
            }
        }

        let estimated_impact_level = match downstream.len() {
            0 => ImpactLevel::Low,
            1..=2 => ImpactLevel::Medium,
            3..=6 => ImpactLevel::High,
            _ => ImpactLevel::Critical,
        };

        Ok(ImpactAnalysis {
            downstream_jobs: downstream,
            critical_paths: paths,
            estimated_impact_level,
        })
    }

    async fn critical_jobs(&self, top_n: usize) -> Result<Vec<CriticalJob>> {
        let snapshot = self.snapshot().await;
        // Betweenness-like proxy: in-degree + out-degree on DEPENDS_ON,
        // cheap to compute on every snapshot rebuild without a full
        // shortest-paths pass.
        let mut scored: Vec<CriticalJob> = snapshot
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind == NodeKind::Job)
            .map(|(idx, node)| {
                let out_degree = snapshot.neighbors(idx, EdgeKind::DependsOn, false).len();
                let in_degree = snapshot.neighbors(idx, EdgeKind::DependsOn, true).len();
                CriticalJob {
                    job_id: node.id.clone(),
                    centrality: (out_degree + in_degree) as f64,
                }
            })
            .collect();
        scored.sort_by(|a, b| b.centrality.partial_cmp(&a.centrality).unwrap());
        scored.truncate(top_n);
        Ok(scored)
    }

    async fn resource_conflicts(&self, job_a: &str, job_b: &str) -> Result<Vec<String>> {
        let snapshot = self.snapshot().await;
        let (Some(a), Some(b)) = (snapshot.index_of(job_a), snapshot.index_of(job_b)) else {
            return Ok(Vec::new());
        };
        let uses_a: HashSet<usize> = snapshot.neighbors(a, EdgeKind::Uses, false).into_iter().collect();
        let uses_b: HashSet<usize> = snapshot.neighbors(b, EdgeKind::Uses, false).into_iter().collect();
        Ok(uses_a
            .intersection(&uses_b)
            .map(|&idx| snapshot.nodes[idx].id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use resync_core::{CoreResult, JobStatus};
    use std::collections::HashMap;

    struct FakeTws {
        deps: HashMap<String, Vec<String>>,
    }

    #[async_trait]
    impl TwsClient for FakeTws {
        async fn job_status(&self, job_id: &str) -> CoreResult<JobStatus> {
            Ok(JobStatus {
                job_id: job_id.to_string(),
                state: "SUCC".into(),
                return_code: Some(0),
                last_run: None,
            })
        }
        async fn job_dependencies(&self, job_id: &str) -> CoreResult<Vec<String>> {
            Ok(self.deps.get(job_id).cloned().unwrap_or_default())
        }
        async fn job_resources(&self, _job_id: &str) -> CoreResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn workstation_state(&self, _workstation: &str) -> CoreResult<String> {
            Ok("ACTIVE".into())
        }
        async fn all_job_ids(&self) -> CoreResult<Vec<String>> {
            Ok(self.deps.keys().cloned().collect())
        }
        async fn rerun_job(&self, _job_id: &str) -> CoreResult<()> {
            Ok(())
        }
        async fn kill_job(&self, _job_id: &str) -> CoreResult<()> {
            Ok(())
        }
        async fn release_job(&self, _job_id: &str) -> CoreResult<()> {
            Ok(())
        }
    }

    fn graph_with_chain() -> TwsKnowledgeGraph {
        let mut deps = HashMap::new();
        deps.insert("AWSBH001".to_string(), vec!["AWSBH000".to_string()]);
        deps.insert("AWSBH000".to_string(), vec![]);
        TwsKnowledgeGraph::new(Arc::new(FakeTws { deps }), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn max_depth_zero_returns_only_the_job() {
        let graph = graph_with_chain();
        let chain = graph.dependency_chain("AWSBH001", 0).await.unwrap();
        assert_eq!(chain, vec!["AWSBH001".to_string()]);
    }

    #[tokio::test]
    async fn dependency_chain_follows_depends_on_edges() {
        let graph = graph_with_chain();
        let chain = graph.dependency_chain("AWSBH001", 5).await.unwrap();
        assert_eq!(chain, vec!["AWSBH001".to_string(), "AWSBH000".to_string()]);
    }

    #[tokio::test]
    async fn impact_analysis_walks_reverse_edges() {
        let graph = graph_with_chain();
        let impact = graph.impact_analysis("AWSBH000").await.unwrap();
        assert_eq!(impact.downstream_jobs, vec!["AWSBH001".to_string()]);
    }

    #[tokio::test]
    async fn unknown_job_returns_empty_not_error() {
        let graph = graph_with_chain();
        let chain = graph.dependency_chain("GHOST", 5).await.unwrap();
        assert!(chain.is_empty());
    }
}
