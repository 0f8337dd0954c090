//! The `KnowledgeGraph` capability (spec §4.5).

use crate::error::Result;
use crate::types::{CriticalJob, ImpactAnalysis};
use async_trait::async_trait;

/// Multi-hop queries over TWS job dependencies. Built on demand from TWS
/// API snapshots with a short TTL cache; the core owns no persistent graph
/// storage. All queries return empty sets (not errors) when the TWS client
/// is unavailable (spec §4.5).
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    /// BFS over `DEPENDS_ON` ancestors up to `max_depth`. `max_depth = 0`
    /// returns `[job_id]` only (spec §8 boundary behavior).
    async fn dependency_chain(&self, job_id: &str, max_depth: usize) -> Result<Vec<String>>;

    /// Descendants via reverse `DEPENDS_ON`.
    async fn impact_analysis(&self, job_id: &str) -> Result<ImpactAnalysis>;

    /// Rank nodes by betweenness-like centrality on the current snapshot.
    async fn critical_jobs(&self, top_n: usize) -> Result<Vec<CriticalJob>>;

    /// Resources reached by both jobs via `USES`.
    async fn resource_conflicts(&self, job_a: &str, job_b: &str) -> Result<Vec<String>>;
}
