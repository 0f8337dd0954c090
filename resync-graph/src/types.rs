//! Node/edge types for the on-demand TWS dependency graph (spec §3, §4.5).
//!
//! The graph is rebuilt per-snapshot rather than mutated in place, so nodes
//! reference neighbors by arena index (spec §9 "cyclic graphs" design
//! note) instead of owning pointers — this sidesteps ownership cycles
//! entirely.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Job,
    Workstation,
    Resource,
    Calendar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    DependsOn,
    RunsOn,
    Uses,
    TriggeredBy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
}

/// An edge stored as arena indices into `Snapshot::nodes`, not as owning
/// references — the only way to express cycles safely without `Rc`/`Weak`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: usize,
    pub to: usize,
    pub kind: EdgeKind,
}

/// A single on-demand graph build: node arena plus edges.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl Snapshot {
    #[must_use]
    pub fn index_of(&self, node_id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == node_id)
    }

    #[must_use]
    pub fn neighbors(&self, idx: usize, kind: EdgeKind, reverse: bool) -> Vec<usize> {
        self.edges
            .iter()
            .filter(|e| e.kind == kind && if reverse { e.to == idx } else { e.from == idx })
            .map(|e| if reverse { e.from } else { e.to })
            .collect()
    }
}

/// Impact level reported by `impact_analysis` (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub downstream_jobs: Vec<String>,
    pub critical_paths: Vec<Vec<String>>,
    pub estimated_impact_level: ImpactLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalJob {
    pub job_id: String,
    pub centrality: f64,
}
