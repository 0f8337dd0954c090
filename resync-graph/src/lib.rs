//! ABOUTME: On-demand TWS dependency graph (spec §4.5)
//! ABOUTME: TTL-cached traversal over a node arena built from scheduler snapshots

pub mod error;
pub mod traits;
pub mod tws_graph;
pub mod types;

pub use error::{GraphError, Result};
pub use traits::KnowledgeGraph;
pub use tws_graph::TwsKnowledgeGraph;
pub use types::{CriticalJob, EdgeKind, GraphEdge, GraphNode, ImpactAnalysis, ImpactLevel, NodeKind, Snapshot};
