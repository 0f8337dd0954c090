//! ABOUTME: Intent classification, route dispatch, and the cyclic diagnostic resolution graph
//! ABOUTME: Rule-then-LLM classification, tool-use loop, approval-gated writes (spec §4.12-§4.14)

pub mod diagnostic;
pub mod error;
pub mod intent;
pub mod router;
pub mod tools;

pub use diagnostic::{
    ApprovalStatus, CancellationToken, DiagnosticConfig, DiagnosticGraph, DiagnosticOutcome, DiagnosticState,
    ProposedAction,
};
pub use error::{AgentError, Result};
pub use intent::{Intent, IntentClassification, IntentClassifier, RoutingMode};
pub use router::{AgentResponse, AgentRouter, AgentRouterConfig};
pub use tools::{JobLookupTool, KillJobTool, RerunJobTool, StatusCheckTool, Tool, ToolCall, ToolCatalog, ToolKind, ToolResult};
