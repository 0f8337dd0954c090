//! Cyclic state machine for autonomous problem resolution: DIAGNOSE →
//! RESEARCH → VERIFY → PROPOSE → {APPROVE → EXECUTE → VALIDATE → END} |
//! {END} (spec §4.14).

use crate::error::{AgentError, Result};
use crate::tools::{Tool, ToolCatalog, ToolKind};
use resync_audit::{AuditQueue, AuditRecord};
use resync_core::capabilities::{CompletionParams, EmbeddingProvider, LlmProvider};
use resync_graph::KnowledgeGraph;
use resync_lock::DistributedLock;
use resync_memory::{LongTermMemoryManager, RetrievalMode};
use resync_retrieval::HybridRetriever;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_MAX_ITERATIONS: u32 = 5;
const DEFAULT_MIN_CONFIDENCE: f32 = 0.7;
const DIAGNOSTIC_LOCK_TTL_MS: u64 = 60_000;

#[derive(Debug, Clone)]
pub struct DiagnosticConfig {
    pub max_iterations: u32,
    pub min_confidence_for_proposal: f32,
    pub require_approval_for_actions: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            min_confidence_for_proposal: DEFAULT_MIN_CONFIDENCE,
            require_approval_for_actions: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProposedAction {
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub rationale: String,
}

/// The state threaded through every phase transition (spec §4.14).
#[derive(Debug, Clone)]
pub struct DiagnosticState {
    pub problem: String,
    pub iteration: u32,
    pub confidence: f32,
    pub findings: Vec<String>,
    pub proposed_actions: Vec<ProposedAction>,
    pub verification_results: Vec<(String, String)>,
    pub approval_status: ApprovalStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    NotRequested,
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone)]
pub enum DiagnosticOutcome {
    Resolved { summary: String, confidence: f32, state: DiagnosticState },
    Partial { summary: String, confidence: f32, state: DiagnosticState },
    PendingApproval { summary: String, approval_id: String, state: DiagnosticState },
    Cancelled { summary: String },
}

#[derive(Debug, Deserialize)]
struct Hypothesis {
    summary: String,
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct ProposalPlan {
    #[serde(default)]
    actions: Vec<ProposalAction>,
    summary: String,
}

#[derive(Debug, Deserialize)]
struct ProposalAction {
    tool_name: String,
    #[serde(default)]
    arguments: serde_json::Value,
    rationale: String,
}

/// Checked at every phase boundary; once flipped, `run` stops and returns
/// a snapshot instead of continuing.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct DiagnosticGraph {
    hybrid: Arc<HybridRetriever>,
    graph: Arc<dyn KnowledgeGraph>,
    long_term: Arc<LongTermMemoryManager>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    tools: ToolCatalog,
    audit: Arc<dyn AuditQueue>,
    lock: Arc<dyn DistributedLock>,
    config: DiagnosticConfig,
}

impl DiagnosticGraph {
    #[must_use]
    pub fn new(
        hybrid: Arc<HybridRetriever>,
        graph: Arc<dyn KnowledgeGraph>,
        long_term: Arc<LongTermMemoryManager>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        tools: ToolCatalog,
        audit: Arc<dyn AuditQueue>,
        lock: Arc<dyn DistributedLock>,
        config: DiagnosticConfig,
    ) -> Self {
        Self { hybrid, graph, long_term, embedder, llm, tools, audit, lock, config }
    }

    /// Run to completion (or until `max_iterations`/cancellation), honoring
    /// the default cancellation token. `user_id` scopes the RESEARCH phase's
    /// LongTermMemory consultation (memories are partitioned by user, spec
    /// §4.11), not the TWS job the problem describes.
    pub async fn run(&self, problem: &str, user_id: &str) -> Result<DiagnosticOutcome> {
        self.run_cancellable(problem, user_id, &CancellationToken::new()).await
    }

    pub async fn run_cancellable(
        &self,
        problem: &str,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<DiagnosticOutcome> {
        let mut state = DiagnosticState {
            problem: problem.to_string(),
            iteration: 0,
            confidence: 0.0,
            findings: Vec::new(),
            proposed_actions: Vec::new(),
            verification_results: Vec::new(),
            approval_status: ApprovalStatus::NotRequested,
        };

        loop {
            if cancel.is_cancelled() {
                return Ok(DiagnosticOutcome::Cancelled { summary: format!("cancelled at iteration {}", state.iteration) });
            }
            state.iteration += 1;

            let hypothesis = self.diagnose(&state).await?;
            state.confidence = hypothesis.confidence;
            state.findings.push(format!("diagnose: {}", hypothesis.summary));

            if cancel.is_cancelled() {
                return Ok(DiagnosticOutcome::Cancelled { summary: hypothesis.summary });
            }
            let problem = state.problem.clone();
            self.research(&problem, user_id, &mut state).await?;

            if cancel.is_cancelled() {
                return Ok(DiagnosticOutcome::Cancelled { summary: hypothesis.summary });
            }
            self.verify(&problem, &mut state).await?;

            if state.confidence >= self.config.min_confidence_for_proposal {
                return self.propose(state).await;
            }

            if state.iteration >= self.config.max_iterations {
                let summary = format!(
                    "unresolved after {} iterations (confidence {:.2})",
                    state.iteration, state.confidence
                );
                return Ok(DiagnosticOutcome::Partial { summary, confidence: state.confidence, state });
            }
        }
    }

    async fn diagnose(&self, state: &DiagnosticState) -> Result<Hypothesis> {
        let prompt = format!(
            "Diagnose this TWS operational problem given findings so far. Respond as \
             JSON {{\"summary\": ..., \"confidence\": 0.0-1.0}}.\n\nProblem: {}\n\nFindings:\n{}",
            state.problem,
            state.findings.join("\n")
        );
        let params = CompletionParams { json_mode: true, ..Default::default() };
        let raw = self.llm.complete(&prompt, &params).await?;
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "diagnose stage returned unparseable JSON");
            Hypothesis { summary: raw, confidence: 0.0 }
        }))
    }

    async fn research(&self, problem: &str, user_id: &str, state: &mut DiagnosticState) -> Result<()> {
        match self.hybrid.retrieve(problem, 3).await {
            Ok(candidates) => {
                for candidate in candidates {
                    state.findings.push(format!("doc: {}", candidate.chunk.content));
                }
            }
            Err(e) => tracing::warn!(error = %e, "research: hybrid retrieval failed, continuing without docs"),
        }

        let mode = match self.embedder.embed(problem).await {
            Ok(query_embedding) => RetrievalMode::Push { query_embedding, similarity_threshold: 0.8 },
            Err(e) => {
                tracing::warn!(error = %e, "research: embedding problem text failed, falling back to pull");
                RetrievalMode::Pull { min_confidence: 0.5 }
            }
        };
        match self.long_term.retrieve(user_id, mode).await {
            Ok(memories) => {
                for memory in memories {
                    state.findings.push(format!("memory: {}", memory.content_text()));
                }
            }
            Err(e) => tracing::warn!(error = %e, "research: long-term memory lookup failed, continuing"),
        }
        Ok(())
    }

    async fn verify(&self, problem: &str, state: &mut DiagnosticState) -> Result<()> {
        let entities = resync_core::entities::extract_entities(problem);
        for job_id in &entities.jobs {
            match self.graph.dependency_chain(job_id, 3).await {
                Ok(chain) => state.verification_results.push((job_id.clone(), format!("{chain:?}"))),
                Err(e) => tracing::warn!(error = %e, job_id, "verify: dependency_chain failed"),
            }
            if let Some(status_tool) = self.tools.find("status_check") {
                match status_tool.invoke(&serde_json::json!({ "job_id": job_id })).await {
                    Ok(output) => state.verification_results.push((job_id.clone(), output.to_string())),
                    Err(e) => tracing::warn!(error = %e, job_id, "verify: status_check failed"),
                }
            }
        }
        Ok(())
    }

    async fn propose(&self, mut state: DiagnosticState) -> Result<DiagnosticOutcome> {
        let prompt = format!(
            "Propose a resolution for this problem. If no scheduler write is needed, \
             leave actions empty. Respond as JSON {{\"summary\": ..., \"actions\": \
             [{{\"tool_name\":..., \"arguments\":{{}}, \"rationale\":...}}]}}.\n\nProblem: {}\n\nFindings:\n{}",
            state.problem,
            state.findings.join("\n")
        );
        let params = CompletionParams { json_mode: true, ..Default::default() };
        let raw = self.llm.complete(&prompt, &params).await?;
        let plan: ProposalPlan = serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "propose stage returned unparseable JSON");
            ProposalPlan { actions: Vec::new(), summary: raw }
        });

        state.proposed_actions = plan
            .actions
            .into_iter()
            .map(|a| ProposedAction { tool_name: a.tool_name, arguments: a.arguments, rationale: a.rationale })
            .collect();

        let all_read_only = state
            .proposed_actions
            .iter()
            .all(|a| self.tools.find(&a.tool_name).map(|t| t.kind() == ToolKind::Read).unwrap_or(true));

        if state.proposed_actions.is_empty() || all_read_only {
            return Ok(DiagnosticOutcome::Resolved { summary: plan.summary, confidence: state.confidence, state });
        }

        if self.config.require_approval_for_actions {
            self.approve(plan.summary, state).await
        } else {
            self.execute_and_validate(plan.summary, state).await
        }
    }

    async fn approve(&self, summary: String, mut state: DiagnosticState) -> Result<DiagnosticOutcome> {
        let approval_id = Uuid::new_v4().to_string();
        let record = AuditRecord::new(
            approval_id.clone(),
            state.problem.clone(),
            summary.clone(),
            "diagnostic graph requesting approval for write actions".to_string(),
            state.confidence,
        );
        self.audit.add(record).await.map_err(AgentError::from)?;
        state.approval_status = ApprovalStatus::Pending;
        Ok(DiagnosticOutcome::PendingApproval { summary, approval_id, state })
    }

    /// Called once an externally-pending approval resolves to `Approved`;
    /// runs EXECUTE then VALIDATE.
    pub async fn resume_after_approval(&self, mut state: DiagnosticState, approved: bool) -> Result<DiagnosticOutcome> {
        if !approved {
            state.approval_status = ApprovalStatus::Rejected;
            return Ok(DiagnosticOutcome::Partial {
                summary: "proposed actions rejected by reviewer".to_string(),
                confidence: state.confidence,
                state,
            });
        }
        state.approval_status = ApprovalStatus::Approved;
        let summary = format!("executing {} approved action(s)", state.proposed_actions.len());
        self.execute_and_validate(summary, state).await
    }

    async fn execute_and_validate(&self, summary: String, mut state: DiagnosticState) -> Result<DiagnosticOutcome> {
        let lock_key = format!("diagnostic:{}", state.problem);
        let handle = self
            .lock
            .acquire(&lock_key, DIAGNOSTIC_LOCK_TTL_MS)
            .await
            .map_err(|e| AgentError::Integration(format!("could not acquire diagnostic execution lock: {e}")))?;

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for action in &state.proposed_actions {
            match self.tools.find(&action.tool_name) {
                Some(tool) => match tool.invoke(&action.arguments).await {
                    Ok(_) => succeeded.push(action.tool_name.clone()),
                    Err(e) => failed.push((action.tool_name.clone(), e.to_string())),
                },
                None => failed.push((action.tool_name.clone(), "unknown tool".to_string())),
            }
        }

        if let Err(e) = self.lock.release(&handle).await {
            tracing::warn!(error = %e, lock_key, "failed to release diagnostic execution lock");
        }

        state.verification_results.push(("execute.succeeded".to_string(), format!("{succeeded:?}")));
        state.verification_results.push(("execute.failed".to_string(), format!("{failed:?}")));

        let problem = state.problem.clone();
        self.verify(&problem, &mut state).await?;

        if failed.is_empty() {
            Ok(DiagnosticOutcome::Resolved { summary, confidence: state.confidence, state })
        } else {
            Ok(DiagnosticOutcome::Partial {
                summary: format!("{summary}; residual issues: {failed:?}"),
                confidence: state.confidence,
                state,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use resync_audit::InMemoryAuditQueue;
    use resync_core::capabilities::{EmbeddingProvider, JobStatus, TwsClient};
    use resync_core::CoreResult;
    use resync_graph::{CriticalJob, GraphError, ImpactAnalysis, ImpactLevel};
    use resync_lock::InMemoryLock;
    use resync_memory::{DeclarativeMemory, InMemoryLongTermStore, LongTermMemoryEntry, LongTermMemoryStore, MemoryExtractor};
    use resync_retrieval::{Bm25Index, HybridConfig, NoOpReranker, RerankGatingPolicy, Reranker};
    use resync_vector::InMemoryVectorStore;

    struct FakeEmbedder;
    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        fn name(&self) -> &str {
            "fake"
        }
        fn dimensions(&self) -> usize {
            3
        }
        async fn embed_batch(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
        }
    }

    struct ScriptedLlm {
        responses: parking_lot::Mutex<Vec<String>>,
    }
    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn complete(&self, _prompt: &str, _params: &CompletionParams) -> CoreResult<String> {
            let mut responses = self.responses.lock();
            Ok(if responses.is_empty() { "{}".to_string() } else { responses.remove(0) })
        }
    }

    struct FakeTws;
    #[async_trait]
    impl TwsClient for FakeTws {
        async fn job_status(&self, job_id: &str) -> CoreResult<JobStatus> {
            Ok(JobStatus { job_id: job_id.to_string(), state: "ABEND".to_string(), return_code: Some(8), last_run: None })
        }
        async fn job_dependencies(&self, _job_id: &str) -> CoreResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn job_resources(&self, _job_id: &str) -> CoreResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn workstation_state(&self, _workstation: &str) -> CoreResult<String> {
            Ok("LINKED".to_string())
        }
        async fn all_job_ids(&self) -> CoreResult<Vec<String>> {
            Ok(Vec::new())
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

    struct EmptyGraph;
    #[async_trait]
    impl KnowledgeGraph for EmptyGraph {
        async fn dependency_chain(&self, job_id: &str, _max_depth: usize) -> std::result::Result<Vec<String>, GraphError> {
            Ok(vec![job_id.to_string()])
        }
        async fn impact_analysis(&self, _job_id: &str) -> std::result::Result<ImpactAnalysis, GraphError> {
            Ok(ImpactAnalysis { downstream_jobs: Vec::new(), critical_paths: Vec::new(), estimated_impact_level: ImpactLevel::Low })
        }
        async fn critical_jobs(&self, _top_n: usize) -> std::result::Result<Vec<CriticalJob>, GraphError> {
            Ok(Vec::new())
        }
        async fn resource_conflicts(&self, _job_a: &str, _job_b: &str) -> std::result::Result<Vec<String>, GraphError> {
            Ok(Vec::new())
        }
    }

    fn build_graph(responses: Vec<&str>) -> DiagnosticGraph {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FakeEmbedder);
        let vector_store: Arc<dyn resync_vector::VectorStore> = Arc::new(InMemoryVectorStore::new());
        let bm25 = Arc::new(Bm25Index::new(vector_store.clone(), "docs"));
        let reranker: Arc<dyn Reranker> = Arc::new(NoOpReranker);
        let hybrid = Arc::new(HybridRetriever::new(
            vector_store,
            bm25,
            reranker,
            RerankGatingPolicy::default(),
            embedder.clone(),
            "docs",
            HybridConfig::default(),
        ));
        let llm: Arc<dyn LlmProvider> =
            Arc::new(ScriptedLlm { responses: parking_lot::Mutex::new(responses.into_iter().map(String::from).collect()) });
        let tws: Arc<dyn TwsClient> = Arc::new(FakeTws);
        let tools = ToolCatalog::new(tws);
        let graph: Arc<dyn KnowledgeGraph> = Arc::new(EmptyGraph);
        let lock: Arc<dyn DistributedLock> = Arc::new(InMemoryLock::new());
        let audit: Arc<dyn AuditQueue> = Arc::new(InMemoryAuditQueue::new());
        let long_term = Arc::new(LongTermMemoryManager::new(
            Arc::new(InMemoryLongTermStore::new()),
            MemoryExtractor::new(llm.clone()),
            embedder.clone(),
        ));
        DiagnosticGraph::new(hybrid, graph, long_term, embedder, llm, tools, audit, lock, DiagnosticConfig::default())
    }

    #[tokio::test]
    async fn high_confidence_with_readonly_actions_resolves_immediately() {
        let graph = build_graph(vec![
            r#"{"summary":"likely a resource conflict","confidence":0.9}"#,
            r#"{"summary":"recommend checking resource allocation","actions":[]}"#,
        ]);
        let outcome = graph.run("AWSBH001 ABEND RC=8", "operator-1").await.unwrap();
        match outcome {
            DiagnosticOutcome::Resolved { confidence, .. } => assert!(confidence >= 0.7),
            other => panic!("expected Resolved, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn write_action_proposal_goes_to_approval_not_straight_to_execute() {
        let graph = build_graph(vec![
            r#"{"summary":"job needs rerun","confidence":0.85}"#,
            r#"{"summary":"rerun the job","actions":[{"tool_name":"rerun_job","arguments":{"job_id":"AWSBH001"},"rationale":"clears ABEND"}]}"#,
        ]);
        let outcome = graph.run("AWSBH001 ABEND RC=8", "operator-1").await.unwrap();
        match outcome {
            DiagnosticOutcome::PendingApproval { approval_id, .. } => assert!(!approval_id.is_empty()),
            other => panic!("expected PendingApproval, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn low_confidence_loops_until_max_iterations_then_partial() {
        let low_confidence = r#"{"summary":"still unsure","confidence":0.1}"#;
        let graph = build_graph(vec![low_confidence; 10]);
        let outcome = graph.run("mystery failure", "operator-1").await.unwrap();
        match outcome {
            DiagnosticOutcome::Partial { state, .. } => assert_eq!(state.iteration, DEFAULT_MAX_ITERATIONS),
            other => panic!("expected Partial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn research_consults_long_term_memory_by_user_id_not_job_id() {
        let graph = build_graph(vec![]);
        let store = Arc::new(InMemoryLongTermStore::new());
        store
            .put(LongTermMemoryEntry::Declarative(DeclarativeMemory {
                memory_id: "mem-1".to_string(),
                user_id: "operator-1".to_string(),
                category: resync_memory::DeclarativeCategory::Fact,
                content: "AWSBH001 always needs a rerun after 2am".to_string(),
                confidence: 0.9,
                provenance: resync_memory::MemoryProvenance::new("session-1", "fake", vec![0]),
                embedding: Some(vec![0.1, 0.2, 0.3]),
            }))
            .await
            .unwrap();
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FakeEmbedder);
        let long_term = Arc::new(LongTermMemoryManager::new(
            store,
            MemoryExtractor::new(Arc::new(ScriptedLlm { responses: parking_lot::Mutex::new(Vec::new()) })),
            embedder,
        ));
        let graph = DiagnosticGraph { long_term, ..graph };

        let mut state = DiagnosticState {
            problem: "AWSBH001 ABEND RC=8".to_string(),
            iteration: 0,
            confidence: 0.0,
            findings: Vec::new(),
            proposed_actions: Vec::new(),
            verification_results: Vec::new(),
            approval_status: ApprovalStatus::NotRequested,
        };
        graph.research("AWSBH001 ABEND RC=8", "operator-1", &mut state).await.unwrap();
        assert!(state.findings.iter().any(|f| f.starts_with("memory:")));

        let mut miss_state = state.clone();
        miss_state.findings.clear();
        graph.research("AWSBH001 ABEND RC=8", "AWSBH001", &mut miss_state).await.unwrap();
        assert!(!miss_state.findings.iter().any(|f| f.starts_with("memory:")));
    }

    #[tokio::test]
    async fn cancellation_before_start_returns_cancelled_outcome() {
        let graph = build_graph(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = graph.run_cancellable("AWSBH001 ABEND", "operator-1", &cancel).await.unwrap();
        assert!(matches!(outcome, DiagnosticOutcome::Cancelled { .. }));
    }
}
