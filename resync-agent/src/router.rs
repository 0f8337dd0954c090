//! Dispatch to the rag-only, agentic, or diagnostic handler per the
//! intent's suggested routing, with a quarantine gate into `AuditQueue`
//! for low-confidence responses (spec §4.13).

use crate::diagnostic::{DiagnosticGraph, DiagnosticOutcome};
use crate::error::{AgentError, Result};
use crate::intent::{Intent, IntentClassification, IntentClassifier, RoutingMode};
use crate::tools::{Tool, ToolCatalog};
use resync_audit::{AuditQueue, AuditRecord};
use resync_core::capabilities::{CompletionParams, LlmProvider};
use resync_core::entities::ExtractedEntities;
use resync_retrieval::HybridRetriever;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

const DEFAULT_MAX_AGENTIC_STEPS: u32 = 8;
const DEFAULT_QUARANTINE_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct AgentRouterConfig {
    pub max_agentic_steps: u32,
    pub quarantine_threshold: f32,
}

impl Default for AgentRouterConfig {
    fn default() -> Self {
        Self { max_agentic_steps: DEFAULT_MAX_AGENTIC_STEPS, quarantine_threshold: DEFAULT_QUARANTINE_THRESHOLD }
    }
}

#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub response: String,
    pub routing_mode: RoutingMode,
    pub intent: Intent,
    pub confidence: f32,
    pub handler: &'static str,
    pub tools_used: Vec<String>,
    pub entities: ExtractedEntities,
    pub requires_approval: bool,
    pub approval_id: Option<String>,
    pub processing_time_ms: u64,
}

#[derive(Debug, Deserialize)]
struct LlmTextResponse {
    response: String,
    confidence: f32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AgenticStep {
    Tool { tool_call: ToolCallPayload },
    Final { response: String, confidence: f32 },
}

#[derive(Debug, Deserialize)]
struct ToolCallPayload {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

pub struct AgentRouter {
    classifier: IntentClassifier,
    hybrid: Arc<HybridRetriever>,
    llm: Arc<dyn LlmProvider>,
    tools: ToolCatalog,
    diagnostic: DiagnosticGraph,
    audit: Arc<dyn AuditQueue>,
    config: AgentRouterConfig,
}

impl AgentRouter {
    #[must_use]
    pub fn new(
        classifier: IntentClassifier,
        hybrid: Arc<HybridRetriever>,
        llm: Arc<dyn LlmProvider>,
        tools: ToolCatalog,
        diagnostic: DiagnosticGraph,
        audit: Arc<dyn AuditQueue>,
        config: AgentRouterConfig,
    ) -> Self {
        Self { classifier, hybrid, llm, tools, diagnostic, audit, config }
    }

    /// Classify `message` (unless `forced_mode` overrides routing) and
    /// dispatch to the corresponding handler. `user_id` scopes any
    /// LongTermMemory consultation the diagnostic handler performs.
    pub async fn route(&self, message: &str, user_id: &str, forced_mode: Option<RoutingMode>) -> Result<AgentResponse> {
        let started = Instant::now();
        let classification = self.classifier.classify(message).await;
        let mode = forced_mode.unwrap_or(classification.suggested_routing);

        let (response, handler, confidence, tools_used) = match mode {
            RoutingMode::RagOnly => self.run_rag_only(message).await?,
            RoutingMode::Agentic => self.run_agentic(message).await?,
            RoutingMode::Diagnostic => self.run_diagnostic(message, user_id).await?,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let (requires_approval, approval_id) =
            self.quarantine_if_needed(message, &response, confidence).await?;

        Ok(AgentResponse {
            response,
            routing_mode: mode,
            intent: classification.primary_intent,
            confidence,
            handler,
            tools_used,
            entities: classification.entities,
            requires_approval,
            approval_id,
            processing_time_ms: elapsed_ms,
        })
    }

    async fn run_rag_only(&self, message: &str) -> Result<(String, &'static str, f32, Vec<String>)> {
        let candidates = self.hybrid.retrieve(message, 5).await?;
        let context = candidates
            .iter()
            .map(|c| c.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n---\n");
        let prompt = format!(
            "Answer the operator's question using only the context below. Respond as \
             JSON {{\"response\": ..., \"confidence\": 0.0-1.0}}.\n\nContext:\n{context}\n\nQuestion: {message}"
        );
        let params = CompletionParams { json_mode: true, ..Default::default() };
        let raw = self.llm.complete(&prompt, &params).await?;
        let parsed = parse_llm_text(&raw);
        Ok((parsed.response, "rag_only", parsed.confidence, Vec::new()))
    }

    async fn run_agentic(&self, message: &str) -> Result<(String, &'static str, f32, Vec<String>)> {
        let mut tools_used = Vec::new();
        let mut transcript = format!("Operator: {message}");
        let catalog_desc = self.tools.names().join(", ");

        for _ in 0..self.config.max_agentic_steps {
            let prompt = format!(
                "You may call one tool from [{catalog_desc}] or give a final answer. \
                 Respond as JSON either {{\"tool_call\": {{\"name\":..., \"arguments\": {{}}}}}} \
                 or {{\"response\": ..., \"confidence\": 0.0-1.0}}.\n\n{transcript}"
            );
            let params = CompletionParams { json_mode: true, ..Default::default() };
            let raw = self.llm.complete(&prompt, &params).await?;

            match serde_json::from_str::<AgenticStep>(&raw) {
                Ok(AgenticStep::Final { response, confidence }) => {
                    return Ok((response, "agentic", confidence.clamp(0.0, 1.0), tools_used));
                }
                Ok(AgenticStep::Tool { tool_call }) => {
                    let Some(tool) = self.tools.find(&tool_call.name) else {
                        transcript.push_str(&format!("\nTool error: unknown tool {}", tool_call.name));
                        continue;
                    };
                    tools_used.push(tool_call.name.clone());
                    match tool.invoke(&tool_call.arguments).await {
                        Ok(output) => transcript.push_str(&format!("\nTool {} result: {output}", tool_call.name)),
                        Err(e) => transcript.push_str(&format!("\nTool {} failed: {e}", tool_call.name)),
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "agentic step returned unparseable JSON, treating as final");
                    return Ok((raw, "agentic", 0.3, tools_used));
                }
            }
        }

        Ok(("Unable to resolve within the step budget.".to_string(), "agentic", 0.2, tools_used))
    }

    async fn run_diagnostic(&self, message: &str, user_id: &str) -> Result<(String, &'static str, f32, Vec<String>)> {
        let outcome = self.diagnostic.run(message, user_id).await?;
        let (response, confidence) = match outcome {
            DiagnosticOutcome::Resolved { summary, confidence, .. } => (summary, confidence),
            DiagnosticOutcome::Partial { summary, confidence, .. } => (summary, confidence),
            DiagnosticOutcome::PendingApproval { summary, approval_id, .. } => {
                (format!("{summary} (awaiting approval: {approval_id})"), 0.9)
            }
            DiagnosticOutcome::Cancelled { summary } => (summary, 0.0),
        };
        Ok((response, "diagnostic", confidence, Vec::new()))
    }

    async fn quarantine_if_needed(
        &self,
        message: &str,
        response: &str,
        confidence: f32,
    ) -> Result<(bool, Option<String>)> {
        if confidence >= self.config.quarantine_threshold {
            return Ok((false, None));
        }
        let memory_id = Uuid::new_v4().to_string();
        let record = AuditRecord::new(
            memory_id.clone(),
            message.to_string(),
            response.to_string(),
            format!("response confidence {confidence:.2} below quarantine threshold"),
            confidence,
        );
        self.audit.add(record).await.map_err(AgentError::from)?;
        Ok((true, Some(memory_id)))
    }
}

fn parse_llm_text(raw: &str) -> LlmTextResponse {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "rag response was not valid JSON, using raw text at low confidence");
        LlmTextResponse { response: raw.to_string(), confidence: 0.3 }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticConfig;
    use async_trait::async_trait;
    use resync_audit::InMemoryAuditQueue;
    use resync_core::capabilities::{EmbeddingProvider, JobStatus};
    use resync_core::{CoreError, CoreResult};
    use resync_graph::{CriticalJob, GraphError, ImpactAnalysis, ImpactLevel, KnowledgeGraph};
    use resync_lock::InMemoryLock;
    use resync_memory::{InMemoryLongTermStore, LongTermMemoryManager, MemoryExtractor};
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

    struct FakeLlm {
        response: String,
    }
    #[async_trait]
    impl LlmProvider for FakeLlm {
        fn name(&self) -> &str {
            "fake"
        }
        async fn complete(&self, _prompt: &str, _params: &CompletionParams) -> CoreResult<String> {
            Ok(self.response.clone())
        }
    }

    struct FakeTws;
    #[async_trait]
    impl resync_core::capabilities::TwsClient for FakeTws {
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

    fn build_router(llm_response: &str) -> AgentRouter {
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
        let llm: Arc<dyn LlmProvider> = Arc::new(FakeLlm { response: llm_response.to_string() });
        let tws: Arc<dyn resync_core::capabilities::TwsClient> = Arc::new(FakeTws);
        let tools = ToolCatalog::new(tws);
        let graph: Arc<dyn KnowledgeGraph> = Arc::new(EmptyGraph);
        let lock: Arc<dyn resync_lock::DistributedLock> = Arc::new(InMemoryLock::new());
        let audit: Arc<dyn AuditQueue> = Arc::new(InMemoryAuditQueue::new());
        let long_term = Arc::new(LongTermMemoryManager::new(
            Arc::new(InMemoryLongTermStore::new()),
            MemoryExtractor::new(llm.clone()),
            embedder.clone(),
        ));
        let diagnostic = DiagnosticGraph::new(
            hybrid.clone(),
            graph,
            long_term,
            embedder.clone(),
            llm.clone(),
            ToolCatalog::new(Arc::new(FakeTws)),
            audit.clone(),
            lock,
            DiagnosticConfig::default(),
        );
        AgentRouter::new(
            IntentClassifier::new(None),
            hybrid,
            llm,
            tools,
            diagnostic,
            audit,
            AgentRouterConfig::default(),
        )
    }

    #[tokio::test]
    async fn greeting_dispatches_to_rag_only() {
        let router = build_router(r#"{"response":"Hello!","confidence":0.95}"#);
        let result = router.route("hello", "operator-1", None).await.unwrap();
        assert_eq!(result.handler, "rag_only");
        assert_eq!(result.response, "Hello!");
        assert!(!result.requires_approval);
    }

    #[tokio::test]
    async fn low_confidence_response_is_quarantined() {
        let router = build_router(r#"{"response":"Maybe it's fine","confidence":0.2}"#);
        let result = router.route("hello", "operator-1", None).await.unwrap();
        assert!(result.requires_approval);
        assert!(result.approval_id.is_some());
    }

    #[tokio::test]
    async fn forced_mode_overrides_classification() {
        let router = build_router(r#"{"response":"done","confidence":0.9}"#);
        let result = router.route("hello", "operator-1", Some(RoutingMode::RagOnly)).await.unwrap();
        assert_eq!(result.routing_mode, RoutingMode::RagOnly);
    }
}
