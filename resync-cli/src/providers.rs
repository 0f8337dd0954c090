//! Stand-in capability implementations used when the process is not wired
//! to a real embedding model, LLM, or TWS scheduler (spec §1, §6 —
//! these providers are explicitly out of core; production deployments
//! inject their own).

use async_trait::async_trait;
use resync_core::capabilities::{CompletionParams, EmbeddingProvider, JobStatus, LlmProvider, TwsClient};
use resync_core::{CoreError, CoreResult};
use sha2::{Digest, Sha256};

/// Deterministic bag-of-bytes embedding so retrieval has something
/// reproducible to rank against without a live model endpoint. Not fit
/// for production relevance — replace with a real provider via
/// configuration before deploying.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &str {
        "hash-embedder (demo, not for production ranking quality)"
    }

    fn dimensions(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_embedding(t, self.dim)).collect())
    }
}

fn hash_embedding(text: &str, dim: usize) -> Vec<f32> {
    let mut vector = vec![0.0_f32; dim];
    let mut counter: u32 = 0;
    while (counter as usize) * 32 < dim {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(counter.to_le_bytes());
        let digest = hasher.finalize();
        for (i, byte) in digest.iter().enumerate() {
            let idx = counter as usize * 32 + i;
            if idx >= dim {
                break;
            }
            vector[idx] = (*byte as f32 / 255.0) * 2.0 - 1.0;
        }
        counter += 1;
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Echoes a templated response instead of calling a real model. Good
/// enough to exercise the routing and audit plumbing end to end; not a
/// source of real answers.
pub struct EchoLlm;

#[async_trait]
impl LlmProvider for EchoLlm {
    fn name(&self) -> &str {
        "echo-llm (demo, no model backing)"
    }

    async fn complete(&self, prompt: &str, params: &CompletionParams) -> CoreResult<String> {
        let confidence = 0.5;
        if params.json_mode {
            let truncated: String = prompt.chars().rev().take(120).collect::<String>().chars().rev().collect();
            Ok(serde_json::json!({
                "response": format!("[demo] no model configured; echoing tail of prompt: {truncated}"),
                "confidence": confidence,
                "summary": "no model configured",
                "intent": "GENERAL",
                "actions": [],
            })
            .to_string())
        } else {
            Ok(format!("[demo] no model configured for prompt: {prompt}"))
        }
    }
}

/// Returns `Integration` errors for every call; `KnowledgeGraph` and tool
/// invocations degrade to empty results or surfaced tool failures
/// accordingly, never crashing the process (spec §4.5, §4.13).
pub struct UnconfiguredTwsClient;

#[async_trait]
impl TwsClient for UnconfiguredTwsClient {
    async fn job_status(&self, _job_id: &str) -> CoreResult<JobStatus> {
        Err(not_configured())
    }
    async fn job_dependencies(&self, _job_id: &str) -> CoreResult<Vec<String>> {
        Err(not_configured())
    }
    async fn job_resources(&self, _job_id: &str) -> CoreResult<Vec<String>> {
        Err(not_configured())
    }
    async fn workstation_state(&self, _workstation: &str) -> CoreResult<String> {
        Err(not_configured())
    }
    async fn all_job_ids(&self) -> CoreResult<Vec<String>> {
        Err(not_configured())
    }
    async fn rerun_job(&self, _job_id: &str) -> CoreResult<()> {
        Err(not_configured())
    }
    async fn kill_job(&self, _job_id: &str) -> CoreResult<()> {
        Err(not_configured())
    }
    async fn release_job(&self, _job_id: &str) -> CoreResult<()> {
        Err(not_configured())
    }
}

fn not_configured() -> CoreError {
    CoreError::Integration("no TWS client configured for this process".to_string())
}
