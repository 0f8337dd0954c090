//! Capability traits for out-of-core dependencies (spec §1, §6).
//!
//! Concrete HTTP clients for embedding models, LLMs, and the TWS API are
//! explicitly out of scope; the core only depends on these minimal method
//! sets so that production and test implementations can be swapped at
//! startup (spec §9 "dynamic dispatch" design note).

use crate::error::CoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `embed`/`embed_batch` capability (spec §6).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Dimensionality of produced vectors. Implementations must be
    /// internally consistent: every call returns vectors of this length.
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
        Ok(self.embed_batch(std::slice::from_ref(&text.to_string())).await?.remove(0))
    }

    async fn embed_batch(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>>;
}

/// Parameters accepted by an LLM `complete` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionParams {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Ask the provider to return a JSON object rather than free text.
    pub json_mode: bool,
}

/// `complete(prompt, params) -> text | json` capability (spec §6).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str, params: &CompletionParams) -> CoreResult<String>;
}

/// Job status as read from the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub state: String,
    pub return_code: Option<i32>,
    pub last_run: Option<DateTime<Utc>>,
}

/// Read/write TWS scheduler capability (spec §6). Write operations are only
/// ever invoked by tools after an approval gate (spec §4.13, §4.14).
#[async_trait]
pub trait TwsClient: Send + Sync {
    async fn job_status(&self, job_id: &str) -> CoreResult<JobStatus>;
    async fn job_dependencies(&self, job_id: &str) -> CoreResult<Vec<String>>;
    async fn job_resources(&self, job_id: &str) -> CoreResult<Vec<String>>;
    async fn workstation_state(&self, workstation: &str) -> CoreResult<String>;
    /// All job ids known to the scheduler, used to build a full dependency
    /// snapshot for `critical_jobs` centrality ranking.
    async fn all_job_ids(&self) -> CoreResult<Vec<String>>;

    async fn rerun_job(&self, job_id: &str) -> CoreResult<()>;
    async fn kill_job(&self, job_id: &str) -> CoreResult<()>;
    async fn release_job(&self, job_id: &str) -> CoreResult<()>;
}
