//! The tool catalog available to the agentic loop and to `DiagnosticGraph`'s
//! EXECUTE phase (spec §4.13, §4.14).

use async_trait::async_trait;
use resync_core::capabilities::TwsClient;
use serde_json::Value;
use std::sync::Arc;

/// Whether invoking a tool can mutate scheduler state. Write tools require
/// an approval gate before `AgentRouter`/`DiagnosticGraph` will execute
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Read,
    Write,
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone)]
pub struct ToolResult {
    pub name: String,
    pub output: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> ToolKind;
    async fn invoke(&self, arguments: &Value) -> resync_core::CoreResult<Value>;
}

fn job_arg(arguments: &Value) -> resync_core::CoreResult<String> {
    arguments
        .get("job_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| resync_core::CoreError::Validation("missing job_id argument".to_string()))
}

pub struct StatusCheckTool {
    tws: Arc<dyn TwsClient>,
}

impl StatusCheckTool {
    #[must_use]
    pub fn new(tws: Arc<dyn TwsClient>) -> Self {
        Self { tws }
    }
}

#[async_trait]
impl Tool for StatusCheckTool {
    fn name(&self) -> &str {
        "status_check"
    }
    fn kind(&self) -> ToolKind {
        ToolKind::Read
    }
    async fn invoke(&self, arguments: &Value) -> resync_core::CoreResult<Value> {
        let job_id = job_arg(arguments)?;
        let status = self.tws.job_status(&job_id).await?;
        Ok(serde_json::to_value(status).unwrap_or(Value::Null))
    }
}

pub struct JobLookupTool {
    tws: Arc<dyn TwsClient>,
}

impl JobLookupTool {
    #[must_use]
    pub fn new(tws: Arc<dyn TwsClient>) -> Self {
        Self { tws }
    }
}

#[async_trait]
impl Tool for JobLookupTool {
    fn name(&self) -> &str {
        "job_lookup"
    }
    fn kind(&self) -> ToolKind {
        ToolKind::Read
    }
    async fn invoke(&self, arguments: &Value) -> resync_core::CoreResult<Value> {
        let job_id = job_arg(arguments)?;
        let dependencies = self.tws.job_dependencies(&job_id).await?;
        let resources = self.tws.job_resources(&job_id).await?;
        Ok(serde_json::json!({ "dependencies": dependencies, "resources": resources }))
    }
}

pub struct RerunJobTool {
    tws: Arc<dyn TwsClient>,
}

impl RerunJobTool {
    #[must_use]
    pub fn new(tws: Arc<dyn TwsClient>) -> Self {
        Self { tws }
    }
}

#[async_trait]
impl Tool for RerunJobTool {
    fn name(&self) -> &str {
        "rerun_job"
    }
    fn kind(&self) -> ToolKind {
        ToolKind::Write
    }
    async fn invoke(&self, arguments: &Value) -> resync_core::CoreResult<Value> {
        let job_id = job_arg(arguments)?;
        self.tws.rerun_job(&job_id).await?;
        Ok(serde_json::json!({ "job_id": job_id, "action": "rerun" }))
    }
}

pub struct KillJobTool {
    tws: Arc<dyn TwsClient>,
}

impl KillJobTool {
    #[must_use]
    pub fn new(tws: Arc<dyn TwsClient>) -> Self {
        Self { tws }
    }
}

#[async_trait]
impl Tool for KillJobTool {
    fn name(&self) -> &str {
        "kill_job"
    }
    fn kind(&self) -> ToolKind {
        ToolKind::Write
    }
    async fn invoke(&self, arguments: &Value) -> resync_core::CoreResult<Value> {
        let job_id = job_arg(arguments)?;
        self.tws.kill_job(&job_id).await?;
        Ok(serde_json::json!({ "job_id": job_id, "action": "kill" }))
    }
}

/// The catalog the LLM is shown in the agentic loop; tool calls are
/// resolved by name from here.
pub struct ToolCatalog {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolCatalog {
    #[must_use]
    pub fn new(tws: Arc<dyn TwsClient>) -> Self {
        Self {
            tools: vec![
                Arc::new(StatusCheckTool::new(tws.clone())),
                Arc::new(JobLookupTool::new(tws.clone())),
                Arc::new(RerunJobTool::new(tws.clone())),
                Arc::new(KillJobTool::new(tws)),
            ],
        }
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}
