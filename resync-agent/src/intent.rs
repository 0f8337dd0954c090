//! Two-stage intent classification: keyword rules, then an optional LLM
//! pass when rule confidence is low (spec §4.12).

use once_cell::sync::Lazy;
use regex::Regex;
use resync_core::capabilities::{CompletionParams, LlmProvider};
use resync_core::entities::{extract_entities, ExtractedEntities};
use serde::Deserialize;
use std::sync::Arc;

const LLM_STAGE_THRESHOLD: f32 = 0.6;
const CLARIFICATION_THRESHOLD: f32 = 0.4;
const TIE_MARGIN: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Status,
    Troubleshooting,
    JobManagement,
    Monitoring,
    Analysis,
    Reporting,
    Greeting,
    General,
}

impl Intent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => "STATUS",
            Self::Troubleshooting => "TROUBLESHOOTING",
            Self::JobManagement => "JOB_MANAGEMENT",
            Self::Monitoring => "MONITORING",
            Self::Analysis => "ANALYSIS",
            Self::Reporting => "REPORTING",
            Self::Greeting => "GREETING",
            Self::General => "GENERAL",
        }
    }

    /// Mode mapping per spec §4.12.
    #[must_use]
    pub fn suggested_routing(self) -> RoutingMode {
        match self {
            Self::Greeting | Self::General | Self::Reporting => RoutingMode::RagOnly,
            Self::Status | Self::JobManagement | Self::Monitoring | Self::Analysis => RoutingMode::Agentic,
            Self::Troubleshooting => RoutingMode::Diagnostic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    RagOnly,
    Agentic,
    Diagnostic,
}

#[derive(Debug, Clone)]
pub struct IntentClassification {
    pub primary_intent: Intent,
    pub confidence: f32,
    pub secondary_intents: Vec<(Intent, f32)>,
    pub entities: ExtractedEntities,
    pub requires_tools: bool,
    pub needs_clarification: bool,
    pub suggested_routing: RoutingMode,
}

struct IntentPattern {
    intent: Intent,
    keywords: &'static [&'static str],
}

static PATTERNS: Lazy<Vec<IntentPattern>> = Lazy::new(|| {
    vec![
        IntentPattern { intent: Intent::Greeting, keywords: &["hello", "hi", "hey", "good morning", "good afternoon"] },
        IntentPattern {
            intent: Intent::Troubleshooting,
            keywords: &["abend", "failed", "failure", "error", "broken", "not working", "stuck", "crash", "rc="],
        },
        IntentPattern {
            intent: Intent::JobManagement,
            keywords: &["rerun", "restart", "kill", "release", "hold", "submit", "cancel"],
        },
        IntentPattern { intent: Intent::Status, keywords: &["status", "state", "is running", "running?", "what is the status"] },
        IntentPattern { intent: Intent::Monitoring, keywords: &["monitor", "watch", "alert", "threshold", "dashboard"] },
        IntentPattern {
            intent: Intent::Analysis,
            keywords: &["why", "root cause", "analyze", "analysis", "trend", "compare", "impact"],
        },
        IntentPattern { intent: Intent::Reporting, keywords: &["report", "summary", "summarize", "export"] },
    ]
});

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn rule_stage(message: &str) -> Vec<(Intent, f32)> {
    let normalized = WHITESPACE_RUN.replace_all(&message.to_lowercase(), " ").to_string();
    let mut scores: Vec<(Intent, f32)> = PATTERNS
        .iter()
        .map(|p| {
            let hits = p.keywords.iter().filter(|kw| normalized.contains(*kw)).count();
            let density = hits as f32 / p.keywords.len() as f32;
            (p.intent, density)
        })
        .filter(|(_, score)| *score > 0.0)
        .collect();

    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    if scores.is_empty() {
        scores.push((Intent::General, 0.3));
    }
    scores
}

#[derive(Debug, Deserialize)]
struct LlmIntentResponse {
    intent: String,
    confidence: f32,
}

fn parse_intent_name(name: &str) -> Option<Intent> {
    match name.to_uppercase().as_str() {
        "STATUS" => Some(Intent::Status),
        "TROUBLESHOOTING" => Some(Intent::Troubleshooting),
        "JOB_MANAGEMENT" => Some(Intent::JobManagement),
        "MONITORING" => Some(Intent::Monitoring),
        "ANALYSIS" => Some(Intent::Analysis),
        "REPORTING" => Some(Intent::Reporting),
        "GREETING" => Some(Intent::Greeting),
        "GENERAL" => Some(Intent::General),
        _ => None,
    }
}

pub struct IntentClassifier {
    llm: Option<Arc<dyn LlmProvider>>,
}

impl IntentClassifier {
    #[must_use]
    pub fn new(llm: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { llm }
    }

    /// Rule stage always runs; the LLM stage only fires when rule
    /// confidence is below threshold, and wins on valid output.
    pub async fn classify(&self, message: &str) -> IntentClassification {
        let mut ranked = rule_stage(message);
        let (mut primary, mut confidence) = ranked[0];

        if confidence < LLM_STAGE_THRESHOLD {
            if let Some(llm) = &self.llm {
                if let Some((llm_intent, llm_confidence)) = self.llm_stage(llm.as_ref(), message).await {
                    primary = llm_intent;
                    confidence = llm_confidence;
                    ranked.retain(|(i, _)| *i != primary);
                    ranked.insert(0, (primary, confidence));
                }
            }
        }

        let entities = extract_entities(message);
        let tied = ranked.len() > 1 && (ranked[0].1 - ranked[1].1).abs() < TIE_MARGIN;
        let needs_clarification = confidence < CLARIFICATION_THRESHOLD || tied;
        let requires_tools = !matches!(primary, Intent::Greeting | Intent::General);

        IntentClassification {
            primary_intent: primary,
            confidence,
            secondary_intents: ranked.into_iter().skip(1).collect(),
            entities,
            requires_tools,
            needs_clarification,
            suggested_routing: primary.suggested_routing(),
        }
    }

    async fn llm_stage(&self, llm: &dyn LlmProvider, message: &str) -> Option<(Intent, f32)> {
        let prompt = format!(
            "Classify this TWS operator message into one of STATUS, TROUBLESHOOTING, \
             JOB_MANAGEMENT, MONITORING, ANALYSIS, REPORTING, GREETING, GENERAL. \
             Respond as JSON {{\"intent\": ..., \"confidence\": 0.0-1.0}}.\n\nMessage: {message}"
        );
        let params = CompletionParams { json_mode: true, ..Default::default() };
        let raw = llm.complete(&prompt, &params).await.ok()?;
        let parsed: LlmIntentResponse = serde_json::from_str(&raw).ok()?;
        let intent = parse_intent_name(&parsed.intent)?;
        Some((intent, parsed.confidence.clamp(0.0, 1.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn greeting_routes_to_rag_only() {
        let classifier = IntentClassifier::new(None);
        let result = classifier.classify("hello there").await;
        assert_eq!(result.primary_intent, Intent::Greeting);
        assert_eq!(result.suggested_routing, RoutingMode::RagOnly);
    }

    #[tokio::test]
    async fn abend_message_is_troubleshooting_and_extracts_job() {
        let classifier = IntentClassifier::new(None);
        let result = classifier.classify("AWSBH001 failed with ABEND RC=8").await;
        assert_eq!(result.primary_intent, Intent::Troubleshooting);
        assert_eq!(result.suggested_routing, RoutingMode::Diagnostic);
        assert_eq!(result.entities.jobs, vec!["AWSBH001".to_string()]);
    }

    #[tokio::test]
    async fn restart_message_is_job_management() {
        let classifier = IntentClassifier::new(None);
        let result = classifier.classify("please restart AWSBH001").await;
        assert_eq!(result.primary_intent, Intent::JobManagement);
        assert_eq!(result.suggested_routing, RoutingMode::Agentic);
    }

    #[tokio::test]
    async fn unmatched_message_falls_back_to_general_and_needs_clarification() {
        let classifier = IntentClassifier::new(None);
        let result = classifier.classify("xyzzy plugh").await;
        assert_eq!(result.primary_intent, Intent::General);
        assert!(result.needs_clarification);
    }
}
