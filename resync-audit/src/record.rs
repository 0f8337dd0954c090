//! The audit record and its status lifecycle (spec §3, §4.9).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Pending,
    Approved,
    Rejected,
}

impl AuditStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for AuditStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown audit status: {other}")),
        }
    }
}

/// A memory record awaiting human review (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub memory_id: String,
    pub user_query: String,
    pub agent_response: String,
    pub ia_audit_reason: String,
    pub ia_audit_confidence: f32,
    pub status: AuditStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl AuditRecord {
    #[must_use]
    pub fn new(
        memory_id: impl Into<String>,
        user_query: impl Into<String>,
        agent_response: impl Into<String>,
        ia_audit_reason: impl Into<String>,
        ia_audit_confidence: f32,
    ) -> Self {
        Self {
            memory_id: memory_id.into(),
            user_query: user_query.into(),
            agent_response: agent_response.into(),
            ia_audit_reason: ia_audit_reason.into(),
            ia_audit_confidence,
            status: AuditStatus::Pending,
            created_at: Utc::now(),
            reviewed_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditMetrics {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
}
