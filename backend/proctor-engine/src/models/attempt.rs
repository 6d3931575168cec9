use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    Submitted,
    TimeExpired,
    IntegrityEscalation,
}

impl CompletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionReason::Submitted => "submitted",
            CompletionReason::TimeExpired => "time_expired",
            CompletionReason::IntegrityEscalation => "integrity_escalation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionScore {
    pub question_id: String,
    pub earned: u32,
    pub possible: u32,
    /// Essays: `earned` stays 0 until a person grades them.
    #[serde(default)]
    pub needs_manual_grading: bool,
}

/// Result of the scoring function, before session metadata is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub earned_points: u32,
    pub total_points: u32,
    pub percentage: u32,
    pub answered_count: usize,
    pub per_question: Vec<QuestionScore>,
}

/// Immutable record of one finished session, handed to the result sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredAttempt {
    pub session_id: Uuid,
    pub assessment_id: String,
    pub user_id: String,
    pub earned_points: u32,
    pub total_points: u32,
    pub percentage: u32,
    pub answered_count: usize,
    pub violation_count: u32,
    pub completion_reason: CompletionReason,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub per_question: Vec<QuestionScore>,
}

/// Per-user attempt counter kept by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub assessment_id: String,
    pub user_id: String,
    pub attempts_used: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Pass,
    Fail,
}

/// Caller-side pass/fail policy; the scoring engine never applies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassPolicy {
    pub threshold_percent: u32,
}

impl Default for PassPolicy {
    fn default() -> Self {
        Self {
            threshold_percent: 70,
        }
    }
}

impl PassPolicy {
    pub fn grade(&self, attempt: &ScoredAttempt) -> Grade {
        if attempt.percentage >= self.threshold_percent {
            Grade::Pass
        } else {
            Grade::Fail
        }
    }
}
