use thiserror::Error;

/// Rejected session operations. State is left untouched whenever one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session already started")]
    AlreadyStarted,

    #[error("session has not been started")]
    NotStarted,

    #[error("session is closed")]
    SessionClosed,

    #[error("question index {index} out of range (assessment has {len} questions)")]
    QuestionOutOfRange { index: usize, len: usize },

    #[error("invalid answer payload: {0}")]
    InvalidAnswerPayload(String),

    #[error("session must be started from within a tokio runtime")]
    RuntimeUnavailable,
}

/// Outcome of an attempt gate check that did not produce a grant.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("an active subscription is required for this assessment")]
    SubscriptionRequired,

    #[error("all {max} attempts have been used ({used} used)")]
    AttemptsExhausted { used: u32, max: u32 },

    #[error("assessment definition is invalid: {0}")]
    InvalidAssessment(#[from] DefinitionError),

    #[error("catalog provider failed: {0}")]
    Catalog(#[from] anyhow::Error),
}

impl GateError {
    /// Returns `true` for denials the user can act on (upgrade, wait).
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            GateError::SubscriptionRequired | GateError::AttemptsExhausted { .. }
        )
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            GateError::SubscriptionRequired => "subscription_required",
            GateError::AttemptsExhausted { .. } => "attempts_exhausted",
            GateError::InvalidAssessment(_) => "invalid_assessment",
            GateError::Catalog(_) => "catalog_error",
        }
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct DefinitionError(#[from] pub validator::ValidationErrors);
