use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::error::GateError;
use crate::metrics::ATTEMPT_GATE_DECISIONS_TOTAL;
use crate::models::{AssessmentDefinition, UserContext};

/// Source of assessments and per-user attempt counters.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn list_assessments(&self, user: &UserContext)
        -> anyhow::Result<Vec<AssessmentDefinition>>;

    async fn attempts_used(&self, assessment_id: &str, user: &UserContext) -> anyhow::Result<u32>;

    async fn increment_attempts(&self, assessment_id: &str, user: &UserContext)
        -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Eligibility {
    Eligible,
    SubscriptionRequired,
    AttemptsExhausted { used: u32, max: u32 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentListing {
    pub assessment: AssessmentDefinition,
    pub eligibility: Eligibility,
    pub attempts_used: Option<u32>,
}

/// Permission to run one session. Exams have already had their counter
/// incremented by the time this exists.
#[derive(Debug, Clone)]
pub struct AttemptGrant {
    pub assessment: Arc<AssessmentDefinition>,
    pub user: UserContext,
    /// 1-based attempt ordinal for exams; quizzes are not counted.
    pub attempt_number: Option<u32>,
    pub granted_at: DateTime<Utc>,
}

pub struct AttemptGate {
    catalog: Arc<dyn CatalogProvider>,
}

impl AttemptGate {
    pub fn new(catalog: Arc<dyn CatalogProvider>) -> Self {
        Self { catalog }
    }

    /// Checks eligibility and, for exams, consumes one attempt before the
    /// grant is returned.
    pub async fn authorize(
        &self,
        assessment: Arc<AssessmentDefinition>,
        user: &UserContext,
    ) -> Result<AttemptGrant, GateError> {
        assessment.check()?;

        let (eligibility, used) = self.eligibility(&assessment, user).await?;
        match eligibility {
            Eligibility::Eligible => {}
            Eligibility::SubscriptionRequired => {
                return Err(self.deny(&assessment, user, GateError::SubscriptionRequired));
            }
            Eligibility::AttemptsExhausted { used, max } => {
                return Err(self.deny(
                    &assessment,
                    user,
                    GateError::AttemptsExhausted { used, max },
                ));
            }
        }

        let attempt_number = match used {
            Some(used) => {
                self.catalog
                    .increment_attempts(&assessment.id, user)
                    .await?;
                Some(used + 1)
            }
            None => None,
        };

        ATTEMPT_GATE_DECISIONS_TOTAL
            .with_label_values(&["authorized"])
            .inc();
        tracing::info!(
            assessment_id = %assessment.id,
            user_id = %user.user_id,
            kind = assessment.kind.as_str(),
            attempt_number = ?attempt_number,
            "Attempt authorized"
        );

        Ok(AttemptGrant {
            assessment,
            user: user.clone(),
            attempt_number,
            granted_at: Utc::now(),
        })
    }

    /// Lists the catalog with an eligibility verdict per assessment. Nothing
    /// is consumed.
    pub async fn available_assessments(
        &self,
        user: &UserContext,
    ) -> anyhow::Result<Vec<AssessmentListing>> {
        let assessments = self.catalog.list_assessments(user).await?;
        let mut listings = Vec::with_capacity(assessments.len());

        for assessment in assessments {
            let (eligibility, attempts_used) = self.eligibility(&assessment, user).await?;
            listings.push(AssessmentListing {
                assessment,
                eligibility,
                attempts_used,
            });
        }

        Ok(listings)
    }

    /// Returns the verdict and, for exams, the attempts used so far.
    async fn eligibility(
        &self,
        assessment: &AssessmentDefinition,
        user: &UserContext,
    ) -> anyhow::Result<(Eligibility, Option<u32>)> {
        if assessment.requires_subscription && !user.has_active_subscription {
            return Ok((Eligibility::SubscriptionRequired, None));
        }

        if !assessment.is_exam() {
            return Ok((Eligibility::Eligible, None));
        }

        let used = self.catalog.attempts_used(&assessment.id, user).await?;
        if used >= assessment.max_attempts {
            return Ok((
                Eligibility::AttemptsExhausted {
                    used,
                    max: assessment.max_attempts,
                },
                Some(used),
            ));
        }

        Ok((Eligibility::Eligible, Some(used)))
    }

    fn deny(&self, assessment: &AssessmentDefinition, user: &UserContext, err: GateError) -> GateError {
        ATTEMPT_GATE_DECISIONS_TOTAL
            .with_label_values(&[err.reason_code()])
            .inc();
        tracing::warn!(
            assessment_id = %assessment.id,
            user_id = %user.user_id,
            reason = err.reason_code(),
            "Attempt denied"
        );
        err
    }
}
