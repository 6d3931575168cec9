use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::attempt_gate::CatalogProvider;
use crate::models::{AssessmentDefinition, AttemptRecord, UserContext};

/// Catalog held entirely in memory. Attempt counters are keyed by
/// `(assessment_id, user_id)`.
#[derive(Default)]
pub struct InMemoryCatalog {
    assessments: RwLock<Vec<AssessmentDefinition>>,
    attempts: RwLock<HashMap<(String, String), AttemptRecord>>,
}

impl InMemoryCatalog {
    pub fn new(assessments: Vec<AssessmentDefinition>) -> Self {
        Self {
            assessments: RwLock::new(assessments),
            attempts: RwLock::new(HashMap::new()),
        }
    }

    pub fn add(&self, assessment: AssessmentDefinition) {
        self.assessments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(assessment);
    }

    pub fn attempt_record(&self, assessment_id: &str, user_id: &str) -> Option<AttemptRecord> {
        self.attempts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(assessment_id.to_string(), user_id.to_string()))
            .cloned()
    }

    pub fn set_attempts_used(&self, assessment_id: &str, user_id: &str, attempts_used: u32) {
        self.attempts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (assessment_id.to_string(), user_id.to_string()),
                AttemptRecord {
                    assessment_id: assessment_id.to_string(),
                    user_id: user_id.to_string(),
                    attempts_used,
                },
            );
    }
}

#[async_trait]
impl CatalogProvider for InMemoryCatalog {
    async fn list_assessments(
        &self,
        _user: &UserContext,
    ) -> anyhow::Result<Vec<AssessmentDefinition>> {
        Ok(self
            .assessments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn attempts_used(&self, assessment_id: &str, user: &UserContext) -> anyhow::Result<u32> {
        Ok(self
            .attempt_record(assessment_id, &user.user_id)
            .map(|record| record.attempts_used)
            .unwrap_or(0))
    }

    async fn increment_attempts(
        &self,
        assessment_id: &str,
        user: &UserContext,
    ) -> anyhow::Result<()> {
        let mut attempts = self.attempts.write().unwrap_or_else(PoisonError::into_inner);
        let record = attempts
            .entry((assessment_id.to_string(), user.user_id.clone()))
            .or_insert_with(|| AttemptRecord {
                assessment_id: assessment_id.to_string(),
                user_id: user.user_id.clone(),
                attempts_used: 0,
            });
        record.attempts_used += 1;
        tracing::debug!(
            assessment_id,
            user_id = %user.user_id,
            attempts_used = record.attempts_used,
            "Attempt counter incremented"
        );
        Ok(())
    }
}
