use serde::{Deserialize, Serialize};
use validator::Validate;

use super::question::Question;
use crate::error::DefinitionError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentKind {
    Quiz,
    Exam,
}

impl AssessmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentKind::Quiz => "quiz",
            AssessmentKind::Exam => "exam",
        }
    }
}

/// One timed test as supplied by the catalog. Questions are fixed for the
/// lifetime of any session started from it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentDefinition {
    #[validate(length(min = 1, message = "Assessment id must not be empty"))]
    pub id: String,

    pub title: String,

    #[validate(length(min = 1, message = "Assessment must contain at least one question"))]
    #[validate(nested)]
    pub questions: Vec<Question>,

    #[validate(range(min = 1, message = "Time limit must be positive"))]
    pub time_limit_seconds: u32,

    pub kind: AssessmentKind,

    #[serde(default)]
    pub requires_subscription: bool,

    /// Only enforced for exams.
    #[serde(default)]
    pub max_attempts: u32,
}

impl AssessmentDefinition {
    /// Validates the definition and every question in it.
    pub fn check(&self) -> Result<(), DefinitionError> {
        self.validate()?;
        Ok(())
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn last_index(&self) -> usize {
        self.questions.len().saturating_sub(1)
    }

    pub fn is_exam(&self) -> bool {
        self.kind == AssessmentKind::Exam
    }
}
