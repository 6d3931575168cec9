use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

const TRUE_FALSE_OPTIONS: [&str; 2] = ["True", "False"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    SingleChoice,
    TrueFalse,
    ShortAnswer,
    Essay,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::SingleChoice => "single-choice",
            QuestionKind::TrueFalse => "true-false",
            QuestionKind::ShortAnswer => "short-answer",
            QuestionKind::Essay => "essay",
        }
    }

    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionKind::SingleChoice | QuestionKind::TrueFalse)
    }

    /// Essays need a human grader; everything else is scored automatically.
    pub fn is_auto_graded(&self) -> bool {
        !matches!(self, QuestionKind::Essay)
    }
}

/// Reference answer, shaped by the question kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerKey {
    Choice {
        index: usize,
    },
    Text {
        text: String,
    },
    /// Graded by a person outside the engine (essays).
    #[default]
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_answer_key"))]
pub struct Question {
    #[validate(length(min = 1, message = "Question id must not be empty"))]
    pub id: String,

    #[serde(rename = "type")]
    pub kind: QuestionKind,

    #[validate(length(min = 1, message = "Prompt must not be empty"))]
    pub prompt: String,

    /// Ordered options for choice questions. True/false questions may leave
    /// this empty and get the default pair.
    #[serde(default)]
    pub options: Vec<String>,

    #[serde(default)]
    pub answer_key: AnswerKey,

    #[validate(range(min = 1, max = 10000, message = "Question must be worth between 1 and 10000 points"))]
    pub points: u32,

    #[serde(default)]
    pub explanation: String,
}

impl Question {
    /// Options as presented to the test-taker.
    pub fn choices(&self) -> Vec<&str> {
        if self.kind == QuestionKind::TrueFalse && self.options.is_empty() {
            return TRUE_FALSE_OPTIONS.to_vec();
        }
        self.options.iter().map(String::as_str).collect()
    }

    /// Test-taker facing projection: no answer key, no explanation.
    pub fn view(&self, index: usize) -> QuestionView {
        QuestionView {
            index,
            id: self.id.clone(),
            kind: self.kind,
            prompt: self.prompt.clone(),
            options: self.choices().into_iter().map(str::to_string).collect(),
            points: self.points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub index: usize,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Vec<String>,
    pub points: u32,
}

fn validate_answer_key(question: &Question) -> Result<(), ValidationError> {
    match (question.kind, &question.answer_key) {
        (QuestionKind::SingleChoice, AnswerKey::Choice { .. }) if question.options.len() < 2 => {
            Err(ValidationError::new("too_few_options")
                .with_message(Cow::from("Single-choice questions need at least two options")))
        }
        (kind, AnswerKey::Choice { index }) if kind.is_choice() => {
            if *index < question.choices().len() {
                Ok(())
            } else {
                Err(ValidationError::new("answer_key_out_of_range")
                    .with_message(Cow::from("Answer key points past the last option")))
            }
        }
        (QuestionKind::ShortAnswer, AnswerKey::Text { text }) if !text.is_empty() => Ok(()),
        (QuestionKind::Essay, _) => Ok(()),
        _ => Err(ValidationError::new("answer_key_mismatch")
            .with_message(Cow::from("Answer key does not match the question type"))),
    }
}
