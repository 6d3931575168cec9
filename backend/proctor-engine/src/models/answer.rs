use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::SessionError;

/// A test-taker response. Which shape is expected depends on the question,
/// but the store accepts either for any question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Choice {
        #[serde(rename = "choiceIndex")]
        choice_index: usize,
    },
    Text {
        text: String,
    },
}

impl Answer {
    pub fn choice(choice_index: usize) -> Self {
        Answer::Choice { choice_index }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Answer::Text { text: text.into() }
    }

    /// Parses a raw UI payload (`{"choiceIndex": n}` or `{"text": "..."}`).
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, SessionError> {
        serde_json::from_value(payload.clone()).map_err(|_| {
            SessionError::InvalidAnswerPayload(format!(
                "expected {{\"choiceIndex\": <non-negative integer>}} or {{\"text\": <string>}}, got {}",
                payload
            ))
        })
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Answer::Choice { .. } => "choice",
            Answer::Text { .. } => "text",
        }
    }
}

/// Current responses keyed by question index. Re-answering overwrites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerStore {
    entries: BTreeMap<usize, Answer>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `answer` for `question_index`, returning the replaced answer.
    pub fn put(&mut self, question_index: usize, answer: Answer) -> Option<Answer> {
        self.entries.insert(question_index, answer)
    }

    pub fn get(&self, question_index: usize) -> Option<&Answer> {
        self.entries.get(&question_index)
    }

    pub fn answered_count(&self) -> usize {
        self.entries.len()
    }
}
