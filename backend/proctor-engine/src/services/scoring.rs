//! Scoring engine: a pure function from questions and answers to a score.

use crate::models::{
    Answer, AnswerKey, AnswerStore, Question, QuestionKind, QuestionScore, ScoreBreakdown,
};

/// Scores every question against the stored answers.
pub fn score(questions: &[Question], answers: &AnswerStore) -> ScoreBreakdown {
    let per_question: Vec<QuestionScore> = questions
        .iter()
        .enumerate()
        .map(|(index, question)| QuestionScore {
            question_id: question.id.clone(),
            earned: earned_points(question, answers.get(index)),
            possible: question.points,
            needs_manual_grading: !question.kind.is_auto_graded(),
        })
        .collect();

    // Saturates so unchecked definitions cannot panic mid-finalize.
    let earned_points = per_question
        .iter()
        .fold(0u32, |acc, q| acc.saturating_add(q.earned));
    let total_points = per_question
        .iter()
        .fold(0u32, |acc, q| acc.saturating_add(q.possible));

    ScoreBreakdown {
        earned_points,
        total_points,
        percentage: percentage(earned_points, total_points),
        answered_count: answers.answered_count(),
        per_question,
    }
}

/// Points earned on a single question. Wrong-shaped answers earn nothing.
pub fn earned_points(question: &Question, answer: Option<&Answer>) -> u32 {
    let Some(answer) = answer else {
        return 0;
    };

    let correct = match (question.kind, &question.answer_key, answer) {
        (
            QuestionKind::SingleChoice | QuestionKind::TrueFalse,
            AnswerKey::Choice { index },
            Answer::Choice { choice_index },
        ) => choice_index == index,
        // Containment, not equality: "It uses a Virtual DOM" matches "virtual dom".
        (QuestionKind::ShortAnswer, AnswerKey::Text { text: key }, Answer::Text { text }) => {
            text.to_lowercase().contains(&key.to_lowercase())
        }
        _ => false,
    };

    if correct {
        question.points
    } else {
        0
    }
}

/// `round(100 * earned / total)` with halves rounded up.
pub fn percentage(earned: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let earned = u64::from(earned);
    let total = u64::from(total);
    ((200 * earned + total) / (2 * total)) as u32
}
