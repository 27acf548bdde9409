//! Pure scoring of a finished exam.

use crate::model::{AnswerRecord, Question, Score, Selections};

/// Tally a finalized question list against the recorded selections.
///
/// A selection equal to the question's correct option counts as correct, any
/// other selection as incorrect, and a missing entry as unanswered.
/// Selections for questions outside `questions` are ignored.
#[must_use]
pub fn score(questions: &[Question], selections: &Selections) -> Score {
    let mut correct = 0_u32;
    let mut incorrect = 0_u32;
    let mut unanswered = 0_u32;

    for question in questions {
        match selections.get(question.id()) {
            Some(chosen) if question.is_correct(chosen) => correct = correct.saturating_add(1),
            Some(_) => incorrect = incorrect.saturating_add(1),
            None => unanswered = unanswered.saturating_add(1),
        }
    }

    Score::from_counts(correct, incorrect, unanswered)
}

/// Per-question answer rows in presentation order, skipping unanswered questions.
#[must_use]
pub fn answer_records(questions: &[Question], selections: &Selections) -> Vec<AnswerRecord> {
    questions
        .iter()
        .filter_map(|question| {
            selections.get(question.id()).map(|chosen| AnswerRecord {
                question_id: question.id(),
                selected_option: chosen.clone(),
                is_correct: question.is_correct(chosen),
            })
        })
        .collect()
}
