use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId, SubjectId};

/// Smallest option list a multiple-choice question may carry.
pub const MIN_OPTIONS: usize = 2;
/// Largest option list a multiple-choice question may carry.
pub const MAX_OPTIONS: usize = 6;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt is empty")]
    EmptyPrompt,

    #[error("question has {count} options, expected {}..={}", MIN_OPTIONS, MAX_OPTIONS)]
    OptionCount { count: usize },

    #[error("option label is empty")]
    EmptyOptionId,

    #[error("duplicate option label: {0}")]
    DuplicateOption(OptionId),

    #[error("correct option {0} is not one of the offered options")]
    UnknownCorrectOption(OptionId),
}

//
// ─── ANSWER OPTION ────────────────────────────────────────────────────────────
//

/// One selectable choice of a question, in display order.
///
/// Field names follow the stored JSON shape (`[{"option_id": "A", "text": "..."}]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    #[serde(rename = "option_id")]
    pub id: OptionId,
    pub text: String,
}

impl AnswerOption {
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: OptionId::new(id),
            text: text.into(),
        }
    }
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

/// A multiple-choice question with a single correct option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    subject_id: SubjectId,
    prompt: String,
    options: Vec<AnswerOption>,
    correct_option: OptionId,
}

impl Question {
    /// Build a question, validating the shape of its option list.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the prompt is blank, the option count is
    /// outside `MIN_OPTIONS..=MAX_OPTIONS`, labels are blank or repeated, or
    /// the correct option is not among the options.
    pub fn new(
        id: QuestionId,
        subject_id: SubjectId,
        prompt: impl Into<String>,
        options: Vec<AnswerOption>,
        correct_option: OptionId,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
            return Err(QuestionError::OptionCount {
                count: options.len(),
            });
        }

        let mut seen = HashSet::with_capacity(options.len());
        for option in &options {
            if option.id.as_str().trim().is_empty() {
                return Err(QuestionError::EmptyOptionId);
            }
            if !seen.insert(&option.id) {
                return Err(QuestionError::DuplicateOption(option.id.clone()));
            }
        }
        if !seen.contains(&correct_option) {
            return Err(QuestionError::UnknownCorrectOption(correct_option));
        }

        Ok(Self {
            id,
            subject_id,
            prompt,
            options,
            correct_option,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn correct_option(&self) -> &OptionId {
        &self.correct_option
    }

    /// Returns true if `option` is this question's correct option.
    #[must_use]
    pub fn is_correct(&self, option: &OptionId) -> bool {
        &self.correct_option == option
    }

    /// Looks up an option by label.
    #[must_use]
    pub fn option(&self, id: &OptionId) -> Option<&AnswerOption> {
        self.options.iter().find(|o| &o.id == id)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
