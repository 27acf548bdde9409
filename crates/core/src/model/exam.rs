use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{ExamId, OptionId, QuestionId, SubjectId, UserId};
use crate::model::outcome::Score;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown termination reason: {0}")]
pub struct UnknownReason(pub String);

/// Why a session stopped accepting input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The user advanced past the last question.
    Completed,
    /// The session clock reached zero.
    TimeUp,
    /// The user left the exam early.
    ManualExit,
}

impl TerminationReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TerminationReason::Completed => "completed",
            TerminationReason::TimeUp => "time_up",
            TerminationReason::ManualExit => "manual_exit",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TerminationReason {
    type Err = UnknownReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "time_up" => Ok(Self::TimeUp),
            "manual_exit" => Ok(Self::ManualExit),
            other => Err(UnknownReason(other.to_owned())),
        }
    }
}

/// Snapshot of a finished exam written as the first persistence step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamRecord {
    pub user_id: Option<UserId>,
    pub subject_ids: Vec<SubjectId>,
    /// Count asked for at setup time.
    pub questions_requested: u32,
    /// Count actually presented; smaller than requested for a short pool.
    pub questions_presented: u32,
    pub questions_answered: u32,
    pub duration_requested_minutes: u32,
    pub duration_taken_secs: u32,
    pub reason: TerminationReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One answered question, written in the second persistence step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub selected_option: OptionId,
    pub is_correct: bool,
}

/// Joined exam + result row as read back for the result screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredExamResult {
    pub exam_id: ExamId,
    pub exam: ExamRecord,
    pub score: Score,
}
