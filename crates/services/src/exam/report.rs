use exam_core::model::{ExamId, ExamOutcome, TerminationReason};

use super::loader::PoolNotice;
use crate::error::PersistenceError;

/// What happened to the outcome after scoring.
#[derive(Debug)]
pub enum Persistence {
    Saved(ExamId),
    /// Guest sessions are scored but never written.
    GuestNotSaved,
    Failed(PersistenceError),
}

/// Final state of one exam, handed to whatever renders results.
///
/// The outcome is always present, whether or not saving worked.
#[derive(Debug)]
pub struct ExamReport {
    pub reason: TerminationReason,
    pub outcome: ExamOutcome,
    pub persistence: Persistence,
    pub notice: Option<PoolNotice>,
}

impl ExamReport {
    #[must_use]
    pub fn exam_id(&self) -> Option<ExamId> {
        match self.persistence {
            Persistence::Saved(id) => Some(id),
            Persistence::GuestNotSaved | Persistence::Failed(_) => None,
        }
    }

    #[must_use]
    pub fn is_saved(&self) -> bool {
        self.exam_id().is_some()
    }

    #[must_use]
    pub fn headline(&self) -> &'static str {
        match self.reason {
            TerminationReason::TimeUp => "Time is up!",
            TerminationReason::Completed | TerminationReason::ManualExit => "Exam finished!",
        }
    }

    /// Score lines, prefixed with the timeout note when the clock ran out.
    #[must_use]
    pub fn summary_line(&self) -> String {
        let score = format!(
            "Correct answers: {} / {}\nYour score: {}%",
            self.outcome.correct(),
            self.outcome.total(),
            self.outcome.percentage()
        );
        if self.reason == TerminationReason::TimeUp {
            format!("The exam time has run out!\n{score}")
        } else {
            score
        }
    }

    /// Extra line about saving, if any.
    #[must_use]
    pub fn persistence_notice(&self) -> Option<String> {
        match &self.persistence {
            Persistence::Saved(_) => None,
            Persistence::GuestNotSaved => {
                Some("Register to save and analyse your results.".to_owned())
            }
            Persistence::Failed(err) => Some(format!("Your results could not be saved: {err}")),
        }
    }
}
