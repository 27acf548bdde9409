//! Shared error types for the services crate.

use std::fmt;

use thiserror::Error;

use exam_core::model::ExamId;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors that end an exam before or while it starts.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamError {
    #[error("no questions available for the selected subjects")]
    PoolEmpty,
    #[error("exam was cancelled before its questions finished loading")]
    Aborted,
    #[error(transparent)]
    Invariant(#[from] SessionInvariantViolation),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Internal defects in the session state machine.
///
/// These never happen in correct operation. Debug builds panic on them,
/// release builds log and return them.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionInvariantViolation {
    #[error("termination claim belongs to a different session")]
    ForeignClaim,
    #[error("session is not terminating")]
    NotTerminating,
    #[error("session has no loaded state")]
    NotLoaded,
    #[error("session already left the loading phase")]
    NotLoading,
    #[error("session cannot run with an empty question list")]
    EmptySequence,
}

impl SessionInvariantViolation {
    /// Fail loudly in development, log in release.
    pub(crate) fn raise(self) -> Self {
        debug_assert!(false, "session invariant violated: {self}");
        log::error!("session invariant violated: {self}");
        self
    }
}

/// The persistence step a save attempt stopped at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceStep {
    Identity,
    ExamRecord,
    Answers,
    Result,
}

impl fmt::Display for PersistenceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PersistenceStep::Identity => "identity lookup",
            PersistenceStep::ExamRecord => "exam record",
            PersistenceStep::Answers => "answer records",
            PersistenceStep::Result => "result record",
        })
    }
}

/// Saving a finished exam failed part-way.
///
/// `exam_id` is set when the exam record was written before the failure;
/// that row is left without its answers or result.
#[derive(Debug, Error)]
#[error("saving exam results failed at the {step} step")]
pub struct PersistenceError {
    pub step: PersistenceStep,
    pub exam_id: Option<ExamId>,
    #[source]
    pub source: StorageError,
}

/// Errors emitted by `ExamResultService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResultLookupError {
    #[error("no stored result for exam {0}")]
    NotFound(ExamId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
