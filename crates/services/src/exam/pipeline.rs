use std::sync::Arc;

use chrono::{DateTime, Utc};
use exam_core::model::{ExamId, ExamRecord, SessionConfig, UserId};
use storage::repository::{ExamRepository, IdentityProvider, StorageError};

use super::session::TerminatedSession;
use crate::error::{PersistenceError, PersistenceStep};

/// Everything the pipeline writes for one finished exam.
#[derive(Debug, Clone, Copy)]
pub struct ExamSubmission<'a> {
    pub config: &'a SessionConfig,
    pub session: &'a TerminatedSession,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExamSubmission<'_> {
    fn exam_record(&self, user_id: Option<UserId>) -> ExamRecord {
        let answered = u32::try_from(self.session.answers.len()).unwrap_or(u32::MAX);
        ExamRecord {
            user_id,
            subject_ids: self.config.subject_ids().to_vec(),
            questions_requested: self.config.question_count(),
            questions_presented: self.session.questions_presented,
            questions_answered: answered,
            duration_requested_minutes: self.config.duration_minutes(),
            duration_taken_secs: self.session.outcome.elapsed_secs(),
            reason: self.session.reason,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Ordered three-step save: exam record, answer records, result record.
///
/// Each step needs the exam id from the first, so nothing runs in parallel.
/// A failure stops the sequence without retrying. When step one already
/// succeeded its exam row stays behind, and the error carries its id.
#[derive(Clone)]
pub struct ResultPipeline {
    exams: Arc<dyn ExamRepository>,
    identity: Arc<dyn IdentityProvider>,
}

impl ResultPipeline {
    #[must_use]
    pub fn new(exams: Arc<dyn ExamRepository>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { exams, identity }
    }

    /// Write one finished exam.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` naming the failed step and, past step one,
    /// the exam id left without its remaining rows.
    pub async fn persist(
        &self,
        submission: &ExamSubmission<'_>,
    ) -> Result<ExamId, PersistenceError> {
        let user_id = self
            .identity
            .current_user_id()
            .await
            .map_err(|e| failed(PersistenceStep::Identity, None, e))?;
        if user_id.is_none() {
            log::warn!("saving exam without a signed-in user");
        }

        let record = submission.exam_record(user_id);
        let exam_id = self
            .exams
            .insert_exam(&record)
            .await
            .map_err(|e| failed(PersistenceStep::ExamRecord, None, e))?;

        let answers = &submission.session.answers;
        if !answers.is_empty() {
            self.exams
                .insert_answers(exam_id, answers)
                .await
                .map_err(|e| failed(PersistenceStep::Answers, Some(exam_id), e))?;
        }

        self.exams
            .insert_result(exam_id, user_id, submission.session.outcome.score())
            .await
            .map_err(|e| failed(PersistenceStep::Result, Some(exam_id), e))?;

        log::info!(
            "saved exam {exam_id}: {} answers, {}%",
            answers.len(),
            submission.session.outcome.percentage()
        );
        Ok(exam_id)
    }
}

fn failed(
    step: PersistenceStep,
    exam_id: Option<ExamId>,
    source: StorageError,
) -> PersistenceError {
    match exam_id {
        Some(id) => log::error!("exam {id} saved without its {step}: {source}"),
        None => log::error!("exam not saved, {step} step failed: {source}"),
    }
    PersistenceError {
        step,
        exam_id,
        source,
    }
}
