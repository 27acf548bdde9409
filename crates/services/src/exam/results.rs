use std::sync::Arc;

use exam_core::model::{AnswerRecord, ExamId, StoredExamResult};
use storage::repository::ExamRepository;

use crate::error::ResultLookupError;

/// Read-only access to saved exams for the result screen.
#[derive(Clone)]
pub struct ExamResultService {
    exams: Arc<dyn ExamRepository>,
}

impl ExamResultService {
    #[must_use]
    pub fn new(exams: Arc<dyn ExamRepository>) -> Self {
        Self { exams }
    }

    /// Load the exam record and its result.
    ///
    /// # Errors
    ///
    /// Returns `ResultLookupError::NotFound` when either row is missing, which
    /// includes exams whose save stopped after the first step.
    pub async fn load(&self, exam_id: ExamId) -> Result<StoredExamResult, ResultLookupError> {
        self.exams
            .exam_result(exam_id)
            .await?
            .ok_or(ResultLookupError::NotFound(exam_id))
    }

    /// # Errors
    ///
    /// Returns `ResultLookupError::Storage` on repository failures.
    pub async fn answers(&self, exam_id: ExamId) -> Result<Vec<AnswerRecord>, ResultLookupError> {
        Ok(self.exams.answers_for_exam(exam_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{ExamRecord, Score, SubjectId, TerminationReason};
    use exam_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn record() -> ExamRecord {
        ExamRecord {
            user_id: None,
            subject_ids: vec![SubjectId::new(2)],
            questions_requested: 4,
            questions_presented: 4,
            questions_answered: 0,
            duration_requested_minutes: 3,
            duration_taken_secs: 180,
            reason: TerminationReason::TimeUp,
            started_at: fixed_now(),
            finished_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn load_returns_joined_rows() {
        let repo = InMemoryRepository::new();
        let id = repo.insert_exam(&record()).await.unwrap();
        let score = Score::from_counts(0, 0, 4);
        repo.insert_result(id, None, &score).await.unwrap();

        let svc = ExamResultService::new(Arc::new(repo));
        let stored = svc.load(id).await.unwrap();
        assert_eq!(stored.score, score);
        assert_eq!(stored.exam.reason, TerminationReason::TimeUp);
        assert!(svc.answers(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn orphaned_exam_is_not_found() {
        let repo = InMemoryRepository::new();
        let id = repo.insert_exam(&record()).await.unwrap();

        let svc = ExamResultService::new(Arc::new(repo));
        let err = svc.load(id).await.unwrap_err();
        assert!(matches!(err, ResultLookupError::NotFound(missing) if missing == id));
    }
}
