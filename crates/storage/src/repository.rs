use async_trait::async_trait;
use exam_core::model::{
    AnswerRecord, ExamId, ExamRecord, Question, QuestionId, Score, StoredExamResult, SubjectId,
    UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read access to the question bank.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Every question whose subject is in `subjects`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be read or a row fails validation.
    async fn questions_by_subjects(
        &self,
        subjects: &[SubjectId],
    ) -> Result<Vec<Question>, StorageError>;

    /// Persist or replace a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;
}

/// Write and read-back access for finished exams.
///
/// The three inserts are separate calls on purpose: the backend offers no
/// transaction spanning them, and the caller decides what a partial failure means.
#[async_trait]
pub trait ExamRepository: Send + Sync {
    /// Insert the exam record and return its generated id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the insert fails.
    async fn insert_exam(&self, exam: &ExamRecord) -> Result<ExamId, StorageError>;

    /// Insert all answer rows for `exam_id` in one call.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the exam does not exist, or other storage errors.
    async fn insert_answers(
        &self,
        exam_id: ExamId,
        answers: &[AnswerRecord],
    ) -> Result<(), StorageError>;

    /// Insert the aggregated result row for `exam_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a result already exists, `NotFound`
    /// if the exam does not exist, or other storage errors.
    async fn insert_result(
        &self,
        exam_id: ExamId,
        user_id: Option<UserId>,
        score: &Score,
    ) -> Result<(), StorageError>;

    /// Load the joined exam + result rows, `None` when either is missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decoding failures.
    async fn exam_result(&self, exam_id: ExamId) -> Result<Option<StoredExamResult>, StorageError>;

    /// Answer rows stored for `exam_id`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decoding failures.
    async fn answers_for_exam(&self, exam_id: ExamId) -> Result<Vec<AnswerRecord>, StorageError>;
}

/// Who is signed in, as reported by the auth backend.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the identity cannot be determined.
    async fn current_user_id(&self) -> Result<Option<UserId>, StorageError>;
}

/// Identity fixed at startup (from configuration, or none).
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticIdentity(pub Option<UserId>);

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user_id(&self) -> Result<Option<UserId>, StorageError> {
        Ok(self.0)
    }
}

#[derive(Debug, Default)]
struct ExamTables {
    last_id: u64,
    exams: BTreeMap<ExamId, ExamRecord>,
    answers: HashMap<ExamId, Vec<AnswerRecord>>,
    results: HashMap<ExamId, Score>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<HashMap<QuestionId, Question>>>,
    exams: Arc<Mutex<ExamTables>>,
    current_user: Arc<Mutex<Option<UserId>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `user` as the signed-in identity.
    pub fn set_current_user(&self, user: Option<UserId>) {
        *self
            .current_user
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = user;
    }

    /// Number of exam records written so far.
    #[must_use]
    pub fn exam_count(&self) -> usize {
        self.exams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .exams
            .len()
    }

    /// Number of result records written so far.
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.exams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .results
            .len()
    }

    #[must_use]
    pub fn exam(&self, id: ExamId) -> Option<ExamRecord> {
        self.exams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .exams
            .get(&id)
            .cloned()
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn questions_by_subjects(
        &self,
        subjects: &[SubjectId],
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<Question> = guard
            .values()
            .filter(|q| subjects.contains(&q.subject_id()))
            .cloned()
            .collect();
        found.sort_by_key(Question::id);
        Ok(found)
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(question.id(), question.clone());
        Ok(())
    }
}

#[async_trait]
impl ExamRepository for InMemoryRepository {
    async fn insert_exam(&self, exam: &ExamRecord) -> Result<ExamId, StorageError> {
        let mut guard = self
            .exams
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.last_id += 1;
        let id = ExamId::new(guard.last_id);
        guard.exams.insert(id, exam.clone());
        Ok(id)
    }

    async fn insert_answers(
        &self,
        exam_id: ExamId,
        answers: &[AnswerRecord],
    ) -> Result<(), StorageError> {
        let mut guard = self
            .exams
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if !guard.exams.contains_key(&exam_id) {
            return Err(StorageError::NotFound);
        }
        guard
            .answers
            .entry(exam_id)
            .or_default()
            .extend_from_slice(answers);
        Ok(())
    }

    async fn insert_result(
        &self,
        exam_id: ExamId,
        _user_id: Option<UserId>,
        score: &Score,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .exams
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if !guard.exams.contains_key(&exam_id) {
            return Err(StorageError::NotFound);
        }
        if guard.results.contains_key(&exam_id) {
            return Err(StorageError::Conflict);
        }
        guard.results.insert(exam_id, *score);
        Ok(())
    }

    async fn exam_result(&self, exam_id: ExamId) -> Result<Option<StoredExamResult>, StorageError> {
        let guard = self
            .exams
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let joined = guard
            .exams
            .get(&exam_id)
            .zip(guard.results.get(&exam_id))
            .map(|(exam, score)| StoredExamResult {
                exam_id,
                exam: exam.clone(),
                score: *score,
            });
        Ok(joined)
    }

    async fn answers_for_exam(&self, exam_id: ExamId) -> Result<Vec<AnswerRecord>, StorageError> {
        let guard = self
            .exams
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.answers.get(&exam_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryRepository {
    async fn current_user_id(&self) -> Result<Option<UserId>, StorageError> {
        let guard = self
            .current_user
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(*guard)
    }
}

/// Aggregates the backend contracts behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub exams: Arc<dyn ExamRepository>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let exams: Arc<dyn ExamRepository> = Arc::new(repo.clone());
        let identity: Arc<dyn IdentityProvider> = Arc::new(repo);
        Self {
            questions,
            exams,
            identity,
        }
    }

    /// Replace the identity source, keeping the data repositories.
    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{AnswerOption, OptionId, TerminationReason};
    use exam_core::time::fixed_now;

    fn build_question(id: u64, subject: u64) -> Question {
        Question::new(
            QuestionId::new(id),
            SubjectId::new(subject),
            format!("Question {id}"),
            vec![AnswerOption::new("A", "yes"), AnswerOption::new("B", "no")],
            OptionId::new("A"),
        )
        .unwrap()
    }

    fn build_exam() -> ExamRecord {
        ExamRecord {
            user_id: None,
            subject_ids: vec![SubjectId::new(1)],
            questions_requested: 3,
            questions_presented: 2,
            questions_answered: 1,
            duration_requested_minutes: 1,
            duration_taken_secs: 30,
            reason: TerminationReason::Completed,
            started_at: fixed_now(),
            finished_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn filters_questions_by_subject_set() {
        let repo = InMemoryRepository::new();
        for (id, subject) in [(3, 1), (1, 1), (2, 2), (4, 3)] {
            repo.upsert_question(&build_question(id, subject)).await.unwrap();
        }

        let found = repo
            .questions_by_subjects(&[SubjectId::new(1), SubjectId::new(3)])
            .await
            .unwrap();
        let ids: Vec<u64> = found.iter().map(|q| q.id().value()).collect();
        assert_eq!(ids, vec![1, 3, 4]);

        let none = repo
            .questions_by_subjects(&[SubjectId::new(9)])
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn exam_rows_reference_existing_exam() {
        let repo = InMemoryRepository::new();
        let missing = repo
            .insert_answers(ExamId::new(5), &[])
            .await
            .unwrap_err();
        assert!(matches!(missing, StorageError::NotFound));

        let id = repo.insert_exam(&build_exam()).await.unwrap();
        assert_eq!(id, ExamId::new(1));
        let answer = AnswerRecord {
            question_id: QuestionId::new(1),
            selected_option: OptionId::new("A"),
            is_correct: true,
        };
        repo.insert_answers(id, &[answer.clone()]).await.unwrap();
        assert_eq!(repo.answers_for_exam(id).await.unwrap(), vec![answer]);

        assert!(repo.exam_result(id).await.unwrap().is_none());
        let score = Score::from_counts(1, 0, 1);
        repo.insert_result(id, None, &score).await.unwrap();
        let dup = repo.insert_result(id, None, &score).await.unwrap_err();
        assert!(matches!(dup, StorageError::Conflict));

        let stored = repo.exam_result(id).await.unwrap().unwrap();
        assert_eq!(stored.exam_id, id);
        assert_eq!(stored.score, score);
        assert_eq!(stored.exam.questions_presented, 2);
    }

    #[tokio::test]
    async fn identity_follows_current_user() {
        let repo = InMemoryRepository::new();
        assert_eq!(repo.current_user_id().await.unwrap(), None);
        let user = UserId::new(uuid::Uuid::new_v4());
        repo.set_current_user(Some(user));
        assert_eq!(repo.current_user_id().await.unwrap(), Some(user));

        let fixed = StaticIdentity(None);
        assert_eq!(fixed.current_user_id().await.unwrap(), None);
    }
}
