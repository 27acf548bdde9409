use std::collections::HashSet;
use std::sync::Arc;

use exam_core::model::{Question, SessionConfig};
use rand::Rng;
use rand::rng;
use rand::seq::SliceRandom;
use storage::repository::QuestionRepository;

use crate::error::ExamError;

/// Non-fatal condition the caller should show before the exam starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolNotice {
    /// Fewer questions exist than were requested; the exam uses all of them.
    Insufficient { requested: u32, available: u32 },
}

/// Finalized question list plus any notice about how it was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPool {
    pub questions: Vec<Question>,
    pub notice: Option<PoolNotice>,
}

/// Drop repeated question ids, shuffle uniformly, keep the first `requested`.
///
/// A pool smaller than `requested` is returned whole (shuffled) with an
/// `Insufficient` notice.
pub fn select_questions<R: Rng + ?Sized>(
    pool: Vec<Question>,
    requested: u32,
    rng: &mut R,
) -> LoadedPool {
    let mut seen = HashSet::with_capacity(pool.len());
    let mut questions: Vec<Question> = pool.into_iter().filter(|q| seen.insert(q.id())).collect();

    questions.as_mut_slice().shuffle(rng);

    let available = u32::try_from(questions.len()).unwrap_or(u32::MAX);
    let notice = if available < requested {
        Some(PoolNotice::Insufficient {
            requested,
            available,
        })
    } else {
        questions.truncate(requested as usize);
        None
    };

    LoadedPool { questions, notice }
}

/// Fetches and samples the question list for one exam.
#[derive(Clone)]
pub struct QuestionPoolLoader {
    questions: Arc<dyn QuestionRepository>,
}

impl QuestionPoolLoader {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionRepository>) -> Self {
        Self { questions }
    }

    /// Load every question of the configured subjects and sample the exam from them.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::PoolEmpty` when the subjects hold no questions, or
    /// `ExamError::Storage` when the fetch fails.
    pub async fn load(&self, config: &SessionConfig) -> Result<LoadedPool, ExamError> {
        let pool = self
            .questions
            .questions_by_subjects(config.subject_ids())
            .await?;
        if pool.is_empty() {
            log::warn!(
                "no questions found for subjects {:?}",
                config.subject_ids()
            );
            return Err(ExamError::PoolEmpty);
        }

        let loaded = select_questions(pool, config.question_count(), &mut rng());
        if let Some(PoolNotice::Insufficient {
            requested,
            available,
        }) = loaded.notice
        {
            log::warn!("question pool short: requested {requested}, using {available}");
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use exam_core::model::{AnswerOption, OptionId, QuestionId, SubjectId};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;
    use storage::repository::{InMemoryRepository, StorageError};

    fn question(id: u64, subject: u64) -> Question {
        Question::new(
            QuestionId::new(id),
            SubjectId::new(subject),
            format!("Q{id}"),
            vec![AnswerOption::new("A", "a"), AnswerOption::new("B", "b")],
            OptionId::new("A"),
        )
        .unwrap()
    }

    fn config(subjects: &[u64], count: u32) -> SessionConfig {
        SessionConfig::new(subjects.iter().copied().map(SubjectId::new), count, 5, false).unwrap()
    }

    struct FailingQuestions;

    #[async_trait]
    impl QuestionRepository for FailingQuestions {
        async fn questions_by_subjects(
            &self,
            _subjects: &[SubjectId],
        ) -> Result<Vec<Question>, StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn upsert_question(&self, _question: &Question) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[test]
    fn selects_exact_count_without_repeats() {
        let pool: Vec<_> = (1..=20).map(|i| question(i, 1)).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let loaded = select_questions(pool, 5, &mut rng);

        assert_eq!(loaded.questions.len(), 5);
        assert!(loaded.notice.is_none());
        let unique: HashSet<_> = loaded.questions.iter().map(Question::id).collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn short_pool_keeps_everything_with_notice() {
        let mut pool: Vec<_> = (1..=3).map(|i| question(i, 1)).collect();
        pool.push(question(2, 1));
        let mut rng = StdRng::seed_from_u64(1);
        let loaded = select_questions(pool, 10, &mut rng);

        assert_eq!(loaded.questions.len(), 3);
        assert_eq!(
            loaded.notice,
            Some(PoolNotice::Insufficient {
                requested: 10,
                available: 3
            })
        );
    }

    #[test]
    fn every_question_is_picked_about_equally_often() {
        let pool: Vec<_> = (1..=10).map(|i| question(i, i % 2 + 1)).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let mut hits: HashMap<QuestionId, u32> = HashMap::new();

        let rounds = 20_000;
        for _ in 0..rounds {
            for q in select_questions(pool.clone(), 3, &mut rng).questions {
                *hits.entry(q.id()).or_default() += 1;
            }
        }

        // Expected 3/10 of the rounds each.
        let expected = f64::from(rounds) * 0.3;
        for id in 1..=10 {
            let count = f64::from(hits[&QuestionId::new(id)]);
            assert!(
                (count - expected).abs() < expected * 0.05,
                "question {id} picked {count} times, expected about {expected}"
            );
        }
    }

    #[tokio::test]
    async fn load_unions_subjects() {
        let repo = InMemoryRepository::new();
        for (id, subject) in [(1, 1), (2, 1), (3, 2), (4, 3)] {
            repo.upsert_question(&question(id, subject)).await.unwrap();
        }
        let loader = QuestionPoolLoader::new(Arc::new(repo));

        let loaded = loader.load(&config(&[1, 2], 3)).await.unwrap();
        let mut ids: Vec<u64> = loaded.questions.iter().map(|q| q.id().value()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(loaded.notice.is_none());
    }

    #[tokio::test]
    async fn load_reports_empty_pool() {
        let repo = InMemoryRepository::new();
        repo.upsert_question(&question(1, 1)).await.unwrap();
        let loader = QuestionPoolLoader::new(Arc::new(repo));

        let err = loader.load(&config(&[9], 3)).await.unwrap_err();
        assert!(matches!(err, ExamError::PoolEmpty));
    }

    #[tokio::test]
    async fn load_surfaces_fetch_failures() {
        let loader = QuestionPoolLoader::new(Arc::new(FailingQuestions));
        let err = loader.load(&config(&[1], 3)).await.unwrap_err();
        assert!(matches!(err, ExamError::Storage(StorageError::Connection(_))));
    }
}
