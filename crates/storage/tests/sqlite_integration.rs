use exam_core::model::{
    AnswerOption, AnswerRecord, ExamId, ExamRecord, OptionId, Question, QuestionId, Score,
    SubjectId, TerminationReason, UserId,
};
use exam_core::time::fixed_now;
use storage::repository::{ExamRepository, QuestionRepository, StorageError};
use storage::sqlite::SqliteRepository;

fn build_question(id: u64, subject: u64) -> Question {
    Question::new(
        QuestionId::new(id),
        SubjectId::new(subject),
        format!("Question {id}"),
        vec![
            AnswerOption::new("A", "first"),
            AnswerOption::new("B", "second"),
            AnswerOption::new("C", "third"),
        ],
        OptionId::new("B"),
    )
    .unwrap()
}

fn build_exam(user_id: Option<UserId>) -> ExamRecord {
    ExamRecord {
        user_id,
        subject_ids: vec![SubjectId::new(1), SubjectId::new(2)],
        questions_requested: 5,
        questions_presented: 3,
        questions_answered: 2,
        duration_requested_minutes: 10,
        duration_taken_secs: 125,
        reason: TerminationReason::ManualExit,
        started_at: fixed_now(),
        finished_at: fixed_now() + chrono::Duration::seconds(125),
    }
}

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_questions_roundtrip_by_subject() {
    let repo = connect("memdb_questions").await;

    for (id, subject) in [(1, 1), (2, 2), (3, 1), (4, 3)] {
        repo.upsert_question(&build_question(id, subject))
            .await
            .unwrap();
    }

    let found = repo
        .questions_by_subjects(&[SubjectId::new(1), SubjectId::new(3)])
        .await
        .expect("fetch");
    let ids: Vec<u64> = found.iter().map(|q| q.id().value()).collect();
    assert_eq!(ids, vec![1, 3, 4]);
    assert_eq!(found[0].options().len(), 3);
    assert_eq!(found[0].correct_option(), &OptionId::new("B"));
    assert_eq!(found[0].options()[2].text, "third");

    // Upsert replaces in place.
    let edited = Question::new(
        QuestionId::new(1),
        SubjectId::new(1),
        "Edited",
        vec![AnswerOption::new("X", "x"), AnswerOption::new("Y", "y")],
        OptionId::new("Y"),
    )
    .unwrap();
    repo.upsert_question(&edited).await.unwrap();
    let found = repo
        .questions_by_subjects(&[SubjectId::new(1)])
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0], edited);

    assert!(repo.questions_by_subjects(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_persists_exam_answers_and_result() {
    let repo = connect("memdb_exam_pipeline").await;
    let user = UserId::new(uuid::Uuid::new_v4());

    let exam_id = repo.insert_exam(&build_exam(Some(user))).await.unwrap();
    let answers = vec![
        AnswerRecord {
            question_id: QuestionId::new(1),
            selected_option: OptionId::new("B"),
            is_correct: true,
        },
        AnswerRecord {
            question_id: QuestionId::new(2),
            selected_option: OptionId::new("B"),
            is_correct: true,
        },
    ];
    repo.insert_answers(exam_id, &answers).await.unwrap();

    let score = Score::from_counts(2, 0, 1);
    repo.insert_result(exam_id, Some(user), &score).await.unwrap();

    let stored = repo
        .exam_result(exam_id)
        .await
        .unwrap()
        .expect("stored result");
    assert_eq!(stored.exam_id, exam_id);
    assert_eq!(stored.exam, build_exam(Some(user)));
    assert_eq!(stored.score, score);
    assert_eq!(stored.score.percentage().to_string(), "66.67");

    assert_eq!(repo.answers_for_exam(exam_id).await.unwrap(), answers);

    let dup = repo
        .insert_result(exam_id, Some(user), &score)
        .await
        .unwrap_err();
    assert!(matches!(dup, StorageError::Conflict));
}

#[tokio::test]
async fn sqlite_rejects_rows_for_missing_exam() {
    let repo = connect("memdb_missing_exam").await;

    let answers = vec![AnswerRecord {
        question_id: QuestionId::new(1),
        selected_option: OptionId::new("A"),
        is_correct: false,
    }];
    let err = repo
        .insert_answers(ExamId::new(404), &answers)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));

    let err = repo
        .insert_result(ExamId::new(404), None, &Score::from_counts(0, 1, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));

    assert!(repo.exam_result(ExamId::new(404)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_exam_without_result_reads_back_as_none() {
    let repo = connect("memdb_orphan_exam").await;

    let exam_id = repo.insert_exam(&build_exam(None)).await.unwrap();
    assert!(repo.exam_result(exam_id).await.unwrap().is_none());
    assert!(repo.answers_for_exam(exam_id).await.unwrap().is_empty());
}
