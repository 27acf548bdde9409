use exam_core::model::{AnswerRecord, ExamId, ExamRecord, Score, StoredExamResult, UserId};

use super::{
    SqliteRepository, db_err,
    mapping::{
        exam_id_from_i64, id_i64, map_answer_row, map_exam_result_row, subject_ids_to_json,
        user_id_to_text,
    },
};
use crate::repository::{ExamRepository, StorageError};

#[async_trait::async_trait]
impl ExamRepository for SqliteRepository {
    async fn insert_exam(&self, exam: &ExamRecord) -> Result<ExamId, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO exams (
                    user_id, subject_ids, questions_requested, questions_presented,
                    questions_answered, duration_requested_minutes, duration_taken_secs,
                    reason, started_at, finished_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(user_id_to_text(exam.user_id))
        .bind(subject_ids_to_json(&exam.subject_ids)?)
        .bind(i64::from(exam.questions_requested))
        .bind(i64::from(exam.questions_presented))
        .bind(i64::from(exam.questions_answered))
        .bind(i64::from(exam.duration_requested_minutes))
        .bind(i64::from(exam.duration_taken_secs))
        .bind(exam.reason.as_str())
        .bind(exam.started_at)
        .bind(exam.finished_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        exam_id_from_i64(res.last_insert_rowid())
    }

    async fn insert_answers(
        &self,
        exam_id: ExamId,
        answers: &[AnswerRecord],
    ) -> Result<(), StorageError> {
        let exam = id_i64("exam_id", exam_id.value())?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for answer in answers {
            sqlx::query(
                r"
                    INSERT INTO exam_answers (exam_id, question_id, selected_option_id, is_correct)
                    VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(exam)
            .bind(id_i64("question_id", answer.question_id.value())?)
            .bind(answer.selected_option.as_str().to_owned())
            .bind(answer.is_correct)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn insert_result(
        &self,
        exam_id: ExamId,
        user_id: Option<UserId>,
        score: &Score,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO exam_results (
                    exam_id, user_id, correct, incorrect, unanswered, percentage
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(id_i64("exam_id", exam_id.value())?)
        .bind(user_id_to_text(user_id))
        .bind(i64::from(score.correct()))
        .bind(i64::from(score.incorrect()))
        .bind(i64::from(score.unanswered()))
        .bind(score.percentage().as_f64())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn exam_result(&self, exam_id: ExamId) -> Result<Option<StoredExamResult>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    e.id, e.user_id, e.subject_ids, e.questions_requested,
                    e.questions_presented, e.questions_answered,
                    e.duration_requested_minutes, e.duration_taken_secs,
                    e.reason, e.started_at, e.finished_at,
                    r.correct, r.incorrect, r.unanswered, r.percentage
                FROM exams e
                JOIN exam_results r ON r.exam_id = e.id
                WHERE e.id = ?1
            ",
        )
        .bind(id_i64("exam_id", exam_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_exam_result_row).transpose()
    }

    async fn answers_for_exam(&self, exam_id: ExamId) -> Result<Vec<AnswerRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT question_id, selected_option_id, is_correct
                FROM exam_answers
                WHERE exam_id = ?1
                ORDER BY id ASC
            ",
        )
        .bind(id_i64("exam_id", exam_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_answer_row(&row)?);
        }
        Ok(out)
    }
}
