use exam_core::model::{Question, SubjectId};

use super::{
    SqliteRepository, db_err,
    mapping::{id_i64, map_question_row, options_to_json},
};
use crate::repository::{QuestionRepository, StorageError};

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn questions_by_subjects(
        &self,
        subjects: &[SubjectId],
    ) -> Result<Vec<Question>, StorageError> {
        if subjects.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
                SELECT id, subject_id, prompt, options, correct_option_id
                FROM questions
                WHERE subject_id IN (
            ",
        );

        for i in 0..subjects.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push_str(")\n ORDER BY id ASC");

        let mut query = sqlx::query(&sql);
        for subject in subjects {
            query = query.bind(id_i64("subject_id", subject.value())?);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_question_row(&row)?);
        }
        Ok(out)
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO questions (id, subject_id, prompt, options, correct_option_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                subject_id = excluded.subject_id,
                prompt = excluded.prompt,
                options = excluded.options,
                correct_option_id = excluded.correct_option_id
            ",
        )
        .bind(id_i64("question_id", question.id().value())?)
        .bind(id_i64("subject_id", question.subject_id().value())?)
        .bind(question.prompt().to_owned())
        .bind(options_to_json(question.options())?)
        .bind(question.correct_option().as_str().to_owned())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}
