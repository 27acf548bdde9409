use exam_core::model::{
    AnswerOption, AnswerRecord, ExamId, ExamRecord, OptionId, Percentage, Question, QuestionId,
    Score, StoredExamResult, SubjectId, UserId,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn exam_id_from_i64(v: i64) -> Result<ExamId, StorageError> {
    Ok(ExamId::new(i64_to_u64("exam_id", v)?))
}

pub(crate) fn user_id_to_text(user: Option<UserId>) -> Option<String> {
    user.map(|u| u.to_string())
}

fn user_id_from_text(v: Option<String>) -> Result<Option<UserId>, StorageError> {
    v.map(|s| s.parse::<UserId>().map_err(ser)).transpose()
}

pub(crate) fn subject_ids_to_json(ids: &[SubjectId]) -> Result<String, StorageError> {
    serde_json::to_string(ids).map_err(ser)
}

pub(crate) fn options_to_json(options: &[AnswerOption]) -> Result<String, StorageError> {
    serde_json::to_string(options).map_err(ser)
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let id = QuestionId::new(i64_to_u64(
        "question_id",
        row.try_get::<i64, _>("id").map_err(ser)?,
    )?);
    let subject_id = SubjectId::new(i64_to_u64(
        "subject_id",
        row.try_get::<i64, _>("subject_id").map_err(ser)?,
    )?);
    let options_json: String = row.try_get("options").map_err(ser)?;
    let options: Vec<AnswerOption> = serde_json::from_str(&options_json).map_err(ser)?;
    let correct: String = row.try_get("correct_option_id").map_err(ser)?;

    Question::new(
        id,
        subject_id,
        row.try_get::<String, _>("prompt").map_err(ser)?,
        options,
        OptionId::new(correct),
    )
    .map_err(ser)
}

pub(crate) fn map_answer_row(row: &sqlx::sqlite::SqliteRow) -> Result<AnswerRecord, StorageError> {
    Ok(AnswerRecord {
        question_id: QuestionId::new(i64_to_u64(
            "question_id",
            row.try_get::<i64, _>("question_id").map_err(ser)?,
        )?),
        selected_option: OptionId::new(
            row.try_get::<String, _>("selected_option_id")
                .map_err(ser)?,
        ),
        is_correct: row.try_get::<bool, _>("is_correct").map_err(ser)?,
    })
}

/// Maps a row of the `exams JOIN exam_results` read-back query.
pub(crate) fn map_exam_result_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<StoredExamResult, StorageError> {
    let subject_json: String = row.try_get("subject_ids").map_err(ser)?;
    let subject_ids: Vec<SubjectId> = serde_json::from_str(&subject_json).map_err(ser)?;
    let reason: String = row.try_get("reason").map_err(ser)?;

    let exam = ExamRecord {
        user_id: user_id_from_text(row.try_get("user_id").map_err(ser)?)?,
        subject_ids,
        questions_requested: u32_from_i64(
            "questions_requested",
            row.try_get::<i64, _>("questions_requested").map_err(ser)?,
        )?,
        questions_presented: u32_from_i64(
            "questions_presented",
            row.try_get::<i64, _>("questions_presented").map_err(ser)?,
        )?,
        questions_answered: u32_from_i64(
            "questions_answered",
            row.try_get::<i64, _>("questions_answered").map_err(ser)?,
        )?,
        duration_requested_minutes: u32_from_i64(
            "duration_requested_minutes",
            row.try_get::<i64, _>("duration_requested_minutes")
                .map_err(ser)?,
        )?,
        duration_taken_secs: u32_from_i64(
            "duration_taken_secs",
            row.try_get::<i64, _>("duration_taken_secs").map_err(ser)?,
        )?,
        reason: reason.parse().map_err(ser)?,
        started_at: row.try_get("started_at").map_err(ser)?,
        finished_at: row.try_get("finished_at").map_err(ser)?,
    };

    let percentage = Percentage::from_f64(row.try_get::<f64, _>("percentage").map_err(ser)?)
        .map_err(ser)?;
    let score = Score::from_persisted(
        u32_from_i64("correct", row.try_get::<i64, _>("correct").map_err(ser)?)?,
        u32_from_i64("incorrect", row.try_get::<i64, _>("incorrect").map_err(ser)?)?,
        u32_from_i64(
            "unanswered",
            row.try_get::<i64, _>("unanswered").map_err(ser)?,
        )?,
        percentage,
    )
    .map_err(ser)?;

    Ok(StoredExamResult {
        exam_id: exam_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        exam,
        score,
    })
}
