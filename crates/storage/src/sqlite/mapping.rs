use exam_core::model::{AnswerKey, Question, QuestionDraft, QuestionId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn i32_from_i64(field: &'static str, v: i64) -> Result<i32, StorageError> {
    i32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// Column values for one `questions` row; option list and key are JSON text.
pub(crate) struct QuestionColumns {
    pub options: String,
    pub answer_key: String,
}

pub(crate) fn question_columns(question: &Question) -> Result<QuestionColumns, StorageError> {
    Ok(QuestionColumns {
        options: serde_json::to_string(question.options()).map_err(ser)?,
        answer_key: serde_json::to_string(question.answer_key()).map_err(ser)?,
    })
}

/// Rebuilds a `Question` from a row, re-running domain validation.
pub(crate) fn map_question_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let options: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("options").map_err(ser)?).map_err(ser)?;
    let answer_key: AnswerKey =
        serde_json::from_str(&row.try_get::<String, _>("answer_key").map_err(ser)?)
            .map_err(ser)?;

    QuestionDraft {
        id: QuestionId::new(row.try_get::<String, _>("id").map_err(ser)?),
        subject: row
            .try_get::<String, _>("subject")
            .map_err(ser)?
            .parse()
            .map_err(ser)?,
        topic: row.try_get("topic").map_err(ser)?,
        difficulty: row
            .try_get::<String, _>("difficulty")
            .map_err(ser)?
            .parse()
            .map_err(ser)?,
        kind: row
            .try_get::<String, _>("kind")
            .map_err(ser)?
            .parse()
            .map_err(ser)?,
        prompt: row.try_get("prompt").map_err(ser)?,
        options,
        answer_key,
        marks: u32_from_i64("marks", row.try_get("marks").map_err(ser)?)?,
        negative_marks: i32_from_i64("negative_marks", row.try_get("negative_marks").map_err(ser)?)?,
        estimated_time_secs: u32_from_i64(
            "estimated_time_secs",
            row.try_get("estimated_time_secs").map_err(ser)?,
        )?,
    }
    .validate()
    .map_err(ser)
}
