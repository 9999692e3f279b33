use std::collections::HashMap;

use exam_core::model::{Question, QuestionId, Subject};

use super::SqliteRepository;
use super::mapping::{conn, map_question_row, question_columns};
use crate::repository::{QuestionRepository, StorageError};

const SELECT_COLUMNS: &str = r"
    SELECT id, subject, topic, difficulty, kind, prompt, options, answer_key,
           marks, negative_marks, estimated_time_secs
    FROM questions
";

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let columns = question_columns(question)?;

        sqlx::query(
            r"
            INSERT INTO questions (
                id, subject, topic, difficulty, kind, prompt, options, answer_key,
                marks, negative_marks, estimated_time_secs
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                subject = excluded.subject,
                topic = excluded.topic,
                difficulty = excluded.difficulty,
                kind = excluded.kind,
                prompt = excluded.prompt,
                options = excluded.options,
                answer_key = excluded.answer_key,
                marks = excluded.marks,
                negative_marks = excluded.negative_marks,
                estimated_time_secs = excluded.estimated_time_secs
            ",
        )
        .bind(question.id().as_str())
        .bind(question.subject().as_str())
        .bind(question.topic())
        .bind(question.difficulty().as_str())
        .bind(question.kind().as_str())
        .bind(question.prompt())
        .bind(columns.options)
        .bind(columns.answer_key)
        .bind(i64::from(question.marks()))
        .bind(i64::from(question.negative_marks()))
        .bind(i64::from(question.estimated_time_secs()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (1..=ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("{SELECT_COLUMNS} WHERE id IN ({placeholders})");

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.as_str());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;

        let mut by_id = HashMap::with_capacity(rows.len());
        for row in &rows {
            let question = map_question_row(row)?;
            by_id.insert(question.id().clone(), question);
        }

        ids.iter()
            .map(|id| by_id.get(id).cloned().ok_or(StorageError::NotFound))
            .collect()
    }

    async fn list_by_subject(&self, subject: Subject) -> Result<Vec<Question>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE subject = ?1 ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .bind(subject.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_question_row).collect()
    }
}
