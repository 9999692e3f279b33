use async_trait::async_trait;
use exam_core::model::{Question, QuestionId, Subject};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read/write access to the question bank.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Persist or replace a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Fetch questions by id, in the order requested.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if any id is missing, or other storage errors.
    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError>;

    /// All questions of a subject, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be read.
    async fn list_by_subject(&self, subject: Subject) -> Result<Vec<Question>, StorageError>;
}

/// String key-value persistence used for snapshots, attempts and history.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the read fails. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Remove `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Keys starting with `prefix`, sorted ascending.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<HashMap<QuestionId, Question>>>,
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        guard.insert(question.id().clone(), question.clone());
        Ok(())
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        ids.iter()
            .map(|id| guard.get(id).cloned().ok_or(StorageError::NotFound))
            .collect()
    }

    async fn list_by_subject(&self, subject: Subject) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        let mut found: Vec<Question> = guard
            .values()
            .filter(|q| q.subject() == subject)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(found)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryRepository {
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self.entries.lock().map_err(poisoned)?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self.entries.lock().map_err(poisoned)?;
        Ok(guard.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self.entries.lock().map_err(poisoned)?;
        guard.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let guard = self.entries.lock().map_err(poisoned)?;
        Ok(guard
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

/// Aggregates the question bank and key-value store behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub kv: Arc<dyn KeyValueStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let kv: Arc<dyn KeyValueStore> = Arc::new(repo);
        Self { questions, kv }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{AnswerKey, Difficulty, QuestionDraft, QuestionKind};

    fn build_question(id: &str, subject: Subject) -> Question {
        QuestionDraft {
            id: QuestionId::new(id),
            subject,
            topic: "Thermodynamics".into(),
            difficulty: Difficulty::Moderate,
            kind: QuestionKind::SingleCorrect,
            prompt: "Which process is adiabatic?".into(),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            answer_key: AnswerKey::Single(2),
            marks: 4,
            negative_marks: -1,
            estimated_time_secs: 120,
        }
        .validate()
        .unwrap()
    }

    #[tokio::test]
    async fn get_questions_preserves_requested_order() {
        let repo = InMemoryRepository::new();
        for id in ["phy_001", "phy_002", "chem_001"] {
            let subject = if id.starts_with("phy") {
                Subject::Physics
            } else {
                Subject::Chemistry
            };
            repo.upsert_question(&build_question(id, subject)).await.unwrap();
        }

        let ids = [QuestionId::new("chem_001"), QuestionId::new("phy_001")];
        let fetched = repo.get_questions(&ids).await.unwrap();
        let got: Vec<_> = fetched.iter().map(|q| q.id().as_str()).collect();
        assert_eq!(got, vec!["chem_001", "phy_001"]);

        let physics = repo.list_by_subject(Subject::Physics).await.unwrap();
        assert_eq!(physics.len(), 2);
        assert_eq!(physics[0].id().as_str(), "phy_001");
    }

    #[tokio::test]
    async fn missing_question_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo
            .get_questions(&[QuestionId::new("nope")])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn key_value_prefix_listing() {
        let repo = InMemoryRepository::new();
        repo.put("exam-attempt/b", "2").await.unwrap();
        repo.put("exam-attempt/a", "1").await.unwrap();
        repo.put("exam-session/a", "x").await.unwrap();

        let keys = repo.keys_with_prefix("exam-attempt/").await.unwrap();
        assert_eq!(keys, vec!["exam-attempt/a", "exam-attempt/b"]);

        repo.remove("exam-attempt/a").await.unwrap();
        repo.remove("exam-attempt/a").await.unwrap();
        assert_eq!(repo.get("exam-attempt/a").await.unwrap(), None);
        assert_eq!(repo.get("exam-attempt/b").await.unwrap().as_deref(), Some("2"));
    }
}
