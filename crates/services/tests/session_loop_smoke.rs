use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use exam_core::model::{
    Answer, AnswerKey, Correctness, Difficulty, Question, QuestionDraft, QuestionId, QuestionKind,
    Subject, SubjectCounts, TestConfig,
};
use exam_core::time::fixed_now;
use services::{
    Clock, Lifecycle, SessionCommand, SessionLoopService, SessionRunner, sessions::snapshot_key,
};
use storage::repository::{InMemoryRepository, KeyValueStore, QuestionRepository, StorageError};

fn single(id: &str, subject: Subject, correct: usize) -> Question {
    QuestionDraft {
        id: QuestionId::new(id),
        subject,
        topic: "Mechanics".into(),
        difficulty: Difficulty::Moderate,
        kind: QuestionKind::SingleCorrect,
        prompt: format!("Question {id}"),
        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        answer_key: AnswerKey::Single(correct),
        marks: 3,
        negative_marks: -1,
        estimated_time_secs: 120,
    }
    .validate()
    .unwrap()
}

#[tokio::test]
async fn session_loop_archives_attempt() {
    let repo = InMemoryRepository::new();
    for i in 0..3 {
        repo.upsert_question(&single(&format!("physics_{i}"), Subject::Physics, 0))
            .await
            .unwrap();
    }

    let loop_svc = SessionLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );
    let config = TestConfig::new("Smoke", 15, 3, SubjectCounts::new(3, 0, 0), 4, 1, true).unwrap();
    let mut session = loop_svc.start_session(&config).await.unwrap();

    session
        .record_answer(&QuestionId::new("physics_0"), Answer::Choice(0))
        .unwrap();
    session
        .record_answer(&QuestionId::new("physics_1"), Answer::Choice(2))
        .unwrap();
    assert!(loop_svc.autosave(&session).await);

    let result = loop_svc.submit(&mut session).await;
    assert_eq!(result.total_score, 3);
    assert_eq!(result.max_score, 12);
    assert_eq!(result.questions_correct, 1);
    assert_eq!(result.questions_incorrect, 1);
    assert_eq!(result.questions_unattempted, 1);

    assert!(repo.get(&snapshot_key(session.id())).await.unwrap().is_none());
    let history = loop_svc.history().await.unwrap();
    assert_eq!(history.len(), 1);
    let attempt = &history[0];
    assert_eq!(attempt.title, "Smoke");
    assert_eq!(attempt.result.total_score, result.total_score);
    assert_eq!(
        attempt.answers.get(&QuestionId::new("physics_1")),
        Some(&Answer::Choice(2))
    );
    assert_eq!(attempt.result.outcomes[2].correctness, Correctness::Unattempted);
}

/// Store whose writes always fail; reads see nothing.
struct BrokenStore;

#[async_trait]
impl KeyValueStore for BrokenStore {
    async fn put(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Connection("disk unavailable".into()))
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    async fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Connection("disk unavailable".into()))
    }

    async fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn persistence_failures_do_not_lose_the_result() {
    let repo = InMemoryRepository::new();
    let loop_svc = SessionLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(BrokenStore),
    );
    let mut session = loop_svc
        .start_with_questions("Offline", vec![single("chem_1", Subject::Chemistry, 1)], 300)
        .unwrap();
    session
        .record_answer(&QuestionId::new("chem_1"), Answer::Choice(1))
        .unwrap();

    assert!(!loop_svc.autosave(&session).await);

    let result = loop_svc.submit(&mut session).await;
    assert_eq!(result.total_score, 3);
    assert!(session.is_submitted());
    assert!(!session.is_archived());
    assert!(!loop_svc.finalize(&mut session).await);
}

/// In-memory store whose `exam-attempt/` writes fail a set number of times.
#[derive(Clone)]
struct FlakyAttemptStore {
    inner: InMemoryRepository,
    failures_left: Arc<AtomicUsize>,
}

impl FlakyAttemptStore {
    fn new(inner: InMemoryRepository, failures: usize) -> Self {
        Self {
            inner,
            failures_left: Arc::new(AtomicUsize::new(failures)),
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyAttemptStore {
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let failing = key.starts_with("exam-attempt/")
            && self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if failing {
            return Err(StorageError::Connection("quota exceeded".into()));
        }
        self.inner.put(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.inner.keys_with_prefix(prefix).await
    }
}

#[tokio::test]
async fn submitted_attempt_is_never_resumable() {
    let repo = InMemoryRepository::new();
    let question = single("phys_1", Subject::Physics, 0);
    repo.upsert_question(&question).await.unwrap();
    let store = FlakyAttemptStore::new(repo.clone(), usize::MAX);
    let loop_svc = SessionLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(store),
    );

    let mut session = loop_svc
        .start_with_questions("Sealed", vec![question], 300)
        .unwrap();
    session
        .record_answer(&QuestionId::new("phys_1"), Answer::Choice(3))
        .unwrap();
    assert!(loop_svc.autosave(&session).await);

    let result = loop_svc.submit(&mut session).await;
    assert_eq!(result.total_score, -1);
    assert!(!session.is_archived());

    assert!(loop_svc.resumable_sessions().await.unwrap().is_empty());
    assert!(
        loop_svc
            .resume_session(session.id())
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(loop_svc.submit(&mut session).await.total_score, -1);
}

#[tokio::test]
async fn stale_snapshot_is_ignored_once_attempt_exists() {
    let repo = InMemoryRepository::new();
    let question = single("chem_2", Subject::Chemistry, 1);
    repo.upsert_question(&question).await.unwrap();
    let loop_svc = SessionLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );

    let mut session = loop_svc
        .start_with_questions("Stale", vec![question], 300)
        .unwrap();
    assert!(loop_svc.autosave(&session).await);
    let stale = repo.get(&snapshot_key(session.id())).await.unwrap().unwrap();
    loop_svc.submit(&mut session).await;

    repo.put(&snapshot_key(session.id()), &stale).await.unwrap();
    assert!(loop_svc.resumable_sessions().await.unwrap().is_empty());
    assert!(
        loop_svc
            .resume_session(session.id())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn runner_retries_persisting_until_the_store_recovers() {
    let repo = InMemoryRepository::new();
    let store = FlakyAttemptStore::new(repo.clone(), 2);
    let loop_svc = SessionLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(store),
    );
    let session = loop_svc
        .start_with_questions("Retry", vec![single("math_1", Subject::Mathematics, 2)], 300)
        .unwrap();

    let (runner, handle) = SessionRunner::new(loop_svc.clone(), session);
    let task = tokio::spawn(runner.run());
    handle
        .commands
        .send(SessionCommand::Answer {
            question_id: QuestionId::new("math_1"),
            answer: Answer::Choice(2),
        })
        .await
        .unwrap();
    handle.commands.send(SessionCommand::Submit).await.unwrap();

    let session = tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.lifecycle(), Lifecycle::Submitted);
    assert!(session.is_archived());

    let history = loop_svc.history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].result.total_score, 3);
}
