use chrono::{DateTime, Utc};
use std::sync::Arc;

use exam_core::model::{
    CompletedAttempt, Correctness, Question, SessionId, SessionSnapshot, TestConfig, TestResult,
};
use storage::repository::{KeyValueStore, QuestionRepository};

use super::queries::SessionQueries;
use super::service::{Lifecycle, TestSession, TickOutcome};
use crate::Clock;
use crate::config::EngineSettings;
use crate::error::SessionError;

const SNAPSHOT_PREFIX: &str = "exam-session/";
const ATTEMPT_PREFIX: &str = "exam-attempt/";
const HISTORY_KEY: &str = "exam-history";

#[must_use]
pub fn snapshot_key(id: SessionId) -> String {
    format!("{SNAPSHOT_PREFIX}{id}")
}

#[must_use]
pub fn attempt_key(id: SessionId) -> String {
    format!("{ATTEMPT_PREFIX}{id}")
}

/// Orchestrates session start, autosave, submission and attempt history.
///
/// Persistence failures after start are logged and swallowed: the in-memory
/// session stays authoritative and the next autosave or finalize retries.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    questions: Arc<dyn QuestionRepository>,
    kv: Arc<dyn KeyValueStore>,
    settings: EngineSettings,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionRepository>,
        kv: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            clock,
            questions,
            kv,
            settings: EngineSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Start a new attempt drawing questions from the bank for `config`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when the bank cannot satisfy the configuration.
    pub async fn start_session(&self, config: &TestConfig) -> Result<TestSession, SessionError> {
        let questions = SessionQueries::questions_for_config(
            config,
            self.questions.as_ref(),
            self.settings.shuffle_questions,
        )
        .await?;
        self.start_with_questions(config.name(), questions, config.duration_secs())
    }

    /// Start a new attempt over an explicit question list, keeping each question's marks.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if `questions` is empty.
    pub fn start_with_questions(
        &self,
        title: &str,
        questions: Vec<Question>,
        time_budget_secs: u64,
    ) -> Result<TestSession, SessionError> {
        let session = TestSession::new(
            SessionId::generate(),
            title,
            questions,
            time_budget_secs,
            self.settings.scoring,
            self.clock.now(),
        )?;
        tracing::info!(
            session_id = %session.id(),
            questions = session.questions().len(),
            time_budget_secs,
            "Session started"
        );
        Ok(session)
    }

    /// Restore an in-progress attempt from its autosave snapshot.
    ///
    /// Returns `Ok(None)` when no snapshot is stored for `id` or the attempt
    /// was already submitted.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the snapshot cannot be read, decoded or
    /// matched against the question bank.
    pub async fn resume_session(&self, id: SessionId) -> Result<Option<TestSession>, SessionError> {
        if self.is_submitted(id).await? {
            tracing::debug!(session_id = %id, "Stale snapshot of a submitted session ignored");
            return Ok(None);
        }
        let Some(raw) = self.kv.get(&snapshot_key(id)).await? else {
            return Ok(None);
        };
        let snapshot: SessionSnapshot = serde_json::from_str(&raw)?;
        let questions = self.questions.get_questions(&snapshot.question_ids).await?;
        let session =
            TestSession::restore(snapshot, questions, self.settings.scoring, self.clock.now())?;
        tracing::info!(
            session_id = %session.id(),
            remaining_secs = session.time_remaining_secs(),
            "Session resumed"
        );
        Ok(Some(session))
    }

    /// Ids of attempts that have an autosave snapshot and can be resumed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn resumable_sessions(&self) -> Result<Vec<SessionId>, SessionError> {
        let keys = self.kv.keys_with_prefix(SNAPSHOT_PREFIX).await?;
        let mut ids = Vec::with_capacity(keys.len());
        for id in keys
            .iter()
            .filter_map(|key| key.strip_prefix(SNAPSHOT_PREFIX)?.parse().ok())
        {
            if !self.is_submitted(id).await? {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn is_submitted(&self, id: SessionId) -> Result<bool, SessionError> {
        Ok(self.kv.get(&attempt_key(id)).await?.is_some())
    }

    /// Advance the countdown; an expiry is finalized immediately.
    pub async fn tick(&self, session: &mut TestSession) -> TickOutcome {
        let outcome = session.tick(self.clock.now());
        if outcome == TickOutcome::Expired {
            tracing::info!(session_id = %session.id(), "Time expired, session auto-submitted");
            self.finalize(session).await;
        }
        outcome
    }

    /// Periodic save; only active sessions are written. Returns whether a snapshot was stored.
    pub async fn autosave(&self, session: &TestSession) -> bool {
        if session.lifecycle() != Lifecycle::Active {
            return false;
        }
        self.save_snapshot(session).await
    }

    /// Write the current snapshot of a non-submitted session.
    pub async fn save_snapshot(&self, session: &TestSession) -> bool {
        let Some(snapshot) = session.snapshot(self.clock.now()) else {
            return false;
        };
        let key = snapshot_key(session.id());
        let payload = match serde_json::to_string(&snapshot) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(session_id = %session.id(), %error, "Snapshot serialization failed");
                return false;
            }
        };
        match self.kv.put(&key, &payload).await {
            Ok(()) => {
                tracing::debug!(session_id = %session.id(), %key, "Snapshot saved");
                true
            }
            Err(error) => {
                tracing::warn!(session_id = %session.id(), %key, %error, "Snapshot save failed");
                false
            }
        }
    }

    /// Pause and persist the paused state.
    pub async fn pause(&self, session: &mut TestSession) -> bool {
        let paused = session.pause(self.clock.now());
        if paused {
            self.save_snapshot(session).await;
        } else if session.is_submitted() {
            self.finalize(session).await;
        }
        paused
    }

    pub fn resume(&self, session: &mut TestSession) -> bool {
        session.resume(self.clock.now())
    }

    /// Submit the attempt and persist it. Repeated calls return the same result.
    pub async fn submit(&self, session: &mut TestSession) -> TestResult {
        let first = !session.is_submitted();
        let result = session.submit(self.clock.now()).clone();
        if first {
            tracing::info!(
                session_id = %session.id(),
                total_score = result.total_score,
                max_score = result.max_score,
                "Session submitted"
            );
        }
        self.finalize(session).await;
        result
    }

    /// Persist a submitted attempt once: store it, drop the snapshot and index it in history.
    ///
    /// Returns whether the attempt is archived. A failed write leaves the session
    /// unarchived so a later call retries.
    pub async fn finalize(&self, session: &mut TestSession) -> bool {
        if session.is_archived() {
            return true;
        }
        let Some(attempt) = session.completed_attempt() else {
            return false;
        };
        for outcome in &attempt.result.outcomes {
            if outcome.correctness == Correctness::Unscorable {
                tracing::warn!(
                    session_id = %attempt.session_id,
                    question_id = %outcome.question_id,
                    "Answer could not be scored"
                );
            }
        }

        match self.archive(&attempt).await {
            Ok(()) => {
                session.mark_archived();
                true
            }
            Err(error) => {
                tracing::warn!(session_id = %attempt.session_id, %error, "Attempt persistence failed");
                false
            }
        }
    }

    async fn archive(&self, attempt: &CompletedAttempt) -> Result<(), SessionError> {
        let id = attempt.session_id;
        // The snapshot goes first so a submitted attempt is never resumable,
        // even when the attempt record cannot be written yet.
        let sealed = self.kv.remove(&snapshot_key(id)).await;
        self.kv
            .put(&attempt_key(id), &serde_json::to_string(attempt)?)
            .await?;

        let mut history = self.history_ids().await?;
        if !history.contains(&id) {
            history.push(id);
            self.kv
                .put(HISTORY_KEY, &serde_json::to_string(&history)?)
                .await?;
        }

        sealed?;
        Ok(())
    }

    async fn history_ids(&self) -> Result<Vec<SessionId>, SessionError> {
        match self.kv.get(HISTORY_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Completed attempts, oldest first. Index entries without a stored attempt are skipped.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the history index cannot be read or decoded.
    pub async fn history(&self) -> Result<Vec<CompletedAttempt>, SessionError> {
        let mut attempts = Vec::new();
        for id in self.history_ids().await? {
            match self.kv.get(&attempt_key(id)).await? {
                Some(raw) => attempts.push(serde_json::from_str(&raw)?),
                None => {
                    tracing::warn!(session_id = %id, "Attempt missing from history");
                }
            }
        }
        Ok(attempts)
    }
}
