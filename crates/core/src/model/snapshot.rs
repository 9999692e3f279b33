use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::answer::Answer;
use crate::model::ids::{QuestionId, SessionId};
use crate::model::result::TestResult;
use crate::model::state::QuestionState;

/// Lifecycle a snapshot was taken in; submitted sessions are never snapshotted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotLifecycle {
    Active,
    Paused,
}

/// Marking scheme a question carried when the session started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionMarking {
    pub marks: u32,
    pub negative_marks: u32,
}

/// Autosaved picture of an in-progress session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub title: String,
    pub question_ids: Vec<QuestionId>,
    /// One entry per question, in `question_ids` order.
    pub states: Vec<QuestionState>,
    /// Per-question marks as started; empty means the bank's own marks apply.
    #[serde(default)]
    pub marking: Vec<QuestionMarking>,
    pub current_index: usize,
    pub time_remaining_secs: u64,
    pub time_budget_secs: u64,
    pub lifecycle: SnapshotLifecycle,
    pub started_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
}

/// Immutable record persisted once a session is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedAttempt {
    pub session_id: SessionId,
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub question_ids: Vec<QuestionId>,
    pub answers: BTreeMap<QuestionId, Answer>,
    pub marked: Vec<QuestionId>,
    pub visited: Vec<QuestionId>,
    pub time_per_question: BTreeMap<QuestionId, u64>,
    pub result: TestResult,
}
