use chrono::{DateTime, Utc};
use serde::Serialize;

use exam_core::model::{PaletteStatus, QuestionId, SessionId};

use super::progress::SessionProgress;
use super::service::{Lifecycle, TestSession};

/// Remaining time below which the countdown is shown as critical.
pub const CRITICAL_REMAINING_SECS: u64 = 300;

/// Read-only picture of a session for presentation.
///
/// Published after every state change; consumers never mutate the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub title: String,
    pub lifecycle: Lifecycle,
    pub current_index: usize,
    pub current_question_id: QuestionId,
    pub remaining_secs: u64,
    pub remaining_display: String,
    pub critical: bool,
    pub progress: SessionProgress,
    pub palette: Vec<PaletteStatus>,
}

impl SessionView {
    #[must_use]
    pub fn from_session(session: &TestSession, now: DateTime<Utc>) -> Self {
        let remaining_secs = match session.snapshot(now) {
            Some(snapshot) => snapshot.time_remaining_secs,
            None => session.time_remaining_secs(),
        };
        Self {
            session_id: session.id(),
            title: session.title().to_string(),
            lifecycle: session.lifecycle(),
            current_index: session.current_index(),
            current_question_id: session.current_question().id().clone(),
            remaining_secs,
            remaining_display: format_remaining(remaining_secs),
            critical: remaining_secs < CRITICAL_REMAINING_SECS,
            progress: session.progress(),
            palette: session.palette(),
        }
    }
}

/// `HH:MM:SS` when at least an hour is left, otherwise `MM:SS`.
#[must_use]
pub fn format_remaining(secs: u64) -> String {
    let hours = secs / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
