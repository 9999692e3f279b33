use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use exam_core::model::{
    Answer, CompletedAttempt, PaletteStatus, Question, QuestionId, QuestionMarking, QuestionState,
    QuestionStatus, SessionId, SessionSnapshot, SnapshotLifecycle, TestResult,
};
use exam_core::scoring::{ScoringInput, ScoringRules, compute_result};
use exam_core::time::whole_secs_between;

use super::progress::SessionProgress;
use super::timer::Countdown;
use crate::error::SessionError;

//
// ─── LIFECYCLE ─────────────────────────────────────────────────────────────────
//

/// `Active ⇄ Paused → Submitted`; `Submitted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Lifecycle {
    Active,
    Paused,
    Submitted,
}

/// What a countdown tick did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running { remaining_secs: u64 },
    /// Time ran out on this tick and the session was submitted.
    Expired,
    /// The session is paused or already submitted.
    Idle,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory state of one timed attempt.
///
/// All mutation goes through `&mut self`; the caller supplies `now` from the
/// services layer clock so behaviour stays deterministic under test.
pub struct TestSession {
    id: SessionId,
    title: String,
    questions: Vec<Question>,
    states: Vec<QuestionState>,
    index_by_id: HashMap<QuestionId, usize>,
    current: usize,
    current_since: DateTime<Utc>,
    countdown: Countdown,
    time_budget_secs: u64,
    lifecycle: Lifecycle,
    rules: ScoringRules,
    started_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    result: Option<TestResult>,
    archived: bool,
}

impl TestSession {
    /// Start a new attempt over `questions`; the countdown starts at `now`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no questions are provided.
    pub fn new(
        id: SessionId,
        title: impl Into<String>,
        questions: Vec<Question>,
        time_budget_secs: u64,
        rules: ScoringRules,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }
        let mut states = vec![QuestionState::default(); questions.len()];
        states[0].visited = true;

        let mut countdown = Countdown::new(time_budget_secs);
        countdown.start(now);

        Ok(Self {
            id,
            title: title.into(),
            index_by_id: index_questions(&questions),
            questions,
            states,
            current: 0,
            current_since: now,
            countdown,
            time_budget_secs,
            lifecycle: Lifecycle::Active,
            rules,
            started_at: now,
            submitted_at: None,
            result: None,
            archived: false,
        })
    }

    /// Rebuild an in-progress attempt from its autosave snapshot.
    ///
    /// `questions` must be the snapshot's questions in the same order. An
    /// active snapshot resumes counting from `now`; a paused one stays paused.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SnapshotMismatch` when the questions or states do
    /// not line up with the snapshot.
    pub fn restore(
        snapshot: SessionSnapshot,
        questions: Vec<Question>,
        rules: ScoringRules,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let ids_match = questions.len() == snapshot.question_ids.len()
            && questions
                .iter()
                .zip(&snapshot.question_ids)
                .all(|(q, id)| q.id() == id);
        let marking_fits =
            snapshot.marking.is_empty() || snapshot.marking.len() == questions.len();
        if !ids_match
            || !marking_fits
            || snapshot.states.len() != questions.len()
            || snapshot.current_index >= questions.len()
        {
            return Err(SessionError::SnapshotMismatch);
        }
        let questions = if snapshot.marking.is_empty() {
            questions
        } else {
            questions
                .iter()
                .zip(&snapshot.marking)
                .map(|(q, m)| q.with_marking(m.marks, m.negative_marks))
                .collect()
        };

        let mut countdown = Countdown::new(snapshot.time_remaining_secs);
        let lifecycle = match snapshot.lifecycle {
            SnapshotLifecycle::Active => {
                countdown.start(now);
                Lifecycle::Active
            }
            SnapshotLifecycle::Paused => Lifecycle::Paused,
        };

        Ok(Self {
            id: snapshot.session_id,
            title: snapshot.title,
            index_by_id: index_questions(&questions),
            questions,
            states: snapshot.states,
            current: snapshot.current_index,
            current_since: now,
            countdown,
            time_budget_secs: snapshot.time_budget_secs,
            lifecycle,
            rules,
            started_at: snapshot.started_at,
            submitted_at: None,
            result: None,
            archived: false,
        })
    }

    // ─── accessors ────────────────────────────────────────────────────────────

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn states(&self) -> &[QuestionState] {
        &self.states
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.questions[self.current]
    }

    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.lifecycle == Lifecycle::Submitted
    }

    #[must_use]
    pub fn time_budget_secs(&self) -> u64 {
        self.time_budget_secs
    }

    /// Remaining time as of the last reconciliation.
    #[must_use]
    pub fn time_remaining_secs(&self) -> u64 {
        self.countdown.remaining_secs()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    #[must_use]
    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn status(&self, id: &QuestionId) -> Option<QuestionStatus> {
        self.index_by_id.get(id).map(|i| self.states[*i].status())
    }

    /// Recorded answers keyed by question id.
    #[must_use]
    pub fn answers(&self) -> BTreeMap<QuestionId, Answer> {
        self.questions
            .iter()
            .zip(&self.states)
            .filter_map(|(q, s)| s.answer.clone().map(|a| (q.id().clone(), a)))
            .collect()
    }

    #[must_use]
    pub fn palette(&self) -> Vec<PaletteStatus> {
        self.states.iter().map(QuestionState::palette).collect()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let visited = self.states.iter().filter(|s| s.visited).count();
        SessionProgress {
            total: self.states.len(),
            answered: self.states.iter().filter(|s| s.answered()).count(),
            marked: self.states.iter().filter(|s| s.marked).count(),
            visited,
            not_visited: self.states.len() - visited,
        }
    }

    // ─── answers ──────────────────────────────────────────────────────────────

    /// Store or overwrite the answer to a question and mark it visited.
    ///
    /// A blank answer clears the question instead; it is still marked visited.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Submitted` after submission,
    /// `SessionError::UnknownQuestion` for ids outside this session,
    /// `SessionError::AnswerShape` when the answer does not fit the question kind
    /// and `SessionError::OptionOutOfRange` for an option the question lacks.
    /// State is unchanged on error.
    pub fn record_answer(
        &mut self,
        question_id: &QuestionId,
        answer: Answer,
    ) -> Result<(), SessionError> {
        let index = self.mutable_index(question_id)?;
        if answer.is_blank() {
            let state = &mut self.states[index];
            state.answer = None;
            state.visited = true;
            return Ok(());
        }
        let kind = self.questions[index].kind();
        if !answer.fits(kind) {
            return Err(SessionError::AnswerShape {
                id: question_id.clone(),
                kind,
            });
        }
        let options = self.questions[index].options().len();
        if !answer.within_options(options) {
            return Err(SessionError::OptionOutOfRange {
                id: question_id.clone(),
                options,
            });
        }
        let state = &mut self.states[index];
        state.answer = Some(answer);
        state.visited = true;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::Submitted` or `SessionError::UnknownQuestion`.
    pub fn clear_answer(&mut self, question_id: &QuestionId) -> Result<(), SessionError> {
        let index = self.mutable_index(question_id)?;
        self.states[index].answer = None;
        Ok(())
    }

    /// Flip the review mark and return the new value.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Submitted` or `SessionError::UnknownQuestion`.
    pub fn toggle_mark(&mut self, question_id: &QuestionId) -> Result<bool, SessionError> {
        let index = self.mutable_index(question_id)?;
        let state = &mut self.states[index];
        state.marked = !state.marked;
        state.visited = true;
        Ok(state.marked)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Submitted` or `SessionError::UnknownQuestion`.
    pub fn accumulate_time(
        &mut self,
        question_id: &QuestionId,
        delta_secs: u64,
    ) -> Result<(), SessionError> {
        let index = self.mutable_index(question_id)?;
        self.states[index].add_time(delta_secs);
        Ok(())
    }

    fn mutable_index(&self, question_id: &QuestionId) -> Result<usize, SessionError> {
        if self.is_submitted() {
            return Err(SessionError::Submitted);
        }
        self.index_by_id
            .get(question_id)
            .copied()
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.clone()))
    }

    // ─── navigation ───────────────────────────────────────────────────────────

    /// Move to `index`, crediting the time spent on the outgoing question.
    ///
    /// Returns `false` and changes nothing when the index is out of range or the
    /// session is submitted.
    pub fn go_to(&mut self, index: usize, now: DateTime<Utc>) -> bool {
        if self.is_submitted() || index >= self.questions.len() {
            return false;
        }
        if self.lifecycle == Lifecycle::Active {
            self.flush_current(now);
        }
        self.states[self.current].visited = true;
        self.current = index;
        self.states[index].visited = true;
        self.current_since = now;
        true
    }

    pub fn next(&mut self, now: DateTime<Utc>) -> bool {
        self.current + 1 < self.questions.len() && self.go_to(self.current + 1, now)
    }

    pub fn previous(&mut self, now: DateTime<Utc>) -> bool {
        self.current > 0 && self.go_to(self.current - 1, now)
    }

    fn flush_current(&mut self, now: DateTime<Utc>) {
        let delta = whole_secs_between(self.current_since, now);
        self.states[self.current].add_time(delta);
        self.current_since = now;
    }

    // ─── timer ────────────────────────────────────────────────────────────────

    /// Advance the countdown to `now`, submitting once it reaches zero.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if self.lifecycle != Lifecycle::Active {
            return TickOutcome::Idle;
        }
        let remaining_secs = self.countdown.reconcile(now);
        if remaining_secs == 0 {
            self.submit(now);
            return TickOutcome::Expired;
        }
        TickOutcome::Running { remaining_secs }
    }

    /// Freeze the countdown and question time. Returns `false` unless active.
    ///
    /// If the time ran out before the pause, the session is submitted instead.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        if self.lifecycle != Lifecycle::Active {
            return false;
        }
        if self.countdown.stop(now) == 0 {
            self.submit(now);
            return false;
        }
        self.flush_current(now);
        self.lifecycle = Lifecycle::Paused;
        true
    }

    /// Continue from the remaining time frozen by `pause`. Returns `false` unless paused.
    pub fn resume(&mut self, now: DateTime<Utc>) -> bool {
        if self.lifecycle != Lifecycle::Paused {
            return false;
        }
        self.countdown.start(now);
        self.current_since = now;
        self.lifecycle = Lifecycle::Active;
        true
    }

    // ─── submission ───────────────────────────────────────────────────────────

    /// Submit the attempt and return its result.
    ///
    /// The result is computed on the first call; later calls return it unchanged.
    pub fn submit(&mut self, now: DateTime<Utc>) -> &TestResult {
        let result = match self.result.take() {
            Some(result) => result,
            None => {
                if self.lifecycle == Lifecycle::Active {
                    self.flush_current(now);
                    self.countdown.stop(now);
                }
                self.lifecycle = Lifecycle::Submitted;
                self.submitted_at = Some(now);
                compute_result(
                    ScoringInput {
                        session_id: self.id,
                        questions: &self.questions,
                        states: &self.states,
                        time_budget_secs: self.time_budget_secs,
                        time_remaining_secs: self.countdown.remaining_secs(),
                    },
                    &self.rules,
                )
            }
        };
        self.result.insert(result)
    }

    /// Whether the submitted attempt has been persisted.
    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.archived
    }

    pub(crate) fn mark_archived(&mut self) {
        self.archived = true;
    }

    // ─── persistence shapes ───────────────────────────────────────────────────

    /// Autosave picture at `now`; `None` once submitted.
    ///
    /// Time on the current question and the countdown are reconciled in the
    /// copy without mutating the session.
    #[must_use]
    pub fn snapshot(&self, now: DateTime<Utc>) -> Option<SessionSnapshot> {
        let lifecycle = match self.lifecycle {
            Lifecycle::Active => SnapshotLifecycle::Active,
            Lifecycle::Paused => SnapshotLifecycle::Paused,
            Lifecycle::Submitted => return None,
        };
        let mut states = self.states.clone();
        if self.lifecycle == Lifecycle::Active {
            states[self.current].add_time(whole_secs_between(self.current_since, now));
        }

        Some(SessionSnapshot {
            session_id: self.id,
            title: self.title.clone(),
            question_ids: self.questions.iter().map(|q| q.id().clone()).collect(),
            states,
            marking: self
                .questions
                .iter()
                .map(|q| QuestionMarking {
                    marks: q.marks(),
                    negative_marks: q.negative_marks(),
                })
                .collect(),
            current_index: self.current,
            time_remaining_secs: self.countdown.remaining_at(now),
            time_budget_secs: self.time_budget_secs,
            lifecycle,
            started_at: self.started_at,
            saved_at: now,
        })
    }

    /// Immutable record of a submitted attempt; `None` before submission.
    #[must_use]
    pub fn completed_attempt(&self) -> Option<CompletedAttempt> {
        let result = self.result.clone()?;
        let submitted_at = self.submitted_at?;
        let ids_where = |pred: fn(&QuestionState) -> bool| -> Vec<QuestionId> {
            self.questions
                .iter()
                .zip(&self.states)
                .filter(|(_, s)| pred(s))
                .map(|(q, _)| q.id().clone())
                .collect()
        };

        Some(CompletedAttempt {
            session_id: self.id,
            title: self.title.clone(),
            started_at: self.started_at,
            submitted_at,
            question_ids: self.questions.iter().map(|q| q.id().clone()).collect(),
            answers: self.answers(),
            marked: ids_where(|s| s.marked),
            visited: ids_where(|s| s.visited),
            time_per_question: self
                .questions
                .iter()
                .zip(&self.states)
                .map(|(q, s)| (q.id().clone(), s.time_taken_secs))
                .collect(),
            result,
        })
    }
}

fn index_questions(questions: &[Question]) -> HashMap<QuestionId, usize> {
    let mut index = HashMap::with_capacity(questions.len());
    for (i, q) in questions.iter().enumerate() {
        index.entry(q.id().clone()).or_insert(i);
    }
    index
}

impl fmt::Debug for TestSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSession")
            .field("id", &self.id)
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("lifecycle", &self.lifecycle)
            .field("remaining_secs", &self.countdown.remaining_secs())
            .field("started_at", &self.started_at)
            .field("submitted_at", &self.submitted_at)
            .field("archived", &self.archived)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
