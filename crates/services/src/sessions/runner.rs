use tokio::sync::{mpsc, watch};
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval, sleep};

use exam_core::model::{Answer, QuestionId};

use super::autosave::AutosaveSchedule;
use super::service::{TestSession, TickOutcome};
use super::view::SessionView;
use super::workflow::SessionLoopService;

const COMMAND_BUFFER: usize = 32;
const PERSIST_RETRY_INITIAL: Duration = Duration::from_millis(250);
const PERSIST_RETRY_MAX: Duration = Duration::from_secs(30);

/// Candidate actions sent to a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Answer {
        question_id: QuestionId,
        answer: Answer,
    },
    /// Clear the answer on the current question.
    Clear,
    /// Toggle the review mark on the current question.
    ToggleMark,
    GoTo(usize),
    Next,
    Previous,
    Pause,
    Resume,
    Submit,
    /// Stop driving the session without submitting; the last autosave stays resumable.
    Exit,
}

/// Caller side of a running session.
#[derive(Debug)]
pub struct SessionHandle {
    pub commands: mpsc::Sender<SessionCommand>,
    pub view: watch::Receiver<SessionView>,
}

/// Owns a session and serializes ticks, autosaves and commands onto one task.
pub struct SessionRunner {
    service: SessionLoopService,
    session: TestSession,
    commands: mpsc::Receiver<SessionCommand>,
    view: watch::Sender<SessionView>,
}

impl SessionRunner {
    #[must_use]
    pub fn new(service: SessionLoopService, session: TestSession) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (view_tx, view_rx) = watch::channel(SessionView::from_session(&session, service.now()));
        let runner = Self {
            service,
            session,
            commands: command_rx,
            view: view_tx,
        };
        let handle = SessionHandle {
            commands: command_tx,
            view: view_rx,
        };
        (runner, handle)
    }

    /// Drive the session until it is submitted, the caller exits, or every sender is dropped.
    ///
    /// A submitted attempt that could not be persisted is retried with backoff
    /// until it is archived or the caller exits. Returns the session in its
    /// final state.
    pub async fn run(self) -> TestSession {
        let Self {
            service,
            mut session,
            mut commands,
            view,
        } = self;

        let settings = service.settings().clone();
        let mut ticker = interval(settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut autosave_timer = interval(settings.autosave_interval);
        autosave_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut schedule = AutosaveSchedule::new(settings.autosave_interval, service.now());

        let mut exited = false;
        while !session.is_submitted() {
            tokio::select! {
                _ = ticker.tick() => {
                    if let TickOutcome::Running { .. } | TickOutcome::Expired =
                        service.tick(&mut session).await
                    {
                        view.send_replace(SessionView::from_session(&session, service.now()));
                    }
                }
                _ = autosave_timer.tick() => {
                    let now = service.now();
                    if schedule.is_due(now) && service.autosave(&session).await {
                        schedule.mark_saved(now);
                    }
                }
                command = commands.recv() => {
                    let Some(command) = command.filter(|c| !matches!(c, SessionCommand::Exit)) else {
                        tracing::info!(session_id = %session.id(), "Session runner exited");
                        exited = true;
                        break;
                    };
                    apply(&service, &mut session, &mut schedule, command).await;
                    view.send_replace(SessionView::from_session(&session, service.now()));
                }
            }
        }

        let mut backoff = PERSIST_RETRY_INITIAL;
        while !exited && session.is_submitted() && !session.is_archived() {
            tokio::select! {
                () = sleep(backoff) => {
                    if !service.finalize(&mut session).await {
                        backoff = (backoff * 2).min(PERSIST_RETRY_MAX);
                    }
                }
                command = commands.recv() => {
                    match command {
                        None | Some(SessionCommand::Exit) => exited = true,
                        Some(command) => tracing::debug!(
                            session_id = %session.id(),
                            ?command,
                            "Command ignored after submission"
                        ),
                    }
                }
            }
        }
        if session.is_submitted() && !session.is_archived() {
            tracing::warn!(session_id = %session.id(), "Runner stopped before the attempt was persisted");
        }

        session
    }
}

async fn apply(
    service: &SessionLoopService,
    session: &mut TestSession,
    schedule: &mut AutosaveSchedule,
    command: SessionCommand,
) {
    let now = service.now();
    let current = session.current_question().id().clone();
    let applied = match &command {
        SessionCommand::Answer {
            question_id,
            answer,
        } => match session.record_answer(question_id, answer.clone()) {
            Ok(()) => true,
            Err(error) => {
                tracing::debug!(session_id = %session.id(), %error, "Answer rejected");
                return;
            }
        },
        SessionCommand::Clear => session.clear_answer(&current).is_ok(),
        SessionCommand::ToggleMark => session.toggle_mark(&current).is_ok(),
        SessionCommand::GoTo(index) => session.go_to(*index, now),
        SessionCommand::Next => session.next(now),
        SessionCommand::Previous => session.previous(now),
        SessionCommand::Pause => {
            let paused = service.pause(session).await;
            if paused {
                schedule.mark_saved(now);
            }
            paused
        }
        SessionCommand::Resume => service.resume(session),
        SessionCommand::Submit => {
            service.submit(session).await;
            true
        }
        SessionCommand::Exit => false,
    };
    if !applied {
        tracing::debug!(session_id = %session.id(), ?command, "Command ignored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use exam_core::Clock;
    use exam_core::model::{AnswerKey, Difficulty, QuestionDraft, QuestionKind, Subject};
    use exam_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    use crate::config::EngineSettings;
    use crate::sessions::service::Lifecycle;

    fn question(id: &str) -> exam_core::model::Question {
        QuestionDraft {
            id: QuestionId::new(id),
            subject: Subject::Physics,
            topic: "Kinematics".into(),
            difficulty: Difficulty::Easy,
            kind: QuestionKind::SingleCorrect,
            prompt: "Pick".into(),
            options: vec!["A".into(), "B".into()],
            answer_key: AnswerKey::Single(1),
            marks: 4,
            negative_marks: -1,
            estimated_time_secs: 60,
        }
        .validate()
        .unwrap()
    }

    fn service(repo: &InMemoryRepository, clock: Clock) -> SessionLoopService {
        SessionLoopService::new(clock, Arc::new(repo.clone()), Arc::new(repo.clone()))
            .with_settings(EngineSettings {
                tick_interval: Duration::from_millis(20),
                ..EngineSettings::default()
            })
    }

    #[tokio::test]
    async fn commands_update_view_and_submit_ends_run() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo, Clock::fixed(fixed_now()));
        let session = svc
            .start_with_questions("Runner", vec![question("a"), question("b")], 600)
            .unwrap();
        let (runner, mut handle) = SessionRunner::new(svc.clone(), session);
        let task = tokio::spawn(runner.run());

        handle
            .commands
            .send(SessionCommand::Answer {
                question_id: QuestionId::new("a"),
                answer: Answer::Choice(1),
            })
            .await
            .unwrap();
        handle.commands.send(SessionCommand::Next).await.unwrap();
        handle.commands.send(SessionCommand::ToggleMark).await.unwrap();

        handle
            .view
            .wait_for(|view| view.current_index == 1 && view.progress.marked == 1)
            .await
            .unwrap();
        assert_eq!(handle.view.borrow().progress.answered, 1);

        handle.commands.send(SessionCommand::Submit).await.unwrap();
        let session = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(session.is_archived());
        assert_eq!(session.result().unwrap().total_score, 4);
        assert_eq!(svc.history().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exit_leaves_session_resumable() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo, Clock::fixed(fixed_now()));
        let session = svc
            .start_with_questions("Exit", vec![question("a")], 600)
            .unwrap();
        let (runner, handle) = SessionRunner::new(svc.clone(), session);
        let task = tokio::spawn(runner.run());

        handle.commands.send(SessionCommand::Pause).await.unwrap();
        handle.commands.send(SessionCommand::Exit).await.unwrap();
        let session = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(session.lifecycle(), Lifecycle::Paused);
        assert_eq!(svc.resumable_sessions().await.unwrap(), vec![session.id()]);
    }

    #[tokio::test]
    async fn countdown_expiry_submits_with_real_clock() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo, Clock::default_clock());
        let session = svc
            .start_with_questions("Timed", vec![question("a")], 1)
            .unwrap();
        let (runner, handle) = SessionRunner::new(svc.clone(), session);

        let session = tokio::time::timeout(Duration::from_secs(5), runner.run())
            .await
            .unwrap();
        assert!(session.is_submitted());
        assert_eq!(session.time_remaining_secs(), 0);
        assert_eq!(handle.view.borrow().lifecycle, Lifecycle::Submitted);
        assert!(session.is_archived());
    }
}
