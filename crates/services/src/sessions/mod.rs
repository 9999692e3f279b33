mod autosave;
mod progress;
mod queries;
mod runner;
mod service;
mod timer;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use autosave::AutosaveSchedule;
pub use progress::SessionProgress;
pub use runner::{SessionCommand, SessionHandle, SessionRunner};
pub use service::{Lifecycle, TestSession, TickOutcome};
pub use timer::Countdown;
pub use view::{CRITICAL_REMAINING_SECS, SessionView, format_remaining};
pub use workflow::{SessionLoopService, attempt_key, snapshot_key};
