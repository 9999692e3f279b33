#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod sessions;

pub use exam_core::Clock;
pub use sessions as session;

pub use config::{ConfigError, EngineSettings};
pub use error::SessionError;

pub use sessions::{
    Lifecycle, SessionCommand, SessionHandle, SessionLoopService, SessionRunner, SessionView,
    TestSession, TickOutcome,
};
