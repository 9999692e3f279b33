mod answer;
mod config;
mod ids;
mod question;
mod result;
mod snapshot;
mod state;

pub use answer::{Answer, display_key};
pub use config::{SubjectCounts, TestConfig, TestConfigError};
pub use ids::{ParseIdError, QuestionId, SessionId};
pub use question::{
    AnswerKey, Difficulty, IntegerRange, Question, QuestionDraft, QuestionError, QuestionKind,
    Subject,
};
pub use result::{
    Correctness, GroupStats, PercentileEstimate, QuestionOutcome, SubjectAnalysis, TestResult,
    TimeAnalysis, TimeManagement, TopicAnalysis,
};
pub use snapshot::{CompletedAttempt, QuestionMarking, SessionSnapshot, SnapshotLifecycle};
pub use state::{PaletteStatus, QuestionState, QuestionStatus};
