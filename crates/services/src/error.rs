//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::{QuestionError, QuestionId, QuestionKind, Subject, TestConfigError};
use storage::repository::StorageError;

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    Empty,
    #[error("session already submitted")]
    Submitted,
    #[error("question {0} is not part of this session")]
    UnknownQuestion(QuestionId),
    #[error("answer does not fit a {kind} question ({id})")]
    AnswerShape { id: QuestionId, kind: QuestionKind },
    #[error("answer to {id} picks an option outside its {options} options")]
    OptionOutOfRange { id: QuestionId, options: usize },
    #[error("not enough {subject} questions: need {needed}, have {available}")]
    NotEnoughQuestions {
        subject: Subject,
        needed: usize,
        available: usize,
    },
    #[error("snapshot does not match the stored questions")]
    SnapshotMismatch,
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Config(#[from] TestConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
