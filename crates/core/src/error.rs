use thiserror::Error;

use crate::model::{ParseIdError, QuestionError, TestConfigError};
use crate::scoring::{ScoringError, TimeBandsError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Config(#[from] TestConfigError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    TimeBands(#[from] TimeBandsError),
    #[error(transparent)]
    Id(#[from] ParseIdError),
}
