use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::question::{AnswerKey, QuestionKind};

/// A candidate's response, shaped like the question's `AnswerKey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Choice(usize),
    Choices(BTreeSet<usize>),
    Numeric(String),
    Matching(BTreeMap<usize, BTreeSet<usize>>),
}

impl Answer {
    /// Blank responses carry no selection and count as unattempted.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Answer::Choice(_) => false,
            Answer::Choices(set) => set.is_empty(),
            Answer::Numeric(raw) => raw.trim().is_empty(),
            Answer::Matching(rows) => rows.values().all(BTreeSet::is_empty),
        }
    }

    /// Whether this response shape can be given to a question of `kind`.
    #[must_use]
    pub fn fits(&self, kind: QuestionKind) -> bool {
        matches!(
            (kind, self),
            (QuestionKind::SingleCorrect, Answer::Choice(_))
                | (QuestionKind::MultipleCorrect, Answer::Choices(_))
                | (QuestionKind::IntegerAnswer, Answer::Numeric(_))
                | (QuestionKind::MatrixMatch, Answer::Matching(_))
                | (
                    QuestionKind::Comprehension,
                    Answer::Choice(_) | Answer::Choices(_)
                )
        )
    }

    /// Whether every option index chosen is below `option_count`.
    ///
    /// Numeric and matching answers carry no option indices.
    #[must_use]
    pub fn within_options(&self, option_count: usize) -> bool {
        match self {
            Answer::Choice(index) => *index < option_count,
            Answer::Choices(set) => set.iter().all(|index| *index < option_count),
            Answer::Numeric(_) | Answer::Matching(_) => true,
        }
    }

    /// Human-readable label used by reports, e.g. `Option B` or `1→A,C`.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Answer::Choice(index) => option_label(*index),
            Answer::Choices(set) => join_options(set),
            Answer::Numeric(raw) => raw.trim().to_string(),
            Answer::Matching(rows) => display_matching(rows),
        }
    }
}

/// Human-readable label for a correct answer.
#[must_use]
pub fn display_key(key: &AnswerKey) -> String {
    match key {
        AnswerKey::Single(index) => option_label(*index),
        AnswerKey::Multiple(set) => join_options(set),
        AnswerKey::Integer { value, .. } => value.trim().to_string(),
        AnswerKey::Matrix(rows) => display_matching(rows),
    }
}

fn letter(index: usize) -> String {
    u8::try_from(index)
        .ok()
        .filter(|i| *i < 26)
        .map_or_else(|| format!("#{}", index + 1), |i| char::from(b'A' + i).to_string())
}

fn option_label(index: usize) -> String {
    format!("Option {}", letter(index))
}

fn join_options(set: &BTreeSet<usize>) -> String {
    set.iter()
        .map(|i| option_label(*i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_matching(rows: &BTreeMap<usize, BTreeSet<usize>>) -> String {
    rows.iter()
        .map(|(row, cols)| {
            let cols = cols.iter().map(|c| letter(*c)).collect::<Vec<_>>().join(",");
            format!("{}→{cols}", row + 1)
        })
        .collect::<Vec<_>>()
        .join("; ")
}
