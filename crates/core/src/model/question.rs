use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question id cannot be empty")]
    EmptyId,

    #[error("question {0}: topic cannot be empty")]
    EmptyTopic(QuestionId),

    #[error("question {0}: prompt cannot be empty")]
    EmptyPrompt(QuestionId),

    #[error("question {0}: marks must be > 0")]
    InvalidMarks(QuestionId),

    #[error("question {id}: {kind} questions require options")]
    MissingOptions { id: QuestionId, kind: QuestionKind },

    #[error("question {id}: answer key does not fit a {kind} question")]
    KeyShapeMismatch { id: QuestionId, kind: QuestionKind },

    #[error("question {id}: answer key is empty")]
    EmptyKey { id: QuestionId },

    #[error("question {id}: option index {index} out of range ({len} options)")]
    OptionOutOfRange {
        id: QuestionId,
        index: usize,
        len: usize,
    },

    #[error("question {id}: integer range {min}..={max} is inverted")]
    InvalidRange { id: QuestionId, min: i64, max: i64 },

    #[error("unknown {kind} value: {raw}")]
    UnknownValue { kind: &'static str, raw: String },
}

//
// ─── CLASSIFICATION ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subject {
    Physics,
    Chemistry,
    Mathematics,
}

impl Subject {
    /// Canonical order used for paper layout and reports.
    pub const ALL: [Subject; 3] = [Subject::Physics, Subject::Chemistry, Subject::Mathematics];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Subject::Physics => "Physics",
            Subject::Chemistry => "Chemistry",
            Subject::Mathematics => "Mathematics",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "physics" => Ok(Subject::Physics),
            "chemistry" => Ok(Subject::Chemistry),
            "mathematics" | "maths" | "math" => Ok(Subject::Mathematics),
            _ => Err(QuestionError::UnknownValue {
                kind: "subject",
                raw: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
    VeryHard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Moderate => "Moderate",
            Difficulty::Hard => "Hard",
            Difficulty::VeryHard => "Very-Hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "moderate" | "medium" => Ok(Difficulty::Moderate),
            "hard" => Ok(Difficulty::Hard),
            "very-hard" | "very hard" | "veryhard" => Ok(Difficulty::VeryHard),
            _ => Err(QuestionError::UnknownValue {
                kind: "difficulty",
                raw: s.to_string(),
            }),
        }
    }
}

/// Answer-shape category of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    SingleCorrect,
    MultipleCorrect,
    IntegerAnswer,
    MatrixMatch,
    Comprehension,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::SingleCorrect => "single-correct",
            QuestionKind::MultipleCorrect => "multiple-correct",
            QuestionKind::IntegerAnswer => "integer-answer",
            QuestionKind::MatrixMatch => "matrix-match",
            QuestionKind::Comprehension => "comprehension",
        }
    }

    /// Integer-answer questions are the only kind answered without options.
    #[must_use]
    pub fn requires_options(self) -> bool {
        !matches!(self, QuestionKind::IntegerAnswer)
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionKind {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "single-correct" => Ok(QuestionKind::SingleCorrect),
            "multiple-correct" => Ok(QuestionKind::MultipleCorrect),
            "integer-answer" => Ok(QuestionKind::IntegerAnswer),
            "matrix-match" => Ok(QuestionKind::MatrixMatch),
            "comprehension" => Ok(QuestionKind::Comprehension),
            _ => Err(QuestionError::UnknownValue {
                kind: "question kind",
                raw: s.to_string(),
            }),
        }
    }
}

//
// ─── ANSWER KEY ────────────────────────────────────────────────────────────────
//

/// Inclusive numeric range declared by an integer-answer question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerRange {
    pub min: i64,
    pub max: i64,
}

impl IntegerRange {
    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Correct answer of a question, shaped by its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnswerKey {
    Single(usize),
    Multiple(BTreeSet<usize>),
    Integer {
        value: String,
        range: Option<IntegerRange>,
    },
    Matrix(BTreeMap<usize, BTreeSet<usize>>),
}

impl AnswerKey {
    fn fits(&self, kind: QuestionKind) -> bool {
        matches!(
            (kind, self),
            (QuestionKind::SingleCorrect, AnswerKey::Single(_))
                | (QuestionKind::MultipleCorrect, AnswerKey::Multiple(_))
                | (QuestionKind::IntegerAnswer, AnswerKey::Integer { .. })
                | (QuestionKind::MatrixMatch, AnswerKey::Matrix(_))
                | (
                    QuestionKind::Comprehension,
                    AnswerKey::Single(_) | AnswerKey::Multiple(_)
                )
        )
    }

    fn indices(&self) -> Vec<usize> {
        match self {
            AnswerKey::Single(index) => vec![*index],
            AnswerKey::Multiple(set) => set.iter().copied().collect(),
            // Matrix rows and columns index two separate lists carried in the prompt.
            AnswerKey::Integer { .. } | AnswerKey::Matrix(_) => Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            AnswerKey::Single(_) => false,
            AnswerKey::Multiple(set) => set.is_empty(),
            AnswerKey::Integer { value, .. } => value.trim().is_empty(),
            AnswerKey::Matrix(rows) => rows.is_empty() || rows.values().any(BTreeSet::is_empty),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Unvalidated question record as supplied by a question bank.
///
/// `negative_marks` accepts either sign; banks commonly store the penalty as `-1`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionDraft {
    pub id: QuestionId,
    pub subject: Subject,
    pub topic: String,
    pub difficulty: Difficulty,
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Vec<String>,
    pub answer_key: AnswerKey,
    pub marks: u32,
    pub negative_marks: i32,
    pub estimated_time_secs: u32,
}

impl QuestionDraft {
    /// Validate the draft into an immutable `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when required text is missing, marks are zero,
    /// options are missing for an option-based kind, or the answer key does not
    /// match the kind or the option list.
    pub fn validate(self) -> Result<Question, QuestionError> {
        if self.id.as_str().trim().is_empty() {
            return Err(QuestionError::EmptyId);
        }
        if self.topic.trim().is_empty() {
            return Err(QuestionError::EmptyTopic(self.id));
        }
        if self.prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt(self.id));
        }
        if self.marks == 0 {
            return Err(QuestionError::InvalidMarks(self.id));
        }
        if self.kind.requires_options() && self.options.is_empty() {
            return Err(QuestionError::MissingOptions {
                id: self.id,
                kind: self.kind,
            });
        }
        if !self.answer_key.fits(self.kind) {
            return Err(QuestionError::KeyShapeMismatch {
                id: self.id,
                kind: self.kind,
            });
        }
        if self.answer_key.is_empty() {
            return Err(QuestionError::EmptyKey { id: self.id });
        }
        if let AnswerKey::Integer {
            range: Some(range), ..
        } = &self.answer_key
            && range.min > range.max
        {
            return Err(QuestionError::InvalidRange {
                id: self.id,
                min: range.min,
                max: range.max,
            });
        }
        let len = self.options.len();
        if let Some(index) = self.answer_key.indices().into_iter().find(|i| *i >= len) {
            return Err(QuestionError::OptionOutOfRange {
                id: self.id,
                index,
                len,
            });
        }

        Ok(Question {
            id: self.id,
            subject: self.subject,
            topic: self.topic.trim().to_string(),
            difficulty: self.difficulty,
            kind: self.kind,
            prompt: self.prompt,
            options: self.options,
            answer_key: self.answer_key,
            marks: self.marks,
            negative_marks: self.negative_marks.unsigned_abs(),
            estimated_time_secs: self.estimated_time_secs,
        })
    }
}

/// Immutable question entity owned by the question record store.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    id: QuestionId,
    subject: Subject,
    topic: String,
    difficulty: Difficulty,
    kind: QuestionKind,
    prompt: String,
    options: Vec<String>,
    answer_key: AnswerKey,
    marks: u32,
    negative_marks: u32,
    estimated_time_secs: u32,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn subject(&self) -> Subject {
        self.subject
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn answer_key(&self) -> &AnswerKey {
        &self.answer_key
    }

    #[must_use]
    pub fn marks(&self) -> u32 {
        self.marks
    }

    /// Penalty magnitude subtracted for an incorrect attempt.
    #[must_use]
    pub fn negative_marks(&self) -> u32 {
        self.negative_marks
    }

    #[must_use]
    pub fn estimated_time_secs(&self) -> u32 {
        self.estimated_time_secs
    }

    /// Returns a copy carrying a different marking scheme.
    ///
    /// A zero `marks` value keeps the question's own marks.
    #[must_use]
    pub fn with_marking(&self, marks: u32, negative_marks: u32) -> Self {
        let mut copy = self.clone();
        if marks > 0 {
            copy.marks = marks;
        }
        copy.negative_marks = negative_marks;
        copy
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(kind: QuestionKind, key: AnswerKey) -> QuestionDraft {
        QuestionDraft {
            id: QuestionId::new("phy_001"),
            subject: Subject::Physics,
            topic: "Mechanics".into(),
            difficulty: Difficulty::Hard,
            kind,
            prompt: "A block slides down an incline...".into(),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            answer_key: key,
            marks: 3,
            negative_marks: -1,
            estimated_time_secs: 180,
        }
    }

    #[test]
    fn negative_marks_are_normalised_to_magnitude() {
        let q = draft(QuestionKind::SingleCorrect, AnswerKey::Single(1))
            .validate()
            .unwrap();
        assert_eq!(q.negative_marks(), 1);
        assert_eq!(q.marks(), 3);
    }

    #[test]
    fn key_must_fit_kind() {
        let err = draft(QuestionKind::MultipleCorrect, AnswerKey::Single(1))
            .validate()
            .unwrap_err();
        assert!(matches!(err, QuestionError::KeyShapeMismatch { .. }));
    }

    #[test]
    fn comprehension_accepts_single_and_multiple_keys() {
        assert!(
            draft(QuestionKind::Comprehension, AnswerKey::Single(0))
                .validate()
                .is_ok()
        );
        assert!(
            draft(
                QuestionKind::Comprehension,
                AnswerKey::Multiple(BTreeSet::from([0, 3]))
            )
            .validate()
            .is_ok()
        );
    }

    #[test]
    fn option_index_must_exist() {
        let err = draft(QuestionKind::SingleCorrect, AnswerKey::Single(4))
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            QuestionError::OptionOutOfRange { index: 4, len: 4, .. }
        ));
    }

    #[test]
    fn multiple_correct_needs_non_empty_key() {
        let err = draft(
            QuestionKind::MultipleCorrect,
            AnswerKey::Multiple(BTreeSet::new()),
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, QuestionError::EmptyKey { .. }));
    }

    #[test]
    fn integer_answer_needs_no_options_but_ordered_range() {
        let mut d = draft(
            QuestionKind::IntegerAnswer,
            AnswerKey::Integer {
                value: "7".into(),
                range: Some(IntegerRange { min: 10, max: 0 }),
            },
        );
        d.options.clear();
        let err = d.clone().validate().unwrap_err();
        assert!(matches!(err, QuestionError::InvalidRange { .. }));

        d.answer_key = AnswerKey::Integer {
            value: "7".into(),
            range: Some(IntegerRange { min: 0, max: 10 }),
        };
        assert!(d.validate().is_ok());
    }

    #[test]
    fn option_kinds_require_options() {
        let mut d = draft(QuestionKind::SingleCorrect, AnswerKey::Single(0));
        d.options.clear();
        assert!(matches!(
            d.validate().unwrap_err(),
            QuestionError::MissingOptions { .. }
        ));
    }

    #[test]
    fn with_marking_overrides_scheme() {
        let q = draft(QuestionKind::SingleCorrect, AnswerKey::Single(1))
            .validate()
            .unwrap();
        let remarked = q.with_marking(4, 0);
        assert_eq!(remarked.marks(), 4);
        assert_eq!(remarked.negative_marks(), 0);
        assert_eq!(q.with_marking(0, 2).marks(), 3);
    }

    #[test]
    fn parses_labels_from_bank_data() {
        assert_eq!("Maths".parse::<Subject>().unwrap(), Subject::Mathematics);
        assert_eq!("Medium".parse::<Difficulty>().unwrap(), Difficulty::Moderate);
        assert_eq!("Very-Hard".parse::<Difficulty>().unwrap(), Difficulty::VeryHard);
        assert_eq!(
            "integer-answer".parse::<QuestionKind>().unwrap(),
            QuestionKind::IntegerAnswer
        );
        assert!("Biology".parse::<Subject>().is_err());
    }

    #[test]
    fn answer_key_serializes_as_tagged_json() {
        let key = AnswerKey::Multiple(BTreeSet::from([0, 2]));
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"{"type":"multiple","value":[0,2]}"#);
    }
}
