use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::question::Subject;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TestConfigError {
    #[error("test name cannot be empty")]
    EmptyName,

    #[error("duration must be > 0 minutes")]
    InvalidDuration,

    #[error("a test needs at least one question")]
    NoQuestions,

    #[error("total questions ({total}) does not match subject counts ({sum})")]
    CountMismatch { total: u32, sum: u32 },

    #[error("marks per question must be > 0")]
    InvalidMarks,
}

//
// ─── SUBJECT MIX ───────────────────────────────────────────────────────────────
//

/// Number of questions drawn per subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectCounts {
    pub physics: u32,
    pub chemistry: u32,
    pub mathematics: u32,
}

impl SubjectCounts {
    #[must_use]
    pub fn new(physics: u32, chemistry: u32, mathematics: u32) -> Self {
        Self {
            physics,
            chemistry,
            mathematics,
        }
    }

    /// All three subjects with the same count.
    #[must_use]
    pub fn uniform(count: u32) -> Self {
        Self::new(count, count, count)
    }

    #[must_use]
    pub fn for_subject(&self, subject: Subject) -> u32 {
        match subject {
            Subject::Physics => self.physics,
            Subject::Chemistry => self.chemistry,
            Subject::Mathematics => self.mathematics,
        }
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.physics
            .saturating_add(self.chemistry)
            .saturating_add(self.mathematics)
    }
}

//
// ─── CONFIGURATION ─────────────────────────────────────────────────────────────
//

/// Immutable description of a test chosen at session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfig {
    name: String,
    duration_minutes: u32,
    total_questions: u32,
    subject_counts: SubjectCounts,
    marks_per_question: u32,
    negative_marks: u32,
    negative_marking: bool,
}

impl TestConfig {
    /// Creates a validated test configuration.
    ///
    /// `negative_marks` is the penalty magnitude.
    ///
    /// # Errors
    ///
    /// Returns `TestConfigError` if the name is empty, the duration or question
    /// count is zero, the counts do not add up, or marks are zero.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        duration_minutes: u32,
        total_questions: u32,
        subject_counts: SubjectCounts,
        marks_per_question: u32,
        negative_marks: u32,
        negative_marking: bool,
    ) -> Result<Self, TestConfigError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TestConfigError::EmptyName);
        }
        if duration_minutes == 0 {
            return Err(TestConfigError::InvalidDuration);
        }
        if total_questions == 0 {
            return Err(TestConfigError::NoQuestions);
        }
        let sum = subject_counts.total();
        if sum != total_questions {
            return Err(TestConfigError::CountMismatch {
                total: total_questions,
                sum,
            });
        }
        if marks_per_question == 0 {
            return Err(TestConfigError::InvalidMarks);
        }

        Ok(Self {
            name,
            duration_minutes,
            total_questions,
            subject_counts,
            marks_per_question,
            negative_marks,
            negative_marking,
        })
    }

    /// JEE Main full paper: 90 questions, 3 hours, +4/−1.
    #[must_use]
    pub fn jee_main_full() -> Self {
        Self::preset("JEE Main Full Test", 180, SubjectCounts::uniform(30), 4, 1, true)
    }

    /// JEE Advanced full paper: 54 questions, 3 hours, +3/−1.
    #[must_use]
    pub fn jee_advanced_full() -> Self {
        Self::preset(
            "JEE Advanced Full Test",
            180,
            SubjectCounts::uniform(18),
            3,
            1,
            true,
        )
    }

    /// 30 questions of a single subject in one hour.
    #[must_use]
    pub fn subject_test(subject: Subject) -> Self {
        let counts = match subject {
            Subject::Physics => SubjectCounts::new(30, 0, 0),
            Subject::Chemistry => SubjectCounts::new(0, 30, 0),
            Subject::Mathematics => SubjectCounts::new(0, 0, 30),
        };
        Self::preset(format!("{subject} Subject Test"), 60, counts, 4, 1, true)
    }

    /// Quick practice: 15 questions in 20 minutes without negative marking.
    #[must_use]
    pub fn quick_practice() -> Self {
        Self::preset("Quick Practice Test", 20, SubjectCounts::uniform(5), 4, 0, false)
    }

    fn preset(
        name: impl Into<String>,
        duration_minutes: u32,
        subject_counts: SubjectCounts,
        marks_per_question: u32,
        negative_marks: u32,
        negative_marking: bool,
    ) -> Self {
        Self {
            name: name.into(),
            duration_minutes,
            total_questions: subject_counts.total(),
            subject_counts,
            marks_per_question,
            negative_marks,
            negative_marking,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    #[must_use]
    pub fn duration_secs(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn subject_counts(&self) -> SubjectCounts {
        self.subject_counts
    }

    #[must_use]
    pub fn marks_per_question(&self) -> u32 {
        self.marks_per_question
    }

    #[must_use]
    pub fn negative_marks(&self) -> u32 {
        self.negative_marks
    }

    #[must_use]
    pub fn negative_marking(&self) -> bool {
        self.negative_marking
    }

    /// Penalty actually applied to wrong answers under this configuration.
    #[must_use]
    pub fn effective_negative_marks(&self) -> u32 {
        if self.negative_marking {
            self.negative_marks
        } else {
            0
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
