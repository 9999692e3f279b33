use serde::{Deserialize, Serialize};

use crate::model::ids::{QuestionId, SessionId};
use crate::model::question::Subject;

//
// ─── PER-QUESTION OUTCOME ─────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Correctness {
    Correct,
    Incorrect,
    Unattempted,
    /// The response could not be compared with the key; scored as zero.
    Unscorable,
}

impl Correctness {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Correctness::Correct => "Correct",
            Correctness::Incorrect => "Wrong",
            Correctness::Unattempted => "Not Attempted",
            Correctness::Unscorable => "Cannot Score",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: QuestionId,
    pub subject: Subject,
    pub topic: String,
    pub correctness: Correctness,
    pub marks_awarded: i64,
}

//
// ─── AGGREGATES ───────────────────────────────────────────────────────────────
//

/// Counts and score for a group of questions (whole test, subject or topic).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub total: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub unattempted: u32,
    pub unscorable: u32,
    pub score: i64,
    pub max_score: u64,
    pub percentage: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicAnalysis {
    pub topic: String,
    pub stats: GroupStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectAnalysis {
    pub subject: Subject,
    pub stats: GroupStats,
    pub time_spent_secs: u64,
    pub topics: Vec<TopicAnalysis>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeManagement {
    Excellent,
    Good,
    Average,
    Poor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAnalysis {
    pub average_secs_per_question: f64,
    pub fastest_secs: Option<u64>,
    pub slowest_secs: Option<u64>,
    pub management: TimeManagement,
}

/// Rough standing derived from the percentage alone.
///
/// There is no reference population behind this number; it is an estimate for
/// display and must not be presented as a measured percentile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileEstimate(pub f64);

impl PercentileEstimate {
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        Self((50.0 + (percentage - 50.0) * 0.8).clamp(0.0, 100.0))
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

//
// ─── RESULT ───────────────────────────────────────────────────────────────────
//

/// Final, immutable evaluation of a submitted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub session_id: SessionId,
    pub total_score: i64,
    pub max_score: u64,
    pub percentage: f64,
    pub percentile_estimate: PercentileEstimate,
    pub time_taken_secs: u64,
    pub questions_correct: u32,
    pub questions_incorrect: u32,
    pub questions_unattempted: u32,
    pub questions_unscorable: u32,
    pub subjects: Vec<SubjectAnalysis>,
    pub strength_topics: Vec<String>,
    pub weakness_topics: Vec<String>,
    pub time_analysis: TimeAnalysis,
    pub recommendations: Vec<String>,
    pub outcomes: Vec<QuestionOutcome>,
}

impl TestResult {
    #[must_use]
    pub fn subject(&self, subject: Subject) -> Option<&SubjectAnalysis> {
        self.subjects.iter().find(|s| s.subject == subject)
    }
}
