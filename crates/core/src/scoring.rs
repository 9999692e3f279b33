use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::{
    Answer, AnswerKey, Correctness, GroupStats, PercentileEstimate, Question, QuestionId,
    QuestionKind, QuestionOutcome, QuestionState, SessionId, Subject, SubjectAnalysis,
    TestResult, TimeAnalysis, TimeManagement, TopicAnalysis,
};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoringError {
    #[error("question {id}: response does not match the {kind} answer key")]
    ShapeMismatch { id: QuestionId, kind: QuestionKind },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TimeBandsError {
    #[error("time bands must be strictly increasing: {excellent}s < {good}s < {average}s")]
    NotIncreasing {
        excellent: u64,
        good: u64,
        average: u64,
    },
}

//
// ─── RULES ─────────────────────────────────────────────────────────────────────
//

/// Upper bounds (seconds per question) of each time-management rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBands {
    excellent_secs: u64,
    good_secs: u64,
    average_secs: u64,
}

impl TimeBands {
    /// # Errors
    ///
    /// Returns `TimeBandsError::NotIncreasing` unless `excellent < good < average`.
    pub fn new(excellent_secs: u64, good_secs: u64, average_secs: u64) -> Result<Self, TimeBandsError> {
        if excellent_secs >= good_secs || good_secs >= average_secs {
            return Err(TimeBandsError::NotIncreasing {
                excellent: excellent_secs,
                good: good_secs,
                average: average_secs,
            });
        }
        Ok(Self {
            excellent_secs,
            good_secs,
            average_secs,
        })
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn classify(&self, average_secs: f64) -> TimeManagement {
        if average_secs <= self.excellent_secs as f64 {
            TimeManagement::Excellent
        } else if average_secs <= self.good_secs as f64 {
            TimeManagement::Good
        } else if average_secs <= self.average_secs as f64 {
            TimeManagement::Average
        } else {
            TimeManagement::Poor
        }
    }
}

impl Default for TimeBands {
    fn default() -> Self {
        Self {
            excellent_secs: 120,
            good_secs: 180,
            average_secs: 240,
        }
    }
}

/// Thresholds that turn raw scores into analytics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringRules {
    /// Topic percentage at or above which a topic is a strength.
    pub strength_pct: f64,
    /// Topic percentage below which a topic is a weakness.
    pub weakness_pct: f64,
    pub time_bands: TimeBands,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            strength_pct: 70.0,
            weakness_pct: 40.0,
            time_bands: TimeBands::default(),
        }
    }
}

//
// ─── CORRECTNESS ───────────────────────────────────────────────────────────────
//

/// Compares a response with the question's key. No partial credit is given.
///
/// # Errors
///
/// Returns `ScoringError::ShapeMismatch` when the response cannot be compared
/// with the key at all.
pub fn check_answer(question: &Question, answer: &Answer) -> Result<bool, ScoringError> {
    let correct = match (question.answer_key(), answer) {
        (AnswerKey::Single(key), Answer::Choice(given)) => key == given,
        (AnswerKey::Multiple(key), Answer::Choices(given)) => key == given,
        // Comprehension items may be keyed either way.
        (AnswerKey::Single(key), Answer::Choices(given)) => {
            given.len() == 1 && given.contains(key)
        }
        (AnswerKey::Multiple(key), Answer::Choice(given)) => key.len() == 1 && key.contains(given),
        (AnswerKey::Integer { value, range }, Answer::Numeric(raw)) => {
            let raw = raw.trim();
            raw == value.trim()
                && range.is_none_or(|r| raw.parse::<i64>().is_ok_and(|v| r.contains(v)))
        }
        (AnswerKey::Matrix(key), Answer::Matching(given)) => {
            let given: BTreeMap<_, _> = given
                .iter()
                .filter(|(_, cols)| !cols.is_empty())
                .map(|(row, cols)| (*row, cols.clone()))
                .collect();
            *key == given
        }
        _ => {
            return Err(ScoringError::ShapeMismatch {
                id: question.id().clone(),
                kind: question.kind(),
            });
        }
    };
    Ok(correct)
}

/// Correctness and marks for one question given its recorded state.
#[must_use]
pub fn score_question(question: &Question, state: &QuestionState) -> (Correctness, i64) {
    let Some(answer) = state.answer.as_ref().filter(|a| !a.is_blank()) else {
        return (Correctness::Unattempted, 0);
    };
    match check_answer(question, answer) {
        Ok(true) => (Correctness::Correct, i64::from(question.marks())),
        Ok(false) => (Correctness::Incorrect, -i64::from(question.negative_marks())),
        Err(_) => (Correctness::Unscorable, 0),
    }
}

//
// ─── AGGREGATION ───────────────────────────────────────────────────────────────
//

/// Everything the engine needs to evaluate a submitted attempt.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    pub session_id: SessionId,
    pub questions: &'a [Question],
    /// One entry per question, in `questions` order.
    pub states: &'a [QuestionState],
    pub time_budget_secs: u64,
    pub time_remaining_secs: u64,
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 { 0.0 } else { part / whole * 100.0 }
}

impl GroupStats {
    fn record(&mut self, correctness: Correctness, marks_awarded: i64, max_marks: u32) {
        self.total += 1;
        self.score += marks_awarded;
        self.max_score += u64::from(max_marks);
        match correctness {
            Correctness::Correct => self.correct += 1,
            Correctness::Incorrect => self.incorrect += 1,
            Correctness::Unattempted => self.unattempted += 1,
            Correctness::Unscorable => self.unscorable += 1,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(mut self) -> Self {
        self.percentage = percent(self.score as f64, self.max_score as f64);
        self.accuracy = percent(
            f64::from(self.correct),
            f64::from(self.correct + self.incorrect),
        );
        self
    }
}

#[derive(Default)]
struct SubjectAccumulator {
    stats: GroupStats,
    time_spent_secs: u64,
    topics: Vec<(String, GroupStats)>,
}

impl SubjectAccumulator {
    fn topic_mut(&mut self, topic: &str) -> &mut GroupStats {
        let pos = match self.topics.iter().position(|(name, _)| name == topic) {
            Some(pos) => pos,
            None => {
                self.topics.push((topic.to_string(), GroupStats::default()));
                self.topics.len() - 1
            }
        };
        &mut self.topics[pos].1
    }
}

/// Evaluates a submitted attempt.
///
/// Questions without a matching state are scored as unattempted.
#[must_use]
pub fn compute_result(input: ScoringInput<'_>, rules: &ScoringRules) -> TestResult {
    let blank = QuestionState::default();
    let mut overall = GroupStats::default();
    let mut subjects: BTreeMap<Subject, SubjectAccumulator> = BTreeMap::new();
    let mut outcomes = Vec::with_capacity(input.questions.len());

    for (index, question) in input.questions.iter().enumerate() {
        let state = input.states.get(index).unwrap_or(&blank);
        let (correctness, marks_awarded) = score_question(question, state);

        overall.record(correctness, marks_awarded, question.marks());
        let subject = subjects.entry(question.subject()).or_default();
        subject.stats.record(correctness, marks_awarded, question.marks());
        subject.time_spent_secs = subject.time_spent_secs.saturating_add(state.time_taken_secs);
        subject
            .topic_mut(question.topic())
            .record(correctness, marks_awarded, question.marks());

        outcomes.push(QuestionOutcome {
            question_id: question.id().clone(),
            subject: question.subject(),
            topic: question.topic().to_string(),
            correctness,
            marks_awarded,
        });
    }

    let overall = overall.finish();
    let subjects: Vec<SubjectAnalysis> = subjects
        .into_iter()
        .map(|(subject, acc)| SubjectAnalysis {
            subject,
            stats: acc.stats.finish(),
            time_spent_secs: acc.time_spent_secs,
            topics: acc
                .topics
                .into_iter()
                .map(|(topic, stats)| TopicAnalysis {
                    topic,
                    stats: stats.finish(),
                })
                .collect(),
        })
        .collect();

    let all_topics = || subjects.iter().flat_map(|s| s.topics.iter());
    let strength_topics: Vec<String> = all_topics()
        .filter(|t| t.stats.percentage >= rules.strength_pct)
        .map(|t| t.topic.clone())
        .collect();
    let weakness_topics: Vec<String> = all_topics()
        .filter(|t| t.stats.percentage < rules.weakness_pct)
        .map(|t| t.topic.clone())
        .collect();

    let time_taken_secs = input
        .time_budget_secs
        .saturating_sub(input.time_remaining_secs);
    let time_analysis = analyze_time(input.states, input.questions.len(), time_taken_secs, rules);
    let recommendations = recommend(overall.percentage, time_analysis.management, &weakness_topics);

    TestResult {
        session_id: input.session_id,
        total_score: overall.score,
        max_score: overall.max_score,
        percentage: overall.percentage,
        percentile_estimate: PercentileEstimate::from_percentage(overall.percentage),
        time_taken_secs,
        questions_correct: overall.correct,
        questions_incorrect: overall.incorrect,
        questions_unattempted: overall.unattempted,
        questions_unscorable: overall.unscorable,
        subjects,
        strength_topics,
        weakness_topics,
        time_analysis,
        recommendations,
        outcomes,
    }
}

#[allow(clippy::cast_precision_loss)]
fn analyze_time(
    states: &[QuestionState],
    question_count: usize,
    time_taken_secs: u64,
    rules: &ScoringRules,
) -> TimeAnalysis {
    let average_secs_per_question = if question_count == 0 {
        0.0
    } else {
        time_taken_secs as f64 / question_count as f64
    };
    let spent = states.iter().map(|s| s.time_taken_secs).filter(|t| *t > 0);

    TimeAnalysis {
        average_secs_per_question,
        fastest_secs: spent.clone().min(),
        slowest_secs: spent.max(),
        management: rules.time_bands.classify(average_secs_per_question),
    }
}

fn recommend(percentage: f64, management: TimeManagement, weakness_topics: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    out.push(
        if percentage >= 80.0 {
            "Excellent performance! Keep up the great work."
        } else if percentage >= 60.0 {
            "Good performance. Focus on weak areas for improvement."
        } else {
            "Need more practice. Focus on fundamentals."
        }
        .to_string(),
    );
    if management == TimeManagement::Poor {
        out.push("Work on time management skills.".to_string());
    }
    if !weakness_topics.is_empty() {
        let focus: Vec<&str> = weakness_topics.iter().take(3).map(String::as_str).collect();
        out.push(format!("Focus on: {}", focus.join(", ")));
    }
    out
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, IntegerRange, QuestionDraft};
    use std::collections::BTreeSet;

    fn question(
        id: &str,
        subject: Subject,
        topic: &str,
        kind: QuestionKind,
        key: AnswerKey,
        marks: u32,
        negative: i32,
    ) -> Question {
        QuestionDraft {
            id: QuestionId::new(id),
            subject,
            topic: topic.into(),
            difficulty: Difficulty::Moderate,
            kind,
            prompt: format!("Prompt for {id}"),
            options: if kind == QuestionKind::IntegerAnswer {
                Vec::new()
            } else {
                vec!["A".into(), "B".into(), "C".into(), "D".into()]
            },
            answer_key: key,
            marks,
            negative_marks: negative,
            estimated_time_secs: 120,
        }
        .validate()
        .unwrap()
    }

    fn single(id: &str, subject: Subject, topic: &str, key: usize) -> Question {
        question(
            id,
            subject,
            topic,
            QuestionKind::SingleCorrect,
            AnswerKey::Single(key),
            4,
            -1,
        )
    }

    fn answered(answer: Answer, secs: u64) -> QuestionState {
        QuestionState {
            answer: Some(answer),
            visited: true,
            time_taken_secs: secs,
            ..QuestionState::default()
        }
    }

    fn input<'a>(questions: &'a [Question], states: &'a [QuestionState]) -> ScoringInput<'a> {
        ScoringInput {
            session_id: SessionId::generate(),
            questions,
            states,
            time_budget_secs: 600,
            time_remaining_secs: 300,
        }
    }

    #[test]
    fn three_question_scenario() {
        let questions = vec![
            single("q1", Subject::Physics, "Mechanics", 0),
            single("q2", Subject::Physics, "Mechanics", 1),
            single("q3", Subject::Chemistry, "Organic", 2),
        ];
        let states = vec![
            answered(Answer::Choice(0), 40),
            answered(Answer::Choice(3), 20),
            QuestionState::default(),
        ];

        let result = compute_result(input(&questions, &states), &ScoringRules::default());

        assert_eq!(result.total_score, 3);
        assert_eq!(result.max_score, 12);
        assert!((result.percentage - 25.0).abs() < f64::EPSILON);
        assert_eq!(result.questions_correct, 1);
        assert_eq!(result.questions_incorrect, 1);
        assert_eq!(result.questions_unattempted, 1);
        assert_eq!(result.time_taken_secs, 300);
        assert_eq!(result.time_analysis.fastest_secs, Some(20));
        assert_eq!(result.time_analysis.slowest_secs, Some(40));
        assert_eq!(result.time_analysis.management, TimeManagement::Excellent);
    }

    #[test]
    fn single_correct_marking() {
        let q = question(
            "q1",
            Subject::Physics,
            "Optics",
            QuestionKind::SingleCorrect,
            AnswerKey::Single(2),
            3,
            -1,
        );
        assert_eq!(
            score_question(&q, &answered(Answer::Choice(2), 10)),
            (Correctness::Correct, 3)
        );
        assert_eq!(
            score_question(&q, &answered(Answer::Choice(1), 10)),
            (Correctness::Incorrect, -1)
        );
        assert_eq!(
            score_question(&q, &QuestionState::default()),
            (Correctness::Unattempted, 0)
        );
    }

    #[test]
    fn multiple_correct_needs_exact_set() {
        let q = question(
            "q1",
            Subject::Chemistry,
            "Organic",
            QuestionKind::MultipleCorrect,
            AnswerKey::Multiple(BTreeSet::from([0, 2])),
            4,
            -2,
        );
        let exact = Answer::Choices(BTreeSet::from([2, 0]));
        let partial = Answer::Choices(BTreeSet::from([0]));
        let superset = Answer::Choices(BTreeSet::from([0, 1, 2]));
        assert_eq!(check_answer(&q, &exact), Ok(true));
        assert_eq!(check_answer(&q, &partial), Ok(false));
        assert_eq!(check_answer(&q, &superset), Ok(false));
    }

    #[test]
    fn integer_answers_compare_trimmed_and_respect_range() {
        let q = question(
            "q1",
            Subject::Mathematics,
            "Calculus",
            QuestionKind::IntegerAnswer,
            AnswerKey::Integer {
                value: "42".into(),
                range: Some(IntegerRange { min: 0, max: 99 }),
            },
            4,
            0,
        );
        assert_eq!(check_answer(&q, &Answer::Numeric(" 42 ".into())), Ok(true));
        assert_eq!(check_answer(&q, &Answer::Numeric("41".into())), Ok(false));

        let unbounded = question(
            "q2",
            Subject::Mathematics,
            "Calculus",
            QuestionKind::IntegerAnswer,
            AnswerKey::Integer {
                value: "1.5".into(),
                range: None,
            },
            4,
            0,
        );
        assert_eq!(
            check_answer(&unbounded, &Answer::Numeric("1.5".into())),
            Ok(true)
        );
    }

    #[test]
    fn matrix_match_ignores_empty_rows() {
        let key = BTreeMap::from([(0, BTreeSet::from([1])), (1, BTreeSet::from([0, 2]))]);
        let q = question(
            "q1",
            Subject::Physics,
            "Electrostatics",
            QuestionKind::MatrixMatch,
            AnswerKey::Matrix(key.clone()),
            3,
            -1,
        );
        let mut given = key.clone();
        given.insert(2, BTreeSet::new());
        assert_eq!(check_answer(&q, &Answer::Matching(given)), Ok(true));

        let mut wrong = key;
        wrong.insert(1, BTreeSet::from([0]));
        assert_eq!(check_answer(&q, &Answer::Matching(wrong)), Ok(false));
    }

    #[test]
    fn mismatched_shape_is_unscorable() {
        let q = single("q1", Subject::Physics, "Optics", 0);
        assert!(matches!(
            check_answer(&q, &Answer::Numeric("0".into())),
            Err(ScoringError::ShapeMismatch { .. })
        ));

        let questions = vec![q];
        let states = vec![answered(Answer::Numeric("0".into()), 30)];
        let result = compute_result(input(&questions, &states), &ScoringRules::default());
        assert_eq!(result.questions_unscorable, 1);
        assert_eq!(result.total_score, 0);
        assert_eq!(result.outcomes[0].correctness, Correctness::Unscorable);
    }

    #[test]
    fn subjects_in_canonical_order_topics_in_first_appearance() {
        let questions = vec![
            single("m1", Subject::Mathematics, "Algebra", 0),
            single("p1", Subject::Physics, "Optics", 0),
            single("p2", Subject::Physics, "Mechanics", 0),
            single("p3", Subject::Physics, "Optics", 0),
        ];
        let states = vec![
            answered(Answer::Choice(0), 10),
            answered(Answer::Choice(0), 10),
            answered(Answer::Choice(1), 10),
            answered(Answer::Choice(0), 10),
        ];
        let result = compute_result(input(&questions, &states), &ScoringRules::default());

        let order: Vec<_> = result.subjects.iter().map(|s| s.subject).collect();
        assert_eq!(order, vec![Subject::Physics, Subject::Mathematics]);

        let physics = result.subject(Subject::Physics).unwrap();
        let topics: Vec<_> = physics.topics.iter().map(|t| t.topic.as_str()).collect();
        assert_eq!(topics, vec!["Optics", "Mechanics"]);
        assert_eq!(physics.time_spent_secs, 30);
        assert_eq!(result.strength_topics, vec!["Optics", "Algebra"]);
        assert_eq!(result.weakness_topics, vec!["Mechanics"]);
    }

    #[test]
    fn negative_totals_and_recommendations() {
        let questions = vec![
            single("p1", Subject::Physics, "Optics", 0),
            single("p2", Subject::Physics, "Waves", 0),
        ];
        let states = vec![
            answered(Answer::Choice(1), 400),
            answered(Answer::Choice(2), 400),
        ];
        let mut scoring = input(&questions, &states);
        scoring.time_budget_secs = 1_000;
        scoring.time_remaining_secs = 0;
        let result = compute_result(scoring, &ScoringRules::default());

        assert_eq!(result.total_score, -2);
        assert_eq!(result.time_analysis.management, TimeManagement::Poor);
        assert_eq!(
            result.recommendations,
            vec![
                "Need more practice. Focus on fundamentals.".to_string(),
                "Work on time management skills.".to_string(),
                "Focus on: Optics, Waves".to_string(),
            ]
        );
        assert_eq!(result.percentile_estimate.value(), 0.0);
    }

    #[test]
    fn empty_test_reports_zeros() {
        let result = compute_result(input(&[], &[]), &ScoringRules::default());
        assert_eq!(result.percentage, 0.0);
        assert_eq!(result.time_analysis.average_secs_per_question, 0.0);
        assert!(result.time_analysis.fastest_secs.is_none());
        assert_eq!(
            result.recommendations,
            vec!["Need more practice. Focus on fundamentals.".to_string()]
        );
    }

    #[test]
    fn time_bands_must_increase() {
        assert!(TimeBands::new(120, 120, 240).is_err());
        let bands = TimeBands::new(60, 90, 120).unwrap();
        assert_eq!(bands.classify(60.0), TimeManagement::Excellent);
        assert_eq!(bands.classify(60.5), TimeManagement::Good);
        assert_eq!(bands.classify(120.0), TimeManagement::Average);
        assert_eq!(bands.classify(121.0), TimeManagement::Poor);
    }
}
