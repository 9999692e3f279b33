//! Answer-key rows for printable reports.

use serde::Serialize;

use crate::model::{Correctness, Question, QuestionId, QuestionState, Subject, display_key};
use crate::scoring::score_question;

/// One line of an answer-key report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerKeyRow {
    /// 1-based, restarting for every subject section.
    pub question_number: u32,
    pub question_id: QuestionId,
    pub subject: Subject,
    pub correct_answer_display: String,
    pub user_answer_display: String,
    pub correctness: Correctness,
    pub marks_awarded: i64,
}

/// Builds the answer key of an attempt, grouped by subject in canonical order.
///
/// Unanswered questions show `Not Attempted` as the user answer.
#[must_use]
pub fn answer_key(questions: &[Question], states: &[QuestionState]) -> Vec<AnswerKeyRow> {
    let blank = QuestionState::default();
    let mut rows = Vec::with_capacity(questions.len());

    for subject in Subject::ALL {
        let mut number = 0;
        for (index, question) in questions.iter().enumerate() {
            if question.subject() != subject {
                continue;
            }
            number += 1;
            let state = states.get(index).unwrap_or(&blank);
            let (correctness, marks_awarded) = score_question(question, state);
            let user_answer_display = state
                .answer
                .as_ref()
                .filter(|a| !a.is_blank())
                .map_or_else(|| Correctness::Unattempted.label().to_string(), |a| a.display());

            rows.push(AnswerKeyRow {
                question_number: number,
                question_id: question.id().clone(),
                subject,
                correct_answer_display: display_key(question.answer_key()),
                user_answer_display,
                correctness,
                marks_awarded,
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, AnswerKey, Difficulty, QuestionDraft, QuestionKind};

    fn q(id: &str, subject: Subject) -> Question {
        QuestionDraft {
            id: QuestionId::new(id),
            subject,
            topic: "General".into(),
            difficulty: Difficulty::Easy,
            kind: QuestionKind::SingleCorrect,
            prompt: "Pick one".into(),
            options: vec!["a".into(), "b".into()],
            answer_key: AnswerKey::Single(1),
            marks: 4,
            negative_marks: 1,
            estimated_time_secs: 60,
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn numbering_restarts_per_subject() {
        let questions = vec![
            q("c1", Subject::Chemistry),
            q("p1", Subject::Physics),
            q("c2", Subject::Chemistry),
        ];
        let states = vec![
            QuestionState {
                answer: Some(Answer::Choice(1)),
                ..QuestionState::default()
            },
            QuestionState::default(),
            QuestionState {
                answer: Some(Answer::Choice(0)),
                ..QuestionState::default()
            },
        ];

        let rows = answer_key(&questions, &states);
        let layout: Vec<_> = rows
            .iter()
            .map(|r| (r.question_id.as_str(), r.question_number))
            .collect();
        assert_eq!(layout, vec![("p1", 1), ("c1", 1), ("c2", 2)]);

        assert_eq!(rows[0].user_answer_display, "Not Attempted");
        assert_eq!(rows[1].correct_answer_display, "Option B");
        assert_eq!(rows[1].marks_awarded, 4);
        assert_eq!(rows[2].user_answer_display, "Option A");
        assert_eq!(rows[2].correctness, Correctness::Incorrect);
        assert_eq!(rows[2].marks_awarded, -1);
    }
}
