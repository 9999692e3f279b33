use serde::{Deserialize, Serialize};

use crate::model::answer::Answer;

/// Mutable per-question record of one attempt.
///
/// The answered flag is derived from `answer`, so it can never disagree with
/// the recorded response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionState {
    pub answer: Option<Answer>,
    pub marked: bool,
    pub visited: bool,
    pub time_taken_secs: u64,
}

impl QuestionState {
    #[must_use]
    pub fn answered(&self) -> bool {
        self.answer.is_some()
    }

    #[must_use]
    pub fn status(&self) -> QuestionStatus {
        QuestionStatus {
            answered: self.answered(),
            marked: self.marked,
            visited: self.visited,
            time_taken_secs: self.time_taken_secs,
        }
    }

    #[must_use]
    pub fn palette(&self) -> PaletteStatus {
        match (self.answered(), self.marked, self.visited) {
            (true, true, _) => PaletteStatus::AnsweredAndMarked,
            (true, false, _) => PaletteStatus::Answered,
            (false, true, _) => PaletteStatus::Marked,
            (false, false, true) => PaletteStatus::Visited,
            (false, false, false) => PaletteStatus::NotVisited,
        }
    }

    /// Adds time spent on the question; saturates instead of wrapping.
    pub fn add_time(&mut self, delta_secs: u64) {
        self.time_taken_secs = self.time_taken_secs.saturating_add(delta_secs);
    }
}

/// Read-only status flags for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuestionStatus {
    pub answered: bool,
    pub marked: bool,
    pub visited: bool,
    pub time_taken_secs: u64,
}

/// Question palette colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PaletteStatus {
    NotVisited,
    Visited,
    Answered,
    Marked,
    AnsweredAndMarked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answered_follows_answer() {
        let mut state = QuestionState::default();
        assert!(!state.status().answered);
        state.answer = Some(Answer::Choice(2));
        assert!(state.status().answered);
        state.answer = None;
        assert!(!state.status().answered);
    }

    #[test]
    fn palette_priorities() {
        let mut state = QuestionState::default();
        assert_eq!(state.palette(), PaletteStatus::NotVisited);
        state.visited = true;
        assert_eq!(state.palette(), PaletteStatus::Visited);
        state.marked = true;
        assert_eq!(state.palette(), PaletteStatus::Marked);
        state.answer = Some(Answer::Choice(0));
        assert_eq!(state.palette(), PaletteStatus::AnsweredAndMarked);
        state.marked = false;
        assert_eq!(state.palette(), PaletteStatus::Answered);
    }

    #[test]
    fn add_time_saturates() {
        let mut state = QuestionState {
            time_taken_secs: u64::MAX - 1,
            ..QuestionState::default()
        };
        state.add_time(5);
        assert_eq!(state.time_taken_secs, u64::MAX);
    }
}
