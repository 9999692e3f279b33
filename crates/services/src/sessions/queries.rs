use rand::rng;
use rand::seq::SliceRandom;

use exam_core::model::{Question, Subject, TestConfig};
use storage::repository::QuestionRepository;

use crate::error::SessionError;

/// Storage-backed question selection.
pub(crate) struct SessionQueries;

impl SessionQueries {
    /// Draw the questions a configuration asks for.
    ///
    /// Subjects come in canonical order. Within a subject the bank order is
    /// kept unless `shuffle` is set. Every question is re-marked with the
    /// configuration's scheme.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotEnoughQuestions` when the bank is short for a
    /// subject, or `SessionError::Storage` on repository failures.
    pub async fn questions_for_config(
        config: &TestConfig,
        questions: &dyn QuestionRepository,
        shuffle: bool,
    ) -> Result<Vec<Question>, SessionError> {
        let counts = config.subject_counts();
        let marks = config.marks_per_question();
        let negative = config.effective_negative_marks();

        let mut selected = Vec::with_capacity(config.total_questions() as usize);
        for subject in Subject::ALL {
            let needed = counts.for_subject(subject) as usize;
            if needed == 0 {
                continue;
            }
            let mut pool = questions.list_by_subject(subject).await?;
            if pool.len() < needed {
                return Err(SessionError::NotEnoughQuestions {
                    subject,
                    needed,
                    available: pool.len(),
                });
            }
            if shuffle {
                pool.shuffle(&mut rng());
            }
            selected.extend(
                pool.iter()
                    .take(needed)
                    .map(|q| q.with_marking(marks, negative)),
            );
        }
        Ok(selected)
    }
}
