//! Terminal command parsing.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use exam_core::model::{Answer, QuestionKind};
use services::SessionCommand;

/// A parsed terminal line.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Forwarded to the session runner.
    Command(SessionCommand),
    /// Answer text for the current question; shaped once its kind is known.
    Answer(String),
    Show,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    Empty,
    Unknown(String),
    MissingArgument(&'static str),
    BadIndex(String),
    BadAnswer { kind: QuestionKind, raw: String },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Empty => write!(f, "empty command"),
            InputError::Unknown(raw) => write!(f, "unknown command: {raw} (try `help`)"),
            InputError::MissingArgument(command) => write!(f, "{command} requires a value"),
            InputError::BadIndex(raw) => write!(f, "invalid question number: {raw}"),
            InputError::BadAnswer { kind, raw } => {
                write!(f, "cannot read `{raw}` as a {kind} answer")
            }
        }
    }
}

impl std::error::Error for InputError {}

pub const HELP: &str = "\
Commands:
  a <answer>     answer the current question (B | A,C | 42 | A=PQ;B=R)
  clear          clear the current answer
  mark           toggle mark for review
  n, next        next question
  p, prev        previous question
  go <number>    jump to question number (1-based)
  show           print the current question and timer
  pause, resume  pause or resume the countdown
  submit         submit the test
  exit           leave without submitting (resume later with --resume)";

/// Parse one terminal line.
///
/// # Errors
///
/// Returns `InputError` for blank, unknown or malformed commands.
pub fn parse_line(line: &str) -> Result<Input, InputError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let command = match word.to_ascii_lowercase().as_str() {
        "" => return Err(InputError::Empty),
        "a" | "answer" => {
            if rest.is_empty() {
                return Err(InputError::MissingArgument("answer"));
            }
            return Ok(Input::Answer(rest.to_string()));
        }
        "show" | "s" => return Ok(Input::Show),
        "help" | "h" | "?" => return Ok(Input::Help),
        "clear" => SessionCommand::Clear,
        "mark" | "m" => SessionCommand::ToggleMark,
        "next" | "n" => SessionCommand::Next,
        "prev" | "p" => SessionCommand::Previous,
        "go" | "g" => {
            if rest.is_empty() {
                return Err(InputError::MissingArgument("go"));
            }
            let number = rest
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| InputError::BadIndex(rest.to_string()))?;
            SessionCommand::GoTo(number - 1)
        }
        "pause" => SessionCommand::Pause,
        "resume" => SessionCommand::Resume,
        "submit" => SessionCommand::Submit,
        "exit" | "quit" | "q" => SessionCommand::Exit,
        _ => return Err(InputError::Unknown(word.to_string())),
    };
    Ok(Input::Command(command))
}

/// Shape answer text for a question of `kind`.
///
/// Options are letters (`B`, `A,C`); matrix rows map a row letter to column
/// letters (`A=PQ;B=R`, columns `P`..`T`); integer answers are kept verbatim.
///
/// # Errors
///
/// Returns `InputError::BadAnswer` if the text does not fit the kind.
pub fn parse_answer(kind: QuestionKind, raw: &str) -> Result<Answer, InputError> {
    let bad = || InputError::BadAnswer {
        kind,
        raw: raw.to_string(),
    };
    let raw = raw.trim();
    match kind {
        QuestionKind::IntegerAnswer => Ok(Answer::Numeric(raw.to_string())),
        QuestionKind::SingleCorrect => {
            let mut letters = option_letters(raw, 'A').ok_or_else(bad)?.into_iter();
            match (letters.next(), letters.next()) {
                (Some(index), None) => Ok(Answer::Choice(index)),
                _ => Err(bad()),
            }
        }
        QuestionKind::MultipleCorrect => {
            let letters = option_letters(raw, 'A').ok_or_else(bad)?;
            Ok(Answer::Choices(letters.into_iter().collect()))
        }
        QuestionKind::Comprehension => {
            let letters = option_letters(raw, 'A').ok_or_else(bad)?;
            if letters.len() == 1 {
                Ok(Answer::Choice(letters[0]))
            } else {
                Ok(Answer::Choices(letters.into_iter().collect()))
            }
        }
        QuestionKind::MatrixMatch => {
            let mut rows = BTreeMap::new();
            for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                let (row, columns) = pair.split_once('=').ok_or_else(bad)?;
                let row = match option_letters(row, 'A').as_deref() {
                    Some([row]) => *row,
                    _ => return Err(bad()),
                };
                let columns: BTreeSet<usize> =
                    option_letters(columns, 'P').ok_or_else(bad)?.into_iter().collect();
                rows.insert(row, columns);
            }
            if rows.is_empty() {
                return Err(bad());
            }
            Ok(Answer::Matching(rows))
        }
    }
}

/// Letters offset from `first`, ignoring commas and spaces. `None` on any other character.
fn option_letters(raw: &str, first: char) -> Option<Vec<usize>> {
    let first = u32::from(first);
    let letters: Vec<usize> = raw
        .chars()
        .filter(|c| !matches!(c, ',' | ' '))
        .map(|c| {
            let offset = u32::from(c.to_ascii_uppercase()).checked_sub(first)?;
            (offset < 26).then_some(offset as usize)
        })
        .collect::<Option<_>>()?;
    (!letters.is_empty()).then_some(letters)
}
