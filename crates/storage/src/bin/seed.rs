use std::collections::BTreeSet;
use std::fmt;

use exam_core::model::{
    AnswerKey, Difficulty, IntegerRange, QuestionDraft, QuestionId, QuestionKind, Subject,
};
use storage::repository::Storage;

const QUESTIONS_PER_SUBJECT: u32 = 18;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    papers: u32,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidPapers { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidPapers { raw } => write!(f, "invalid --papers value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("EXAM_DB_URL").unwrap_or_else(|_| "sqlite:exam.sqlite3?mode=rwc".into());
        let mut papers = std::env::var("EXAM_SEED_PAPERS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(2);

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--papers" => {
                    let value = require_value(&mut args, "--papers")?;
                    papers = value
                        .parse::<u32>()
                        .ok()
                        .filter(|p| *p > 0)
                        .ok_or_else(|| ArgsError::InvalidPapers { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, papers })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:exam.sqlite3?mode=rwc)");
    eprintln!("  --papers <n>              Papers to generate, 18 questions per subject each (default: 2)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  EXAM_DB_URL, EXAM_SEED_PAPERS");
}

fn topics(subject: Subject) -> &'static [&'static str] {
    match subject {
        Subject::Physics => &[
            "Mechanics",
            "Thermodynamics",
            "Electrodynamics",
            "Optics",
            "Modern Physics",
        ],
        Subject::Chemistry => &[
            "Physical Chemistry",
            "Organic Chemistry",
            "Inorganic Chemistry",
        ],
        Subject::Mathematics => &[
            "Algebra",
            "Calculus",
            "Geometry",
            "Trigonometry",
            "Statistics",
        ],
    }
}

/// Deterministic stand-in question; kinds cycle single, multiple, integer.
fn generated_question(subject: Subject, paper: u32, i: u32) -> QuestionDraft {
    const DIFFICULTIES: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Moderate,
        Difficulty::Hard,
        Difficulty::VeryHard,
    ];
    let n = i as usize;
    let subject_topics = topics(subject);
    let topic = subject_topics[n % subject_topics.len()];
    let number = i + 1;

    let (kind, answer_key, marks, negative_marks) = match i % 3 {
        0 => (QuestionKind::SingleCorrect, AnswerKey::Single(1), 3, 1),
        1 => (
            QuestionKind::MultipleCorrect,
            AnswerKey::Multiple(BTreeSet::from([1, 2])),
            4,
            2,
        ),
        _ => (
            QuestionKind::IntegerAnswer,
            AnswerKey::Integer {
                value: ((paper * 37 + i * 13) % 100).to_string(),
                range: Some(IntegerRange { min: 0, max: 999 }),
            },
            3,
            0,
        ),
    };
    let options = if kind.requires_options() {
        vec![
            "Option A - plausible but wrong".to_string(),
            "Option B - correct".to_string(),
            "Option C - common mistake".to_string(),
            "Option D - attractive but wrong".to_string(),
        ]
    } else {
        Vec::new()
    };

    QuestionDraft {
        id: QuestionId::new(format!(
            "{}_p{paper}_{number:03}",
            subject.as_str().to_ascii_lowercase()
        )),
        subject,
        topic: topic.to_string(),
        difficulty: DIFFICULTIES[n % DIFFICULTIES.len()],
        kind,
        prompt: format!("{subject} Paper-{paper} Question {number}: a challenging {topic} problem."),
        options,
        answer_key,
        marks,
        negative_marks,
        estimated_time_secs: 120 + (i * 7) % 120,
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;

    let mut seeded = 0_u32;
    for paper in 1..=args.papers {
        for subject in Subject::ALL {
            for i in 0..QUESTIONS_PER_SUBJECT {
                let question = generated_question(subject, paper, i).validate()?;
                storage.questions.upsert_question(&question).await?;
                seeded += 1;
            }
        }
    }

    println!(
        "Seeded {seeded} questions ({} papers) into {}",
        args.papers, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
