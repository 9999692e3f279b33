use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

use exam_core::export::answer_key;
use exam_core::model::{Question, SessionId, Subject, TestConfig};
use services::{
    Clock, EngineSettings, SessionCommand, SessionLoopService, SessionRunner, SessionView,
    TestSession,
};
use storage::repository::Storage;

mod input;
mod telemetry;

use input::{HELP, Input, parse_answer, parse_line};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    UnknownPreset { raw: String },
    InvalidSessionId { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::UnknownPreset { raw } => write!(f, "unknown --preset value: {raw}"),
            ArgsError::InvalidSessionId { raw } => write!(f, "invalid --resume value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug)]
enum AppError {
    NothingToResume,
    UnknownSession(SessionId),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NothingToResume => write!(f, "no saved session to resume"),
            AppError::UnknownSession(id) => write!(f, "no saved session with id {id}"),
        }
    }
}

impl std::error::Error for AppError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ResumeTarget {
    Latest,
    Session(SessionId),
}

#[derive(Debug)]
struct Args {
    db_url: String,
    preset: TestConfig,
    resume: Option<ResumeTarget>,
    history: bool,
    log_level: String,
    log_json: bool,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--db <sqlite_url>] [--preset <name>] [--resume <id|latest>] [--history]");
    eprintln!();
    eprintln!("Presets:");
    eprintln!("  main, advanced, quick, physics, chemistry, mathematics (default: quick)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_DB_URL, EXAM_PRESET, EXAM_LOG, EXAM_LOG_JSON");
    eprintln!("  EXAM_TICK_MILLIS, EXAM_AUTOSAVE_SECS, EXAM_SHUFFLE, EXAM_STRENGTH_PCT, EXAM_WEAKNESS_PCT");
}

fn preset(name: &str) -> Result<TestConfig, ArgsError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "main" | "jee-main" => Ok(TestConfig::jee_main_full()),
        "advanced" | "jee-advanced" => Ok(TestConfig::jee_advanced_full()),
        "quick" => Ok(TestConfig::quick_practice()),
        "physics" => Ok(TestConfig::subject_test(Subject::Physics)),
        "chemistry" => Ok(TestConfig::subject_test(Subject::Chemistry)),
        "mathematics" | "maths" => Ok(TestConfig::subject_test(Subject::Mathematics)),
        _ => Err(ArgsError::UnknownPreset {
            raw: name.to_string(),
        }),
    }
}

fn resume_target(raw: String) -> Result<ResumeTarget, ArgsError> {
    if raw == "latest" {
        return Ok(ResumeTarget::Latest);
    }
    raw.parse()
        .map(ResumeTarget::Session)
        .map_err(|_| ArgsError::InvalidSessionId { raw })
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url =
            env_var("EXAM_DB_URL").unwrap_or_else(|| "sqlite:exam.sqlite3?mode=rwc".into());
        let mut preset_config = match env_var("EXAM_PRESET") {
            Some(name) => preset(&name)?,
            None => TestConfig::quick_practice(),
        };
        let mut resume = None;
        let mut history = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--preset" => {
                    let value = require_value(args, "--preset")?;
                    preset_config = preset(&value)?;
                }
                "--resume" => {
                    let value = require_value(args, "--resume")?;
                    resume = Some(resume_target(value)?);
                }
                "--history" => history = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            preset: preset_config,
            resume,
            history,
            log_level: env_var("EXAM_LOG").unwrap_or_else(|| "info".into()),
            log_json: env_var("EXAM_LOG_JSON")
                .is_some_and(|value| matches!(value.as_str(), "1" | "true" | "yes" | "on")),
        })
    }
}

async fn open_session(
    service: &SessionLoopService,
    args: &Args,
) -> Result<TestSession, Box<dyn std::error::Error>> {
    let id = match &args.resume {
        None => return Ok(service.start_session(&args.preset).await?),
        Some(ResumeTarget::Session(id)) => *id,
        Some(ResumeTarget::Latest) => {
            let mut candidates = Vec::new();
            for id in service.resumable_sessions().await? {
                if let Some(session) = service.resume_session(id).await? {
                    candidates.push(session);
                }
            }
            return candidates
                .into_iter()
                .max_by_key(TestSession::started_at)
                .ok_or_else(|| AppError::NothingToResume.into());
        }
    };
    service
        .resume_session(id)
        .await?
        .ok_or_else(|| AppError::UnknownSession(id).into())
}

async fn print_history(service: &SessionLoopService) -> Result<(), Box<dyn std::error::Error>> {
    let attempts = service.history().await?;
    if attempts.is_empty() {
        println!("No completed attempts yet.");
    }
    for attempt in attempts {
        println!(
            "{}  {}  {}  score {}/{} ({:.1}%)",
            attempt.submitted_at.format("%Y-%m-%d %H:%M"),
            attempt.session_id,
            attempt.title,
            attempt.result.total_score,
            attempt.result.max_score,
            attempt.result.percentage,
        );
    }
    for id in service.resumable_sessions().await? {
        println!("in progress: {id}");
    }
    Ok(())
}

fn show(view: &SessionView, questions: &[Question]) {
    let Some(question) = questions.get(view.current_index) else {
        return;
    };
    println!(
        "[{}] Q{}/{} {} | {} | {} | answered {} marked {}{}",
        view.remaining_display,
        view.current_index + 1,
        view.progress.total,
        question.subject(),
        question.topic(),
        question.kind(),
        view.progress.answered,
        view.progress.marked,
        if view.critical { " | hurry!" } else { "" },
    );
    println!("{}", question.prompt());
    for (index, option) in question.options().iter().enumerate() {
        let letter = char::from(b'A' + u8::try_from(index % 26).unwrap_or(0));
        println!("  {letter}. {option}");
    }
}

/// Read terminal lines and forward them as session commands until the runner stops.
async fn drive_from_stdin(
    commands: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<SessionView>,
    questions: Arc<Vec<Question>>,
) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_line(&line) {
            Ok(Input::Command(command)) => command,
            Ok(Input::Answer(raw)) => {
                let current = view.borrow().current_index;
                let Some(question) = questions.get(current) else {
                    continue;
                };
                match parse_answer(question.kind(), &raw) {
                    Ok(answer) => SessionCommand::Answer {
                        question_id: question.id().clone(),
                        answer,
                    },
                    Err(err) => {
                        eprintln!("{err}");
                        continue;
                    }
                }
            }
            Ok(Input::Show) => {
                show(&view.borrow(), &questions);
                continue;
            }
            Ok(Input::Help) => {
                println!("{HELP}");
                continue;
            }
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };
        if commands.send(command).await.is_err() {
            return Ok(());
        }
    }
    // End of input leaves the attempt resumable.
    let _ = commands.send(SessionCommand::Exit).await;
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    telemetry::init_tracing(&args.log_level, args.log_json)?;

    let settings = EngineSettings::from_env()?;
    let storage = Storage::sqlite(&args.db_url).await?;
    let service = SessionLoopService::new(
        Clock::default_clock(),
        Arc::clone(&storage.questions),
        Arc::clone(&storage.kv),
    )
    .with_settings(settings);

    if args.history {
        return print_history(&service).await;
    }

    let session = open_session(&service, &args).await?;
    let session_id = session.id();
    let questions = Arc::new(session.questions().to_vec());
    println!("{} ({session_id})", session.title());
    println!("{HELP}");

    let (runner, handle) = SessionRunner::new(service.clone(), session);
    show(&handle.view.borrow(), &questions);
    let runner_task = tokio::spawn(runner.run());
    let input_task = tokio::spawn(drive_from_stdin(
        handle.commands.clone(),
        handle.view.clone(),
        Arc::clone(&questions),
    ));
    drop(handle);

    let mut session = runner_task.await?;
    input_task.abort();

    if session.is_submitted() && !service.finalize(&mut session).await {
        eprintln!("warning: attempt {session_id} could not be saved to history");
    }

    let Some(result) = session.result() else {
        println!("Session saved. Resume with --resume {session_id}");
        return Ok(());
    };
    println!("{}", serde_json::to_string_pretty(result)?);
    for row in answer_key(session.questions(), session.states()) {
        println!(
            "{:>3}. {} {}  correct {}  yours {}  {} ({:+})",
            row.question_number,
            row.subject,
            row.question_id,
            row.correct_answer_display,
            row.user_answer_display,
            row.correctness.label(),
            row.marks_awarded,
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
