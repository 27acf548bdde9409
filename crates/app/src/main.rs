use std::fmt;

use exam_core::model::{ExamId, OptionId, SessionConfig, SubjectId, UserId};
use services::{Advance, AppServices, Clock, ExamError, PoolNotice, RunningExam};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidUserId { raw: String },
    InvalidSubject { raw: String },
    InvalidQuestions { raw: String },
    InvalidMinutes { raw: String },
    InvalidExamId { raw: String },
    MissingExamId,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidSubject { raw } => write!(f, "invalid --subject value: {raw}"),
            ArgsError::InvalidQuestions { raw } => write!(f, "invalid --questions value: {raw}"),
            ArgsError::InvalidMinutes { raw } => write!(f, "invalid --minutes value: {raw}"),
            ArgsError::InvalidExamId { raw } => write!(f, "invalid --exam-id value: {raw}"),
            ArgsError::MissingExamId => write!(f, "result requires --exam-id"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- take   [--db <sqlite_url>] [--user <uuid>] [--guest]");
    eprintln!("                             [--subject <id>[,<id>...]]... [--questions <n>] [--minutes <n>]");
    eprintln!("  cargo run -p app -- result [--db <sqlite_url>] --exam-id <id>");
    eprintln!();
    eprintln!("Defaults for take:");
    eprintln!("  --db sqlite://dev.sqlite3");
    eprintln!("  --subject 1 --questions 10 --minutes 10");
    eprintln!();
    eprintln!("During the exam type an option label to select it, `n` for next,");
    eprintln!("`t` for time left, `q` to leave early.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_DB_URL, EXAM_USER_ID, EXAM_SUBJECTS, EXAM_QUESTIONS, EXAM_MINUTES, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Take,
    Result,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "take" => Some(Self::Take),
            "result" => Some(Self::Result),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Args {
    db_url: String,
    user: Option<UserId>,
    guest: bool,
    subjects: Vec<SubjectId>,
    questions: u32,
    minutes: u32,
    exam_id: Option<ExamId>,
}

fn parse_subjects(raw: &str) -> Result<Vec<SubjectId>, ArgsError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<SubjectId>().map_err(|_| ArgsError::InvalidSubject {
                raw: part.to_owned(),
            })
        })
        .collect()
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("EXAM_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://dev.sqlite3".into(), normalize_sqlite_url);
        let mut user = match std::env::var("EXAM_USER_ID") {
            Ok(raw) => Some(
                raw.parse::<UserId>()
                    .map_err(|_| ArgsError::InvalidUserId { raw: raw.clone() })?,
            ),
            Err(_) => None,
        };
        let mut subjects = match std::env::var("EXAM_SUBJECTS") {
            Ok(raw) => parse_subjects(&raw)?,
            Err(_) => Vec::new(),
        };
        let mut questions = std::env::var("EXAM_QUESTIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(10);
        let mut minutes = std::env::var("EXAM_MINUTES")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(10);
        let mut guest = false;
        let mut exam_id = None;
        let mut subjects_from_flags = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    user = Some(
                        value
                            .parse::<UserId>()
                            .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?,
                    );
                }
                "--guest" => guest = true,
                "--subject" => {
                    let value = require_value(args, "--subject")?;
                    if !subjects_from_flags {
                        subjects.clear();
                        subjects_from_flags = true;
                    }
                    subjects.extend(parse_subjects(&value)?);
                }
                "--questions" => {
                    let value = require_value(args, "--questions")?;
                    questions = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidQuestions { raw: value.clone() })?;
                }
                "--minutes" => {
                    let value = require_value(args, "--minutes")?;
                    minutes = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidMinutes { raw: value.clone() })?;
                }
                "--exam-id" => {
                    let value = require_value(args, "--exam-id")?;
                    exam_id = Some(
                        value
                            .parse::<ExamId>()
                            .map_err(|_| ArgsError::InvalidExamId { raw: value.clone() })?,
                    );
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if subjects.is_empty() {
            subjects.push(SubjectId::new(1));
        }

        Ok(Self {
            db_url,
            user,
            guest,
            subjects,
            questions,
            minutes,
            exam_id,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

/// One line of exam input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Pick(String),
    Next,
    Time,
    Quit,
    Empty,
}

fn parse_input(line: &str) -> Input {
    match line.trim() {
        "" => Input::Empty,
        "n" | "next" => Input::Next,
        "t" | "time" => Input::Time,
        "q" | "quit" | "exit" => Input::Quit,
        label => Input::Pick(label.to_uppercase()),
    }
}

fn format_remaining(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn print_current(exam: &RunningExam) {
    let session = exam.session();
    let (Some(question), Some(position), Some(count)) = (
        session.current_question(),
        session.position(),
        session.question_count(),
    ) else {
        return;
    };

    println!();
    println!(
        "Question {} / {}   (time left {})",
        position + 1,
        count,
        format_remaining(session.remaining_secs().unwrap_or(0))
    );
    println!("{}", question.prompt());
    for option in question.options() {
        let marker = if session.selection(question.id()).as_ref() == Some(&option.id) {
            '*'
        } else {
            ' '
        };
        println!(" {marker} {}) {}", option.id, option.text);
    }
}

async fn take_exam(
    services: &AppServices,
    config: SessionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let exams = services.exams();
    let mut exam = match exams.start(config).await {
        Ok(exam) => exam,
        Err(ExamError::PoolEmpty) => {
            println!("No questions were found for the selected subjects.");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(PoolNotice::Insufficient {
        requested,
        available,
    }) = exam.notice()
    {
        println!(
            "Only {available} of {requested} requested questions were found. The exam continues with these."
        );
    }

    let mut timeout = exam
        .take_timeout()
        .ok_or("countdown channel already taken")?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_current(&exam);

    let claim = loop {
        tokio::select! {
            claim = &mut timeout => break claim?,
            line = lines.next_line() => {
                let Some(line) = line? else {
                    // stdin closed: leave early.
                    match exam.exit() {
                        Some(claim) => break claim,
                        None => break (&mut timeout).await?,
                    }
                };
                match parse_input(&line) {
                    Input::Empty => {}
                    Input::Next => match exam.advance() {
                        Advance::Moved { .. } => print_current(&exam),
                        Advance::Finished(claim) => break claim,
                        Advance::Ignored => {}
                    },
                    Input::Time => {
                        let left = exam.session().remaining_secs().unwrap_or(0);
                        println!("Time left: {}", format_remaining(left));
                    }
                    Input::Quit => {
                        if let Some(claim) = exam.exit() {
                            break claim;
                        }
                    }
                    Input::Pick(label) => {
                        let Some(question) = exam.session().current_question() else {
                            continue;
                        };
                        let option = OptionId::new(label);
                        if question.option(&option).is_some() {
                            exam.select_option(question.id(), option.clone());
                            println!("Selected {option}");
                        } else {
                            println!("No option {option}; type n, t or q, or an option label.");
                        }
                    }
                }
            }
        }
    };

    log::debug!("exam ended by {}", claim.reason());
    let report = exams.finish(exam, claim).await?;
    println!();
    println!("{}", report.headline());
    println!("{}", report.summary_line());
    if let Some(notice) = report.persistence_notice() {
        println!("{notice}");
    }
    if let Some(id) = report.exam_id() {
        println!("Saved as exam {id}.");
    }
    Ok(())
}

async fn show_result(
    services: &AppServices,
    exam_id: ExamId,
) -> Result<(), Box<dyn std::error::Error>> {
    let results = services.results();
    let stored = results.load(exam_id).await?;
    let answers = results.answers(exam_id).await?;

    let exam = &stored.exam;
    println!("Exam {}", stored.exam_id);
    println!(
        "  subjects:  {}",
        exam.subject_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "  questions: {} presented ({} requested), {} answered",
        exam.questions_presented, exam.questions_requested, exam.questions_answered
    );
    println!(
        "  time:      {} of {} minutes, ended by {}",
        format_remaining(exam.duration_taken_secs),
        exam.duration_requested_minutes,
        exam.reason
    );
    println!(
        "  score:     {} correct, {} incorrect, {} unanswered ({}%)",
        stored.score.correct(),
        stored.score.incorrect(),
        stored.score.unanswered(),
        stored.score.percentage()
    );
    for answer in answers {
        println!(
            "    question {}: {} {}",
            answer.question_id,
            answer.selected_option,
            if answer.is_correct { "correct" } else { "wrong" }
        );
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: take an exam when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Take,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Take,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    log::info!("opening exam database at {}", parsed.db_url);
    let services = AppServices::new_sqlite(&parsed.db_url, Clock::system(), parsed.user).await?;

    match cmd {
        Command::Take => {
            let config = SessionConfig::new(
                parsed.subjects.iter().copied(),
                parsed.questions,
                parsed.minutes,
                parsed.guest,
            )?;
            take_exam(&services, config).await
        }
        Command::Result => {
            let exam_id = parsed.exam_id.ok_or(ArgsError::MissingExamId)?;
            show_result(&services, exam_id).await
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
