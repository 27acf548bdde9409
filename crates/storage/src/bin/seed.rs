use std::fmt;

use exam_core::model::{AnswerOption, OptionId, Question, QuestionId, SubjectId};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    drills: u32,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidDrills { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidDrills { raw } => write!(f, "invalid --drills value: {raw}"),
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
            std::env::var("EXAM_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut drills = std::env::var("EXAM_SEED_DRILLS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(10);

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
                "--drills" => {
                    let value = require_value(&mut args, "--drills")?;
                    drills = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidDrills { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, drills })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --drills <n>              Extra arithmetic questions for subject 1 (default: 10)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  EXAM_DB_URL, EXAM_SEED_DRILLS");
}

/// (subject, prompt, options, correct label)
const BANK: &[(u64, &str, &[(&str, &str)], &str)] = &[
    (
        1,
        "What is 7 x 8?",
        &[("A", "54"), ("B", "56"), ("C", "64"), ("D", "48")],
        "B",
    ),
    (
        1,
        "Which number is prime?",
        &[("A", "21"), ("B", "27"), ("C", "29"), ("D", "33")],
        "C",
    ),
    (
        1,
        "What is the square root of 144?",
        &[("A", "12"), ("B", "14"), ("C", "11")],
        "A",
    ),
    (
        2,
        "What is the capital of Australia?",
        &[("A", "Sydney"), ("B", "Melbourne"), ("C", "Canberra"), ("D", "Perth")],
        "C",
    ),
    (
        2,
        "Which river flows through Cairo?",
        &[("A", "Nile"), ("B", "Tigris"), ("C", "Danube")],
        "A",
    ),
    (
        2,
        "Mount Kilimanjaro is in which country?",
        &[("A", "Kenya"), ("B", "Tanzania"), ("C", "Uganda"), ("D", "Ethiopia")],
        "B",
    ),
    (
        3,
        "What is the chemical symbol for sodium?",
        &[("A", "So"), ("B", "Sd"), ("C", "Na"), ("D", "S")],
        "C",
    ),
    (
        3,
        "Which planet is closest to the sun?",
        &[("A", "Venus"), ("B", "Mercury"), ("C", "Mars")],
        "B",
    ),
    (
        3,
        "Water boils at sea level at how many degrees Celsius?",
        &[("A", "90"), ("B", "100"), ("C", "110"), ("D", "212")],
        "B",
    ),
];

fn bank_questions() -> Result<Vec<Question>, exam_core::Error> {
    let mut out = Vec::with_capacity(BANK.len());
    for (i, (subject, prompt, options, correct)) in BANK.iter().enumerate() {
        let options = options
            .iter()
            .map(|(label, text)| AnswerOption::new(*label, *text))
            .collect();
        out.push(Question::new(
            QuestionId::new(i as u64 + 1),
            SubjectId::new(*subject),
            *prompt,
            options,
            OptionId::new(*correct),
        )?);
    }
    Ok(out)
}

/// Addition drills with the right answer rotating through A..D.
fn drill_questions(first_id: u64, count: u32) -> Result<Vec<Question>, exam_core::Error> {
    let labels = ["A", "B", "C", "D"];
    let mut out = Vec::with_capacity(count as usize);
    for i in 0..count {
        let a = 3 + u64::from(i) * 7 % 40;
        let b = 5 + u64::from(i) * 11 % 30;
        let sum = a + b;
        let correct_slot = (i as usize) % labels.len();
        let options = labels
            .iter()
            .enumerate()
            .map(|(slot, label)| {
                let value = sum + slot as u64 - correct_slot as u64;
                AnswerOption::new(*label, value.to_string())
            })
            .collect();
        out.push(Question::new(
            QuestionId::new(first_id + u64::from(i)),
            SubjectId::new(1),
            format!("What is {a} + {b}?"),
            options,
            OptionId::new(labels[correct_slot]),
        )?);
    }
    Ok(out)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;

    let mut questions = bank_questions()?;
    let next_id = questions.len() as u64 + 1;
    questions.extend(drill_questions(next_id, args.drills)?);

    for question in &questions {
        storage.questions.upsert_question(question).await?;
        log::debug!(
            "upserted question {} (subject {})",
            question.id(),
            question.subject_id()
        );
    }

    println!(
        "Seeded {} questions across subjects 1-3 into {}",
        questions.len(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
