use std::fmt;

use quest_core::model::{Activity, ActivityId, Question, Stage, ThemeConfig};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    quiz_id: ActivityId,
    quest_id: ActivityId,
    timer_secs: Option<u32>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidId { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidTimer { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidTimer { raw } => write!(f, "invalid --timer value: {raw}"),
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

fn parse_id(flag: &'static str, value: String) -> Result<ActivityId, ArgsError> {
    value
        .parse()
        .map_err(|_| ArgsError::InvalidId { flag, raw: value })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUEST_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut quiz_id = ActivityId::new(1);
        let mut quest_id = ActivityId::new(2);
        let mut timer_secs = None;

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
                "--quiz-id" => {
                    quiz_id = parse_id("--quiz-id", require_value(&mut args, "--quiz-id")?)?;
                }
                "--quest-id" => {
                    quest_id = parse_id("--quest-id", require_value(&mut args, "--quest-id")?)?;
                }
                "--timer" => {
                    let value = require_value(&mut args, "--timer")?;
                    let secs = value
                        .parse::<u32>()
                        .ok()
                        .filter(|secs| *secs > 0)
                        .ok_or(ArgsError::InvalidTimer { raw: value.clone() })?;
                    timer_secs = Some(secs);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            quiz_id,
            quest_id,
            timer_secs,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --quiz-id <id>            Id of the sample quiz (default: 1)");
    eprintln!("  --quest-id <id>           Id of the sample quest (default: 2)");
    eprintln!("  --timer <secs>            Enable the session timer with this budget");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUEST_DB_URL");
}

fn sample_quiz(id: ActivityId, theme: ThemeConfig) -> Activity {
    Activity::quiz(
        id,
        "German basics",
        vec![
            Question::multiple_choice(
                "What does \"Danke\" mean?",
                ["Please", "Thank you", "Goodbye"],
                1,
                "\"Danke\" is the everyday way to say thank you.",
            ),
            Question::multiple_choice(
                "How do you say \"Good morning\"?",
                ["Guten Morgen", "Gute Nacht", "Guten Abend"],
                0,
                "\"Gute Nacht\" is good night, \"Guten Abend\" good evening.",
            ),
            Question::subjective(
                "Introduce yourself in one German sentence.",
                "Ich heisse Alex.",
                "\"Ich heisse ...\" or \"Mein Name ist ...\" both work.",
            ),
        ],
    )
    .with_theme(theme)
}

fn sample_quest(id: ActivityId, theme: ThemeConfig) -> Activity {
    Activity::quest(
        id,
        "Journey through the solar system",
        vec![
            Stage {
                title: "Inner planets".into(),
                lesson: "Mercury, Venus, Earth and Mars are small rocky worlds.".into(),
                questions: vec![
                    Question::multiple_choice(
                        "Which planet is closest to the Sun?",
                        ["Venus", "Mercury", "Mars"],
                        1,
                        "Mercury orbits at about 0.39 AU.",
                    ),
                    Question::multiple_choice(
                        "Which planet is called the red planet?",
                        ["Mars", "Earth"],
                        0,
                        "Iron oxide dust gives Mars its colour.",
                    ),
                ],
            },
            Stage {
                title: "Gas giants".into(),
                lesson: "Jupiter and Saturn are mostly hydrogen and helium.".into(),
                questions: vec![
                    Question::multiple_choice(
                        "Which is the largest planet?",
                        ["Saturn", "Jupiter"],
                        1,
                        "Jupiter is more than twice as massive as all other planets combined.",
                    ),
                    Question::subjective(
                        "Why does Saturn have rings?",
                        "Ice and rock debris captured in orbit.",
                        "The rings are mostly water ice with some rock.",
                    ),
                ],
            },
        ],
    )
    .with_theme(theme)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let theme = match args.timer_secs {
        Some(secs) => ThemeConfig::new(true, secs, true, 3)?,
        None => ThemeConfig::default(),
    };

    let quiz = sample_quiz(args.quiz_id, theme);
    let quest = sample_quest(args.quest_id, theme);
    storage.activities.upsert_activity(&quiz).await?;
    storage.activities.upsert_activity(&quest).await?;

    println!(
        "Seeded quiz {} and quest {} into {}",
        args.quiz_id, args.quest_id, args.db_url
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
