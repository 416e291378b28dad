use std::fmt;
use std::sync::Arc;

use quest_core::SessionState;
use quest_core::model::{ActivityId, Answer, Question};
use services::{
    AnswerFeedback, Clock, HttpPlayRecorder, PlayConfig, PlayLoopService, PlayRecordConfig,
    PlaySession, PlayTelemetry, PlayView, ResumeOutcome, TimerDriver,
};
use storage::repository::Storage;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidActivityId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidActivityId { raw } => {
                write!(f, "invalid --activity-id value: {raw}")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

struct Args {
    db_url: String,
    activity_id: ActivityId,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- play   [--db <sqlite_url>] [--activity-id <id>]");
    eprintln!("  cargo run -p app -- resume [--db <sqlite_url>] [--activity-id <id>]");
    eprintln!("  cargo run -p app -- list   [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:dev.sqlite3");
    eprintln!("  --activity-id 1");
    eprintln!();
    eprintln!("While playing, type an option number or a free-text answer.");
    eprintln!("  /quit     leave and keep progress for `resume`");
    eprintln!("  /restart  back to the start screen with nothing saved");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUEST_DB_URL, QUEST_ACTIVITY_ID, QUEST_RECORDS_URL, QUEST_RECORDS_KEY,");
    eprintln!("  QUEST_PROGRESS_TTL_HOURS, QUEST_GAME_OVER_DELAY_MS, QUEST_TICK_MILLIS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Resume,
    List,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "resume" => Some(Self::Resume),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUEST_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("sqlite:dev.sqlite3".into()), normalize_sqlite_url);
        let mut activity_id = std::env::var("QUEST_ACTIVITY_ID")
            .ok()
            .and_then(|value| value.parse::<ActivityId>().ok())
            .unwrap_or_else(|| ActivityId::new(1));

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--activity-id" => {
                    let value = require_value(args, "--activity-id")?;
                    activity_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidActivityId { raw: value.clone() })?;
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
            activity_id,
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

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

//
// ─── RENDERING ─────────────────────────────────────────────────────────────────
//

fn render(view: &PlayView) {
    match view.state {
        SessionState::Intro => println!("== {} ==", view.title),
        SessionState::Lesson => {
            if let Some(stage) = &view.stage {
                println!();
                println!("-- Stage {}/{}: {} --", stage.index + 1, stage.count, stage.title);
                if let Some(lesson) = &stage.lesson {
                    println!("{lesson}");
                }
            }
            println!("(press enter to start the questions)");
        }
        SessionState::Playing => {
            let Some(question) = &view.question else {
                return;
            };
            println!();
            println!(
                "[{}/{}] {}{}{}",
                view.position(),
                view.question_count,
                question.prompt(),
                status_suffix("lives", view.lives),
                status_suffix("time", view.time_left_secs.map(|secs| format!("{secs}s"))),
            );
            if let Question::MultipleChoice(q) = question {
                for (i, option) in q.options.iter().enumerate() {
                    println!("  {}) {option}", i + 1);
                }
            }
        }
        SessionState::StageComplete => {
            if let Some(stage) = &view.stage {
                println!("Stage \"{}\" complete. Score so far: {}", stage.title, view.score);
            }
            println!("(press enter for the next stage)");
        }
        SessionState::QuizComplete | SessionState::QuestComplete => {
            println!("Finished! Final score: {}", view.score);
        }
        SessionState::GameOver => println!("Game over. Final score: {}", view.score),
        SessionState::TimeExpired => println!("Time is up. Final score: {}", view.score),
    }
}

fn status_suffix(label: &str, value: Option<impl fmt::Display>) -> String {
    value.map_or_else(String::new, |v| format!("  ({label}: {v})"))
}

fn render_feedback(feedback: &AnswerFeedback) {
    if feedback.correct {
        print!("Correct! +{}", feedback.score_delta);
        if feedback.time_bonus > 0 {
            print!(" (time bonus {})", feedback.time_bonus);
        }
        println!();
    } else {
        println!("Not quite. Answer: {}", feedback.expected_answer);
    }
    if !feedback.explanation.is_empty() {
        println!("{}", feedback.explanation);
    }
    if let Some(lives) = feedback.lives_left {
        println!("Lives left: {lives}");
    }
    if !feedback.game_over {
        println!("(press enter to continue)");
    }
}

//
// ─── PLAY LOOP ─────────────────────────────────────────────────────────────────
//

fn parse_answer(question: &Question, input: &str) -> Answer {
    match question {
        Question::MultipleChoice(_) => {
            let choice = input
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .unwrap_or(usize::MAX);
            Answer::Choice(choice)
        }
        Question::Subjective(_) => Answer::text(input),
    }
}

async fn handle_input(
    session: &mut PlaySession,
    input: &str,
    config: &PlayConfig,
) -> Result<(), services::PlayError> {
    match input {
        "/quit" => {
            session.quit().await?;
            println!("Progress saved. Run `resume` to continue.");
            return Ok(());
        }
        "/restart" => {
            session.restart().await?;
            session.start().await?;
            render(&session.view());
            return Ok(());
        }
        _ => {}
    }

    match session.state() {
        SessionState::Lesson => {
            session.acknowledge_lesson();
        }
        SessionState::StageComplete => {
            session.advance().await?;
        }
        SessionState::Playing => {
            let view = session.view();
            if view.answered {
                session.advance().await?;
            } else if let Some(question) = &view.question {
                let Some(feedback) = session.answer(parse_answer(question, input)).await else {
                    println!("That answer was not accepted, try again.");
                    return Ok(());
                };
                render_feedback(&feedback);
                if feedback.game_over {
                    tokio::time::sleep(config.game_over_delay).await;
                    session.advance().await?;
                } else {
                    return Ok(());
                }
            }
        }
        _ => return Ok(()),
    }

    render(&session.view());
    Ok(())
}

async fn next_tick(timer: &mut Option<TimerDriver>) -> Option<()> {
    match timer {
        Some(driver) => driver.next_tick().await,
        None => std::future::pending().await,
    }
}

async fn play(
    mut session: PlaySession,
    resume: bool,
    config: &PlayConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    render(&session.view());
    if resume {
        if session.resume().await? == ResumeOutcome::StartedFresh {
            println!("Nothing to resume, starting a new run.");
        }
    } else {
        session.start().await?;
    }
    render(&session.view());

    let mut timer = session
        .rules()
        .timer_budget
        .map(|_| TimerDriver::spawn(config.tick_interval));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while session.state() != SessionState::Intro && !session.state().is_terminal() {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    session.quit().await?;
                    break;
                };
                handle_input(&mut session, line.trim(), config).await?;
            }
            Some(()) = next_tick(&mut timer) => {
                let before = session.state();
                if session.tick().await? != before {
                    render(&session.view());
                }
            }
        }
    }

    if let Some(driver) = timer.as_mut() {
        driver.cancel();
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Play,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Play,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let skip = usize::from(argv.first().is_some_and(|first| !first.starts_with("--")));
    let mut iter = argv.into_iter().skip(skip);
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_tracing();
    let config = PlayConfig::from_env();

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    tracing::debug!(db = %parsed.db_url, "storage ready");

    let mut service = PlayLoopService::from_storage(Clock::default_clock(), &storage, &config);
    if let Some(records) = PlayRecordConfig::from_env() {
        tracing::info!(url = %records.base_url, "recording plays remotely");
        let recorder = Arc::new(HttpPlayRecorder::new(records));
        service = service.with_telemetry(PlayTelemetry::new(recorder.clone(), recorder));
    }

    match cmd {
        Command::List => {
            for activity in service.list_activities(128).await? {
                println!("{:>4}  {:?}  {}", activity.id, activity.mode(), activity.title);
            }
            Ok(())
        }
        Command::Play | Command::Resume => {
            let session = service.open(parsed.activity_id).await?;
            play(session, cmd == Command::Resume, &config).await
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_input_is_one_based() {
        let q = Question::multiple_choice("Q", ["a", "b"], 0, "");
        assert_eq!(parse_answer(&q, "2"), Answer::Choice(1));
        assert_eq!(parse_answer(&q, "0"), Answer::Choice(usize::MAX));
        assert_eq!(parse_answer(&q, "two"), Answer::Choice(usize::MAX));
    }

    #[test]
    fn text_input_is_passed_through() {
        let q = Question::subjective("Q", "model", "");
        assert_eq!(parse_answer(&q, "my words"), Answer::text("my words"));
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/dev.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/dev.sqlite3"));
        assert_eq!(
            normalize_sqlite_url("sqlite::memory:".into()),
            "sqlite::memory:"
        );
    }
}
