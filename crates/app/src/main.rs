use std::fmt;
use std::sync::Arc;

use aptitude_core::model::UserId;
use services::{DashboardService, load_question_bank};
use storage::repository::Storage;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    MissingUser,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::MissingUser => write!(f, "--user is required for this command"),
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
    eprintln!("  cargo run -p app -- migrate     [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- check-bank  --file <questions.json>");
    eprintln!("  cargo run -p app -- leaderboard [--db <sqlite_url>] [--limit <n>]");
    eprintln!("  cargo run -p app -- history     [--db <sqlite_url>] --user <id> [--page <n>] [--limit <n>]");
    eprintln!("  cargo run -p app -- stats       [--db <sqlite_url>] --user <id>");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:aptitude.sqlite3   --limit 10   --page 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  APTITUDE_DB_URL, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Migrate,
    CheckBank,
    Leaderboard,
    History,
    Stats,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "migrate" => Some(Self::Migrate),
            "check-bank" => Some(Self::CheckBank),
            "leaderboard" => Some(Self::Leaderboard),
            "history" => Some(Self::History),
            "stats" => Some(Self::Stats),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    file: Option<String>,
    user: Option<UserId>,
    page: u32,
    limit: u32,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("APTITUDE_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://aptitude.sqlite3".into(), normalize_sqlite_url);
        let mut file = None;
        let mut user = None;
        let mut page = 1;
        let mut limit = 10;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--file" => {
                    file = Some(require_value(args, "--file")?);
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    let parsed = value
                        .parse::<UserId>()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                    user = Some(parsed);
                }
                "--page" => {
                    let value = require_value(args, "--page")?;
                    page = value.parse().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--page",
                        raw: value.clone(),
                    })?;
                }
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    limit = value.parse().map_err(|_| ArgsError::InvalidNumber {
                        flag: "--limit",
                        raw: value.clone(),
                    })?;
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
            file,
            user,
            page,
            limit,
        })
    }

    fn require_user(&self) -> Result<UserId, ArgsError> {
        self.user.ok_or(ArgsError::MissingUser)
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:") {
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
    if db_url == "sqlite::memory:" || db_url.starts_with("sqlite:file:") {
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

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    argv.remove(0);

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    if cmd == Command::CheckBank {
        let file = parsed.file.as_deref().unwrap_or("questions.json");
        let bank = load_question_bank(std::path::Path::new(file))?;
        println!("{}: {} questions, all valid", file, bank.len());
        return Ok(());
    }

    // Open + migrate SQLite at startup. Keep this in the binary glue so
    // core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    let dashboard = DashboardService::new(Arc::clone(&storage.sessions));

    match cmd {
        Command::CheckBank => unreachable!("handled above"),
        Command::Migrate => {
            // Storage::sqlite already ran the migrations.
            println!("database ready at {}", parsed.db_url);
        }
        Command::Leaderboard => {
            let board = dashboard.leaderboard(parsed.limit).await?;
            if board.is_empty() {
                println!("no finished tests yet");
                return Ok(());
            }
            println!("{:<4} {:<20} {:>6} {:>8} {:>8}", "#", "user", "tests", "avg%", "best%");
            for (rank, entry) in board.iter().enumerate() {
                println!(
                    "{:<4} {:<20} {:>6} {:>8.2} {:>8.2}",
                    rank + 1,
                    entry.username,
                    entry.total_tests,
                    entry.avg_percentage,
                    entry.best_percentage,
                );
            }
        }
        Command::History => {
            let user = parsed.require_user()?;
            let history = dashboard.history(user, parsed.page, parsed.limit).await?;
            println!(
                "page {}/{} ({} tests total)",
                history.page, history.total_pages, history.total
            );
            for row in &history.sessions {
                println!(
                    "{}  {:>3}/{:<3} {:>7.2}%  {:>5}s  {}",
                    row.test_date.format("%Y-%m-%d %H:%M"),
                    row.score,
                    row.total_questions,
                    row.percentage,
                    row.time_taken_seconds,
                    row.trigger,
                );
            }
        }
        Command::Stats => {
            let user = parsed.require_user()?;
            let view = dashboard.statistics(user).await?;
            let stats = &view.statistics;
            println!("tests taken:      {}", stats.total_tests);
            if let Some(avg) = stats.avg_percentage {
                println!("average score:    {avg:.2}%");
            }
            if let Some(best) = stats.best_percentage {
                println!("best score:       {best:.2}%");
            }
            if let Some(lowest) = stats.lowest_percentage {
                println!("lowest score:     {lowest:.2}%");
            }
            if let Some(total_time) = stats.total_time_spent_seconds {
                println!("total time spent: {total_time}s");
            }
            if let Some(high) = stats.highest_score {
                println!("highest score:    {high} correct");
            }
            if !view.trend.is_empty() {
                let trend: Vec<String> = view
                    .trend
                    .iter()
                    .map(|p| format!("{:.1}%", p.percentage))
                    .collect();
                println!("recent trend:     {}", trend.join(" -> "));
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
