use std::fmt;

use chrono::Utc;
use storage::repository::{FlagRecord, FlagRepository, Storage};

#[derive(Debug, Clone)]
enum Command {
    List,
    Get { key: String },
    Mark { key: String },
}

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    command: Command,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingCommand,
    MissingKey { command: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidKey { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingCommand => write!(f, "expected a command: list, get or mark"),
            ArgsError::MissingKey { command } => write!(f, "{command} requires a key"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidKey { raw } => write!(f, "invalid key: {raw:?}"),
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

fn require_key(
    args: &mut impl Iterator<Item = String>,
    command: &'static str,
) -> Result<String, ArgsError> {
    let key = args.next().ok_or(ArgsError::MissingKey { command })?;
    if key.trim().is_empty() {
        return Err(ArgsError::InvalidKey { raw: key });
    }
    Ok(key)
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("WATCH_REVEAL_DB_URL")
            .unwrap_or_else(|_| "sqlite:watch-reveal.sqlite3?mode=rwc".into());
        let mut command = None;

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
                "list" if command.is_none() => command = Some(Command::List),
                "get" if command.is_none() => {
                    command = Some(Command::Get {
                        key: require_key(&mut args, "get")?,
                    });
                }
                "mark" if command.is_none() => {
                    command = Some(Command::Mark {
                        key: require_key(&mut args, "mark")?,
                    });
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
            command: command.ok_or(ArgsError::MissingCommand)?,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin flags -- [--db <sqlite_url>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  list                      Print every persisted reveal flag");
    eprintln!("  get <key>                 Print one flag value");
    eprintln!("  mark <key>                Persist \"true\" under <key>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:watch-reveal.sqlite3?mode=rwc)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  WATCH_REVEAL_DB_URL");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;

    match args.command {
        Command::List => {
            let records = storage.flags.load_flags().await?;
            if records.is_empty() {
                println!("No flags stored in {}", args.db_url);
            }
            for record in records {
                println!(
                    "{}\t{}\t{}",
                    record.key,
                    record.value,
                    record.updated_at.to_rfc3339()
                );
            }
        }
        Command::Get { key } => match storage.flags.get_flag(&key).await? {
            Some(record) => println!("{}", record.value),
            None => println!("(absent)"),
        },
        Command::Mark { key } => {
            let record = FlagRecord {
                key,
                value: "true".into(),
                updated_at: Utc::now(),
            };
            storage.flags.put_flag(&record).await?;
            println!("Marked {} in {}", record.key, args.db_url);
        }
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
