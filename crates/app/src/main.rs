use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use dioxus::LaunchBuilder;
use dioxus::desktop::{Config as DesktopConfig, WindowBuilder};
use reveal_core::{RevealConfig, RevealConfigDraft, Scheduler};
use services::{
    Clock, Collaborators, EnvironmentReader, Initializer, SimulatedPlayer,
    SimulatedPlayerHost, StaticEnvironment, TokioScheduler, resolve_config,
};
use services::simulated_player::TIME_UPDATE_PERIOD;
use storage::repository::{KeyValueStore, Storage};
use storage::{DurableStore, DurableStoreWriter};
use tracing_subscriber::EnvFilter;
use ui::page::build_landing_page;
use ui::{App, DemoOptions, UiApp, build_app_context};

const DEFAULT_DB_URL: &str = "sqlite://watch-reveal.sqlite3";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    InvalidConfig { source: &'static str, reason: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidConfig { source, reason } => {
                write!(f, "invalid configuration in {source}: {reason}")
            }
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

fn require_number<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let raw = require_value(args, flag)?;
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

struct DesktopApp {
    environment: StaticEnvironment,
    store: Arc<dyn KeyValueStore>,
    demo_options: DemoOptions,
}

impl UiApp for DesktopApp {
    fn environment(&self) -> StaticEnvironment {
        self.environment.clone()
    }

    fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    fn demo_options(&self) -> DemoOptions {
        self.demo_options.clone()
    }
}

/// Knobs for the headless run.
#[derive(Debug, Clone, Copy)]
struct SimulateArgs {
    /// Media seconds played per wall second.
    speed: f64,
    /// Give up after this much wall time.
    timeout: Duration,
    player_delay: Duration,
    /// Do not load a player at all; exercises the discovery fallback.
    no_player: bool,
}

impl Default for SimulateArgs {
    fn default() -> Self {
        Self {
            speed: 120.0,
            timeout: Duration::from_secs(60),
            player_delay: Duration::from_millis(500),
            no_player: false,
        }
    }
}

struct Args {
    db_url: String,
    environment: StaticEnvironment,
    debug: bool,
    simulate: SimulateArgs,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- ui       [--db <sqlite_url>] [--config <json>] [--config-file <path>] [--debug]");
    eprintln!("  cargo run -p app -- simulate [--db <sqlite_url>] [--config <json>] [--config-file <path>] [--debug]");
    eprintln!("                               [--speed <x>] [--timeout-secs <n>] [--player-delay-ms <n>] [--no-player]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --speed 120 --timeout-secs 60 --player-delay-ms 500");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  WATCH_REVEAL_DB_URL, WATCH_REVEAL_CONFIG (global configuration object), RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Ui,
    Simulate,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "ui" => Some(Self::Ui),
            "simulate" => Some(Self::Simulate),
            _ => None,
        }
    }
}

impl Args {
    fn parse(cmd: Command, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("WATCH_REVEAL_DB_URL")
            .ok()
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut global = match std::env::var("WATCH_REVEAL_CONFIG") {
            Ok(raw) => Some(parse_global(&raw, "WATCH_REVEAL_CONFIG")?),
            Err(_) => None,
        };
        let mut attribute = None;
        let mut debug = false;
        let mut simulate = SimulateArgs::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--config" => attribute = Some(require_value(args, "--config")?),
                "--config-file" => {
                    let path = require_value(args, "--config-file")?;
                    let raw = std::fs::read_to_string(&path).map_err(|err| {
                        ArgsError::InvalidConfig {
                            source: "--config-file",
                            reason: format!("{path}: {err}"),
                        }
                    })?;
                    global = Some(parse_global(&raw, "--config-file")?);
                }
                "--debug" => debug = true,
                "--speed" if cmd == Command::Simulate => {
                    simulate.speed = require_number(args, "--speed")?;
                }
                "--timeout-secs" if cmd == Command::Simulate => {
                    simulate.timeout = Duration::from_secs(require_number(args, "--timeout-secs")?);
                }
                "--player-delay-ms" if cmd == Command::Simulate => {
                    simulate.player_delay =
                        Duration::from_millis(require_number(args, "--player-delay-ms")?);
                }
                "--no-player" if cmd == Command::Simulate => simulate.no_player = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if !(simulate.speed.is_finite() && simulate.speed > 0.0) {
            return Err(ArgsError::InvalidNumber {
                flag: "--speed",
                raw: simulate.speed.to_string(),
            });
        }

        Ok(Self {
            db_url,
            environment: StaticEnvironment { global, attribute },
            debug,
            simulate,
        })
    }
}

fn parse_global(raw: &str, source: &'static str) -> Result<serde_json::Value, ArgsError> {
    serde_json::from_str(raw).map_err(|err| ArgsError::InvalidConfig {
        source,
        reason: err.to_string(),
    })
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

fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
    {
        eprintln!("tracing already initialised, keeping the existing subscriber: {err}");
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // No subcommand launches the UI.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Ui,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Ui,
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
    let parsed = Args::parse(cmd, &mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_tracing(parsed.debug);

    // Open + migrate SQLite here so the library crates stay free of process concerns.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    let (store, writer) =
        DurableStore::open(Arc::clone(&storage.flags), Clock::default_clock()).await?;
    tracing::info!(db = %parsed.db_url, "flag storage ready");

    match cmd {
        Command::Ui => {
            let app = DesktopApp {
                environment: parsed.environment,
                store: store.clone(),
                demo_options: DemoOptions::default(),
            };
            let app: Arc<dyn UiApp> = Arc::new(app);
            let context = build_app_context(&app);

            // Some dev setups default tao windows to always-on-top.
            let desktop_cfg = DesktopConfig::new().with_window(
                WindowBuilder::new()
                    .with_title("Watch & Reveal")
                    .with_always_on_top(false),
            );

            LaunchBuilder::desktop()
                .with_cfg(desktop_cfg)
                .with_context(context)
                .launch(App);
        }
        Command::Simulate => {
            let local = tokio::task::LocalSet::new();
            let status = local
                .run_until(simulate(&parsed.environment, store.clone(), parsed.simulate))
                .await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    flush_store(&store, writer).await;
    Ok(())
}

/// Read the page configuration once, falling back to defaults.
fn simulation_config(
    env: &dyn EnvironmentReader,
) -> Result<(RevealConfigDraft, RevealConfig), Box<dyn std::error::Error>> {
    let resolved = resolve_config(env)?;
    if resolved.is_none() {
        tracing::info!("no configuration supplied, using defaults");
    }
    let draft = resolved.unwrap_or_else(RevealConfigDraft::new);
    let config = draft.clone().validate()?;
    Ok((draft, config))
}

/// Run one controller against the simulated player on real tokio timers.
///
/// Falls back to the default configuration when the environment has none.
/// Returns the final controller status as JSON.
async fn simulate(
    env: &dyn EnvironmentReader,
    store: Arc<dyn KeyValueStore>,
    args: SimulateArgs,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let (draft, config) = simulation_config(env)?;
    let document = Rc::new(build_landing_page(&config));
    let host = Rc::new(SimulatedPlayerHost::new());
    let player = Rc::new(SimulatedPlayer::new());
    let scheduler = Rc::new(TokioScheduler::new());

    if !args.no_player {
        let late_host = Rc::clone(&host);
        let late_player = Rc::clone(&player);
        scheduler.schedule(
            args.player_delay,
            Box::new(move || {
                late_host.load(Rc::clone(&late_player));
                late_player.play();
            }),
        );
    }

    let mut initializer = Initializer::new(Collaborators {
        player_host: host.clone(),
        document: document.clone(),
        store,
        scheduler: scheduler.clone(),
    });
    initializer.init(draft)?;
    let Some(controller) = initializer.mark_ready().into_iter().next() else {
        return Ok(serde_json::Value::Null);
    };

    let period = TIME_UPDATE_PERIOD;
    let started = tokio::time::Instant::now();
    let mut ticks = tokio::time::interval(period);
    while !controller.is_displayed() && started.elapsed() < args.timeout {
        ticks.tick().await;
        if host.first_player().is_some() {
            player.advance(period.mul_f64(args.speed));
        }
    }

    if controller.is_displayed() {
        // Let the delayed anchor scroll land before reporting.
        tokio::time::sleep(Duration::from_millis(400)).await;
    } else {
        tracing::warn!(timeout = ?args.timeout, "threshold not reached before timeout");
    }

    let status = controller.status();
    controller.destroy();
    tracing::info!(
        scrolls = document.scrolled_ids().len(),
        mutations = document.mutation_count(),
        "simulation finished"
    );
    Ok(serde_json::to_value(status)?)
}

async fn flush_store(store: &DurableStore, writer: DurableStoreWriter) {
    store.close();
    let written = writer.finished().await;
    tracing::debug!(written, "flag writer drained");
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

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // Printed once here; library crates only log.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
