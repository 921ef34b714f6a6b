//! rollcall - record attendance offline and sync it when the server is back.
//!
//! Every roll call is queued on disk first; `sync` and `watch` drain the
//! queue against the attendance API.

mod app;

use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use rollcall_core::{
    Collection, Config, DataSource, Loaded, LocalId, NetworkStatus, ReadQuery, RecordError, RollCallEntry,
};

const USAGE: &str = "\
Usage: rollcall <command>

Commands:
  status                                       Queue length and cache ages
  sync                                         Submit queued attendance now
  record <session-id> <student-id>=<present|absent>...
                                               Record a roll call
  requeue <local-id>                           Retry a record that needs attention
  watch                                        Sync automatically whenever the server comes back
  fetch <sessions|students|fields|reports|dashboard>
                                               Load a collection, falling back to the cache";

/// Log file name prefix inside `<data dir>/logs`
const LOG_FILE_PREFIX: &str = "rollcall.log";

#[derive(Debug, PartialEq)]
enum Command {
    Status,
    Sync,
    Record {
        session_id: String,
        entries: Vec<RollCallEntry>,
    },
    Requeue(LocalId),
    Watch,
    Fetch(Collection),
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            bail!("{}", USAGE);
        };
        let command = match (name.as_str(), rest) {
            ("status", []) => Command::Status,
            ("sync", []) => Command::Sync,
            ("watch", []) => Command::Watch,
            ("requeue", [id]) => Command::Requeue(LocalId::from(id.as_str())),
            ("fetch", [collection]) => Command::Fetch(
                Collection::from_name(collection)
                    .with_context(|| format!("Unknown collection '{}'", collection))?,
            ),
            ("record", [session_id, marks @ ..]) if !marks.is_empty() => Command::Record {
                session_id: session_id.clone(),
                entries: marks.iter().map(|m| parse_mark(m)).collect::<Result<_>>()?,
            },
            _ => bail!("{}", USAGE),
        };
        Ok(command)
    }
}

/// `<student-id>=<present|absent>`; a bare student id is left unmarked
fn parse_mark(mark: &str) -> Result<RollCallEntry> {
    let Some((student_id, value)) = mark.split_once('=') else {
        return Ok(RollCallEntry::new(mark, None));
    };
    let is_present = match value.to_ascii_lowercase().as_str() {
        "present" | "p" | "yes" => true,
        "absent" | "a" | "no" => false,
        other => bail!("Invalid mark '{}' for {}: expected present or absent", other, student_id),
    };
    Ok(RollCallEntry::new(student_id, Some(is_present)))
}

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). Output goes to stderr and
/// to a daily log file under the data directory.
fn init_tracing(log_dir: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::fs::create_dir_all(log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    let _log_guard = init_tracing(&config.data_dir()?.join("logs"));
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }
    info!(command = ?command, "rollcall starting");

    let app = App::new(config)?;
    match command {
        Command::Status => status(&app),
        Command::Sync => sync(&app).await,
        Command::Record { session_id, entries } => record(&app, &session_id, &entries).await,
        Command::Requeue(id) => requeue(&app, &id).await,
        Command::Watch => watch(&app).await,
        Command::Fetch(collection) => fetch(&app, collection).await,
    }
}

fn status(app: &App) -> Result<()> {
    let records = app.queue().list_unsynced()?;
    let parked = records.iter().filter(|r| r.needs_attention).count();

    println!("Server:           {}", app.config.api_base_url);
    println!("Queued records:   {}", records.len());
    println!("Need attention:   {}", parked);
    for record in records.iter().filter(|r| r.needs_attention) {
        println!(
            "  {}  session {} student {}  ({} attempts, last error: {})",
            record.local_id,
            record.session_id,
            record.student_id,
            record.attempts,
            record.last_error.as_deref().unwrap_or("none")
        );
    }

    let ages = app.store.get_cache_ages();
    println!("Cached data (last updated {}):", ages.last_updated());
    for (name, age) in ages.entries() {
        println!("  {:<10} {}", name, age.unwrap_or("never"));
    }
    Ok(())
}

async fn sync(app: &App) -> Result<()> {
    let summary = app.engine.flush().await;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!("{}", summary.message());
    Ok(())
}

async fn record(app: &App, session_id: &str, entries: &[RollCallEntry]) -> Result<()> {
    app.probe().await;
    let outcome = match app.recorder.record_roll_call(session_id, entries).await {
        Ok(outcome) => outcome,
        Err(RecordError::NothingToSubmit) => bail!("{}", RecordError::NothingToSubmit),
        Err(e) => return Err(e).context("Failed to save attendance"),
    };
    println!("{}", outcome.message());

    // Absentee list for calling parents, when the roster is available
    let Some(sessions) = app.loader.sessions().await.into_data() else {
        return Ok(());
    };
    if let Some(session) = sessions.iter().find(|s| s.id == session_id) {
        let absentees = rollcall_core::AttendanceRecorder::absentees(session, entries);
        if !absentees.is_empty() {
            println!(
                "\n{} absent from {} ({}):",
                absentees.len(),
                session.course_title,
                session.time_slot()
            );
            for absentee in &absentees {
                println!(
                    "\n--- {} ({} {}) ---",
                    absentee.student_name, absentee.parent_name, absentee.parent_phone
                );
                println!("{}", absentee.notification_message(session));
            }
        }
    }
    Ok(())
}

async fn requeue(app: &App, id: &LocalId) -> Result<()> {
    app.queue()
        .requeue(id)
        .with_context(|| format!("Cannot requeue {}", id))?;
    println!("Record {} will be retried on the next sync.", id);
    if app.monitor.status() != NetworkStatus::Offline {
        sync(app).await?;
    }
    Ok(())
}

async fn watch(app: &App) -> Result<()> {
    let auto_sync = app.monitor.spawn_auto_sync(app.engine.clone(), app.config.debounce());
    let mut interval = tokio::time::interval(app.config.probe_interval());
    println!("Watching {} (Ctrl-C to stop)", app.config.api_base_url);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = interval.tick() => {
                if app.probe().await {
                    println!("Server is {:?}", app.monitor.status());
                }
            }
        }
    }

    auto_sync.abort();
    let remaining = app.queue().len().unwrap_or_default();
    println!("Stopped. {} record(s) still queued.", remaining);
    Ok(())
}

async fn fetch(app: &App, collection: Collection) -> Result<()> {
    let query = ReadQuery::new(collection);
    let (source, line, count) = match collection {
        Collection::Sessions => describe(app.loader.load::<Vec<rollcall_core::models::Session>>(query).await),
        Collection::Students => describe(app.loader.load::<Vec<rollcall_core::models::Student>>(query).await),
        Collection::Fields => describe(app.loader.load::<Vec<rollcall_core::models::Field>>(query).await),
        Collection::Reports => {
            let filters = rollcall_core::models::ReportFilters::today();
            describe(app.loader.absentee_report(&filters).await)
        }
        Collection::DashboardStats => {
            let loaded = app.loader.dashboard().await;
            let count = loaded.data().map(|_| 1);
            (loaded.source(), loaded.describe(), count)
        }
    };

    println!("{}: {}", collection.name(), line);
    match count {
        Some(n) => println!("{} item(s)", n),
        None => println!("No data available."),
    }
    if source == DataSource::Unavailable {
        bail!("{} unavailable", collection.name());
    }
    Ok(())
}

fn describe<T>(loaded: Loaded<Vec<T>>) -> (DataSource, String, Option<usize>) {
    (loaded.source(), loaded.describe(), loaded.data().map(Vec::len))
}
