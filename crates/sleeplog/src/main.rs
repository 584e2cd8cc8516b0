//! sleeplog - track sleep sessions from the command line
//!
//! Wires together:
//! - Configuration loading
//! - Logging
//! - The sleep store (load, mutate, subscribe)

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sleeplog_api::{EndOutcome, LoadOutcome, Record, SleepStatistics, Snapshot};
use sleeplog_config::{load_config_or_default, validate_log_level, Settings, ValidationError};
use sleeplog_store::{DataDirProvider, SleepStore};
use sleeplog_util::{
    default_config_path, format_duration, format_local, now, parse_timestamp, to_std_duration,
    RecordId,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// sleeplog - keep a history of when you slept
#[derive(Parser, Debug)]
#[command(name = "sleeplog")]
#[command(about = "Track sleep sessions and keep a history of them", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/sleeplog/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set SLEEPLOG_DATA_DIR env var)
    #[arg(short, long, env = "SLEEPLOG_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (overrides the config file; RUST_LOG wins over both)
    #[arg(short, long, value_parser = parse_log_level)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Cmd,
}

/// Timestamps accept RFC 3339, local "YYYY-MM-DD HH:MM", or "now".
#[derive(Subcommand, Debug)]
enum Cmd {
    /// Start a sleep session
    Start {
        #[arg(long, value_parser = parse_timestamp)]
        at: Option<DateTime<Utc>>,
    },

    /// End the running sleep session and record it
    End {
        #[arg(long, value_parser = parse_timestamp)]
        at: Option<DateTime<Utc>>,
    },

    /// Record a sleep that was not timed
    Add {
        #[arg(long, value_parser = parse_timestamp)]
        start: DateTime<Utc>,

        #[arg(long, value_parser = parse_timestamp)]
        end: DateTime<Utc>,

        #[arg(long, default_value = "")]
        note: String,
    },

    /// Change an existing record
    Edit {
        id: RecordId,

        #[arg(long, value_parser = parse_timestamp)]
        start: Option<DateTime<Utc>>,

        #[arg(long, value_parser = parse_timestamp)]
        end: Option<DateTime<Utc>>,

        #[arg(long)]
        note: Option<String>,
    },

    /// Delete a record
    Delete { id: RecordId },

    /// List all records, newest first
    List,

    /// Show one record
    Show { id: RecordId },

    /// Show average and most recent sleep durations
    Stats,

    /// Print every change to the records until interrupted
    Watch,
}

struct App {
    store: SleepStore,
    settings: Settings,
}

impl App {
    async fn open(settings: Settings) -> Result<Self> {
        let data_dir = settings.storage.data_dir.clone();
        let provider = DataDirProvider::new(&data_dir);
        let store = SleepStore::spawn(Arc::new(provider), settings.storage.file_name.clone());

        let outcome = store.load_from_disk().await.with_context(|| {
            format!(
                "Failed to load {:?}",
                data_dir.join(&settings.storage.file_name)
            )
        })?;

        match &outcome {
            LoadOutcome::Created => {
                info!(data_dir = %data_dir.display(), "Created a new sleep log");
            }
            LoadOutcome::Loaded { records, dropped } => {
                debug!(records, "Sleep log loaded");
                if !dropped.is_empty() {
                    warn!(
                        count = dropped.len(),
                        "Some stored records end before they start and were ignored"
                    );
                }
            }
        }

        Ok(Self { store, settings })
    }

    async fn run(&self, command: Cmd) -> Result<()> {
        match command {
            Cmd::Start { at } => {
                let at = at.unwrap_or_else(now);
                self.store.start_sleep(at).await?;
                println!("Sleep started at {}", format_local(&at));
            }

            Cmd::End { at } => match self.store.end_sleep(at.unwrap_or_else(now)).await? {
                EndOutcome::Ended(record) => {
                    println!(
                        "Slept {} ({} - {})",
                        format_duration(to_std_duration(record.duration())),
                        format_local(&record.start_date),
                        format_local(&record.end_date)
                    );
                    println!("Recorded as {}", record.id());
                }
                EndOutcome::NothingActive => {
                    println!("No sleep session is running");
                }
            },

            Cmd::Add { start, end, note } => {
                let record = self.store.create_record(start, end, note).await?;
                println!("Recorded as {}", record.id());
            }

            Cmd::Edit {
                id,
                start,
                end,
                note,
            } => {
                let Some(mut record) = self.store.record_by_id(id) else {
                    bail!("Record not found: {}", id);
                };
                if let Some(start) = start {
                    record.start_date = start;
                }
                if let Some(end) = end {
                    record.end_date = end;
                }
                if let Some(note) = note {
                    record.note = note;
                }

                let record = self.store.update_record(record).await?;
                print_record(&record);
            }

            Cmd::Delete { id } => {
                if self.store.delete_record(id).await? {
                    println!("Deleted {}", id);
                } else {
                    println!("No record with id {}", id);
                }
            }

            Cmd::List => {
                print_snapshot(&self.store.snapshot());
            }

            Cmd::Show { id } => {
                let Some(record) = self.store.record_by_id(id) else {
                    bail!("Record not found: {}", id);
                };
                print_record(&record);
            }

            Cmd::Stats => {
                let snapshot = self.store.snapshot();
                let window = self.settings.stats.recent_window_days;
                let stats = SleepStatistics::from_records(&snapshot.records, window, now());

                println!("Total sleeps:     {}", stats.total_sleeps);
                println!(
                    "Average ({:>2} d):  {}",
                    window,
                    format_duration(stats.average_duration)
                );
                match stats.most_recent_duration {
                    Some(d) => println!("Most recent:      {}", format_duration(d)),
                    None => println!("Most recent:      -"),
                }
            }

            Cmd::Watch => {
                let mut subscription = self.store.subscribe();
                info!(subscription_id = %subscription.id(), "Watching for changes");

                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            info!("Received Ctrl-C, stopping watch");
                            break;
                        }
                        next = subscription.recv() => {
                            let Some(snapshot) = next else { break };
                            println!("--- {} ---", format_local(&now()));
                            print_snapshot(&snapshot);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

fn print_snapshot(snapshot: &Snapshot) {
    match snapshot.active.started_at() {
        Some(started_at) => println!(
            "Sleeping since {} ({})",
            format_local(&started_at),
            format_duration(to_std_duration(now() - started_at))
        ),
        None => println!("Awake"),
    }

    if snapshot.records.is_empty() {
        println!("No records yet");
        return;
    }

    println!();
    println!(
        "{:<36}  {:<16}  {:<16}  {:>8}  NOTE",
        "ID", "START", "END", "DURATION"
    );
    for record in &snapshot.records {
        println!(
            "{:<36}  {:<16}  {:<16}  {:>8}  {}",
            record.id(),
            format_local(&record.start_date),
            format_local(&record.end_date),
            format_duration(to_std_duration(record.duration())),
            record.note
        );
    }
}

fn print_record(record: &Record) {
    println!("ID:       {}", record.id());
    println!("Start:    {}", format_local(&record.start_date));
    println!("End:      {}", format_local(&record.end_date));
    println!(
        "Duration: {}",
        format_duration(to_std_duration(record.duration()))
    );
    println!("Note:     {}", record.note);
    println!("Created:  {}", format_local(&record.created_at()));
    println!("Updated:  {}", format_local(&record.updated_at()));
}

fn parse_log_level(level: &str) -> Result<String, ValidationError> {
    validate_log_level(level)?;
    Ok(level.to_ascii_lowercase())
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = load_config_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    if let Some(data_dir) = &args.data_dir {
        settings.storage.data_dir = data_dir.clone();
    }
    if let Some(level) = &args.log_level {
        settings.logging.level = level.clone();
    }

    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(&args)?;

    // Initialize logging; stdout is reserved for command output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config_path = %args.config.display(),
        "sleeplog starting"
    );

    let app = App::open(settings).await?;
    let result = app.run(args.command).await;

    if let Err(e) = app.store.shutdown().await {
        warn!(error = %e, "Store did not shut down cleanly");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_flag_is_checked() {
        let args = Args::try_parse_from(["sleeplog", "--log-level", "DEBUG", "list"]).unwrap();
        assert_eq!(args.log_level.as_deref(), Some("debug"));

        assert!(Args::try_parse_from(["sleeplog", "--log-level", "loud", "list"]).is_err());
    }

    #[test]
    fn log_level_flag_is_optional() {
        let args = Args::try_parse_from(["sleeplog", "stats"]).unwrap();
        assert_eq!(args.log_level, None);
        assert!(matches!(args.command, Cmd::Stats));
    }
}
