use std::{
    io::Read,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use log::{info, warn};

use crate::{
    db::Database,
    parsing::{extract, extract_naive, ReconciledBatch},
    sensing::{ocr_image_file, CommandCapture, MonitorController, PollLoop},
    settings::{Region, SettingsStore},
    sync::{MemoryReminderStore, ReminderStore, ReminderSynchronizer},
    utils::init_logging,
};

const DATA_DIR_ENV: &str = "SUBWATCH_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "data";

#[derive(Parser, Debug)]
#[command(name = "subwatch")]
#[command(
    version,
    about = "Reads submarine return timers off the screen and keeps reminders for them",
    long_about = None
)]
pub struct Cli {
    /// Directory holding config.json, the reminder database and capture scratch files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch the configured screen region and sync reminders
    Run {
        /// Seconds between captures (overrides config; never below 10)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,

        /// Keep reminders in memory instead of the database
        #[arg(long)]
        dry_run: bool,
    },

    /// Save the screen region to capture
    Setup {
        #[arg(long)]
        x: u32,
        #[arg(long)]
        y: u32,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
    },

    /// OCR a still image and print the detected return times
    Import {
        /// Path to a png/jpg screenshot
        image: PathBuf,
    },

    /// Parse OCR text from a file (or stdin) and print the reconciled entries as JSON
    Parse {
        /// Text file; reads stdin when omitted or "-"
        input: Option<PathBuf>,

        /// Reference time, RFC 3339 or naive `YYYY-MM-DDTHH:MM:SS` (taken as UTC)
        #[arg(long)]
        now: Option<String>,
    },

    /// List reminders stored in the local database
    Reminders,
}

impl Cli {
    fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }
}

pub async fn execute(cli: Cli) -> Result<ExitCode> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;
    let data_dir = cli.data_dir();

    match cli.command {
        Commands::Run {
            interval,
            once,
            dry_run,
        } => run_monitor(&data_dir, interval, once, dry_run).await,
        Commands::Setup {
            x,
            y,
            width,
            height,
        } => {
            let store = settings_store(&data_dir)?;
            let region = Region {
                x,
                y,
                width,
                height,
            };
            store.update_region(region)?;
            info!("Region saved: {region}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Import { image } => import_image(&data_dir, &image).await,
        Commands::Parse { input, now } => parse_text(input.as_deref(), now.as_deref()),
        Commands::Reminders => list_reminders(&data_dir).await,
    }
}

fn settings_store(data_dir: &Path) -> Result<SettingsStore> {
    SettingsStore::new(data_dir.join("config.json"))
}

fn database_path(data_dir: &Path) -> PathBuf {
    data_dir.join("subwatch.sqlite3")
}

async fn run_monitor(
    data_dir: &Path,
    interval: Option<u64>,
    once: bool,
    dry_run: bool,
) -> Result<ExitCode> {
    let store = settings_store(data_dir)?;
    let settings = store.snapshot();
    let region = settings.validate_for_monitoring()?;

    let reminders: Arc<dyn ReminderStore> = if dry_run {
        info!("Dry run: reminders are kept in memory only");
        Arc::new(MemoryReminderStore::new())
    } else {
        Arc::new(Database::new(database_path(data_dir))?)
    };

    let source = Arc::new(CommandCapture::new(&settings, data_dir.join("captures")));
    let mut controller = MonitorController::new();
    let mut poll_loop = PollLoop::new(
        source,
        ReminderSynchronizer::new(reminders),
        settings.reminder.clone(),
        region,
        controller.mailbox(),
    );

    if once {
        let report = poll_loop.run_cycle(None).await?;
        println!(
            "detected {} entries, synced {}, unchanged {}",
            report.detected,
            report.synced.len(),
            report.unchanged
        );
        return Ok(ExitCode::SUCCESS);
    }

    controller.start(poll_loop, interval.unwrap_or(settings.capture_interval_secs))?;
    wait_for_shutdown(&controller, &store).await?;

    let stats = controller.stop().await?;
    info!(
        "Stopped after {} cycles ({} failed, {} reminders synced)",
        stats.cycles, stats.failed_cycles, stats.reminders_synced
    );
    Ok(ExitCode::SUCCESS)
}

/// Blocks until Ctrl-C. On unix, SIGHUP reloads config.json and recalibrates the region.
async fn wait_for_shutdown(controller: &MonitorController, store: &SettingsStore) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup = signal(SignalKind::hangup()).context("failed to listen for SIGHUP")?;
        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    return result.context("failed to listen for Ctrl-C");
                }
                _ = hangup.recv() => {
                    if let Err(err) = store.reload() {
                        warn!("Config reload failed: {err:?}");
                        continue;
                    }
                    match store.snapshot().region {
                        Some(region) => controller.publish_region(region),
                        None => warn!("Reloaded config has no region; keeping the current one"),
                    }
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = (controller, store);
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")
    }
}

async fn import_image(data_dir: &Path, image: &Path) -> Result<ExitCode> {
    if !image.exists() {
        eprintln!("File not found: {}", image.display());
        return Ok(ExitCode::from(2));
    }

    let settings = settings_store(data_dir)?.snapshot();
    let text = ocr_image_file(image, &settings.ocr).await?;
    let batch = extract(&text, None);
    if batch.is_empty() {
        println!("No submarines detected.");
        return Ok(ExitCode::from(1));
    }

    for line in format_batch(&batch) {
        println!("{line}");
    }
    Ok(ExitCode::SUCCESS)
}

fn parse_text(input: Option<&Path>, now: Option<&str>) -> Result<ExitCode> {
    let text = match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        _ => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            buffer
        }
    };

    let batch = match now {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(aware) => extract(&text, Some(aware.with_timezone(&Utc))),
            Err(_) => {
                let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                    .with_context(|| format!("unrecognised --now value {raw}"))?;
                extract_naive(&text, naive)
            }
        },
        None => extract(&text, None),
    };

    println!("{}", serde_json::to_string_pretty(&batch)?);
    Ok(ExitCode::SUCCESS)
}

async fn list_reminders(data_dir: &Path) -> Result<ExitCode> {
    let db = Database::new(database_path(data_dir))?;
    let reminders = db.list_reminders().await?;
    if reminders.is_empty() {
        println!("No reminders stored.");
        return Ok(ExitCode::SUCCESS);
    }

    for reminder in reminders {
        println!(
            "{}  {}  {} (alert {} min before, id={})",
            reminder
                .record
                .start
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M"),
            reminder.record.external_key,
            reminder.record.title,
            reminder.record.reminder_offset_minutes,
            reminder.id
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub fn format_batch(batch: &ReconciledBatch) -> Vec<String> {
    batch
        .iter()
        .map(|eta| {
            format!(
                "{}: {} min -> {}",
                eta.name,
                eta.remaining_minutes,
                eta.eta.with_timezone(&Local).to_rfc3339()
            )
        })
        .collect()
}
