//! Command line surface and the settings derived from it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dayring_core::{default_log_level, LoggingConfig, TriggerConfig, DEFAULT_RESYNC_INTERVAL};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "dayring")]
#[command(version, about = "Publish today's ringing schedule for the bedside device")]
pub struct Cli {
    /// SQLite database shared with the device
    #[arg(long, global = true, env = "DAYRING_DB", default_value = "dayring.db")]
    pub db: PathBuf,

    /// trace|debug|info|warn|error (defaults to debug in debug builds)
    #[arg(long, global = true, env = "DAYRING_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Directory for rolling log files (defaults to `logs/` next to the database)
    #[arg(long, global = true, env = "DAYRING_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Periodic resync interval, e.g. "5m" or "30s"
    #[arg(long, global = true, env = "DAYRING_INTERVAL", value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resync periodically until Ctrl-C
    Run {
        /// Wait one interval before the first resync
        #[arg(long)]
        no_initial_resync: bool,
    },
    /// Resync once and print the number of published entries
    Resync,
    /// Print the published schedule and its status as JSON
    Schedule,
    /// Add a recurring event
    AddNormal {
        title: String,

        /// Ring time (HH:MM)
        #[arg(short, long)]
        time: String,

        /// Weekdays, as a comma list ("monday,friday") or JSON array
        #[arg(short, long)]
        frequency: String,

        /// Passed through to the device unchanged
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        delay: i64,

        #[arg(long, default_value = "default")]
        tone: String,

        /// Store the event as inactive
        #[arg(long)]
        inactive: bool,
    },
    /// Add a one-off event
    AddSpecial {
        description: String,

        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Ring time (HH:MM)
        #[arg(short, long)]
        time: String,

        #[arg(long, default_value = "default")]
        tone: String,
    },
    /// Change fields of a recurring event; omitted fields keep their value
    UpdateNormal {
        id: i64,

        #[arg(long)]
        title: Option<String>,

        /// Ring time (HH:MM)
        #[arg(short, long)]
        time: Option<String>,

        /// Weekdays, as a comma list or JSON array
        #[arg(short, long)]
        frequency: Option<String>,

        #[arg(short, long, allow_negative_numbers = true)]
        delay: Option<i64>,

        #[arg(long)]
        tone: Option<String>,

        /// Turn the alarm on (`true`) or off (`false`)
        #[arg(long)]
        active: Option<bool>,
    },
    /// Remove a recurring event
    DeleteNormal { id: i64 },
    /// Mark a one-off event as done
    CompleteSpecial { id: i64 },
    /// Remove a one-off event
    DeleteSpecial { id: i64 },
    /// Print every stored event as JSON
    List,
}

impl Cli {
    pub fn logging_config(&self, mirror_to_stderr: bool) -> Result<LoggingConfig> {
        let log_dir = match &self.log_dir {
            Some(dir) => absolute(dir)?,
            None => {
                let db = absolute(&self.db)?;
                db.parent()
                    .map(|parent| parent.join("logs"))
                    .context("database path has no parent directory")?
            }
        };
        Ok(LoggingConfig {
            level: self
                .log_level
                .clone()
                .unwrap_or_else(|| default_log_level().to_string()),
            log_dir,
            mirror_to_stderr,
        })
    }

    pub fn trigger_config(&self, run_on_start: bool) -> TriggerConfig {
        TriggerConfig {
            interval: self.interval.unwrap_or(DEFAULT_RESYNC_INTERVAL),
            run_on_start,
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    Ok(cwd.join(path))
}
