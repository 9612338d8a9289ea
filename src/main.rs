//! # Project Pulse CLI (`pulse`)
//!
//! The `pulse` binary fetches GitHub Projects (v2) snapshots and renders
//! team metrics from them.
//!
//! ## Usage
//!
//! ```bash
//! pulse --config ./config/pulse.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pulse sync` | Fetch every project item and save a dated CSV snapshot |
//! | `pulse report` | Compute metrics from a snapshot and print the dashboard |
//! | `pulse status` | Show the configured project, token, and newest snapshot |
//!
//! ## Examples
//!
//! ```bash
//! # Fetch without writing anything
//! pulse sync --dry-run
//!
//! # Dashboard for the first quarter, as JSON
//! pulse report --since 2024-01-01 --until 2024-03-31 --format json
//!
//! # Report on a specific file, no config needed
//! pulse report --file ./shop_42_items_2024-05-01.csv
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use project_pulse::config::{self, Config};
use project_pulse::progress::ProgressMode;
use project_pulse::report::{self, ReportFormat};
use project_pulse::{ingest, logging, status};

/// Project Pulse: snapshot ingestion and team analytics for GitHub Projects.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/pulse.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "pulse",
    about = "Project Pulse: snapshot ingestion and team analytics for GitHub Projects",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pulse.toml")]
    config: PathBuf,

    /// Enable debug logging on stderr (overridden by PULSE_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Fetch all project items and save a snapshot.
    ///
    /// Resolves the project id, pages through every item, normalizes each
    /// one, and writes `{prefix}_{number}_items_{date}.csv` to the output
    /// directory. Any failure aborts the run without writing a file.
    Sync {
        /// Fetch and summarize without writing the snapshot.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr. Defaults to `human` on a terminal, `off` otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Compute metrics and print the dashboard.
    ///
    /// Uses the newest snapshot in the output directory unless `--file` is
    /// given. The date range filters items by creation date and defaults to
    /// the snapshot's full span.
    Report {
        /// Snapshot CSV to load instead of the newest one.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Only include items created on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Only include items created on or before this date (YYYY-MM-DD).
        #[arg(long)]
        until: Option<String>,

        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: ReportFormat,

        /// Number of labels to show in the ranking.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Show configuration and snapshot status.
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match cli.command {
        Commands::Sync { dry_run, progress } => {
            let cfg = config::load_config(&cli.config)?;
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_sync(&cfg, dry_run, mode)?;
        }
        Commands::Report {
            file,
            since,
            until,
            format,
            top,
        } => {
            // An explicit file does not need a config
            let cfg = if file.is_some() {
                config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal())
            } else {
                config::load_config(&cli.config)?
            };
            report::run_report(&cfg, file, since, until, format, top)?;
        }
        Commands::Status => {
            let cfg = config::load_config(&cli.config)?;
            status::run_status(&cfg)?;
        }
    }

    Ok(())
}
