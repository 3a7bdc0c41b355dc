//! Chronopart CLI
//!
//! Thin caller around the library: loads a YAML configuration, picks the
//! operating mode from flags, runs once and exits. Exit status: 0 on a clean
//! run (precondition skips included), 1 when any table failed or the
//! configuration is unusable, 2 when the database connection could not be
//! established.

use chronopart::{Mode, MySqlCatalog, RunConfig, RunOutput, Runner};
use clap::Parser;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chronopart")]
#[command(about = "Time-range partition maintenance for clock-keyed tables", version)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "/etc/chronopart/chronopart.yaml")]
    config: PathBuf,

    /// Initialize partitioning, scanning each table for its oldest row
    #[arg(long, conflicts_with_all = ["init_fast", "discovery", "stats"])]
    init: bool,

    /// Initialize partitioning from the retention window with an archive
    /// partition, skipping the table scan
    #[arg(long, conflicts_with_all = ["discovery", "stats"])]
    init_fast: bool,

    /// Plan and log statements without executing any DDL
    #[arg(long)]
    dry_run: bool,

    /// Emit the configured table/period pairs as JSON and exit
    #[arg(long, conflicts_with = "stats")]
    discovery: bool,

    /// Emit statistics for one configured table as JSON and exit
    #[arg(long, value_name = "TABLE")]
    stats: Option<String>,

    /// Approve initial conversions without prompting
    #[arg(short = 'y', long)]
    yes: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so the discovery/stats JSON on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    match run(&cli) {
        Ok(clean) => {
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(err) => {
            error!(error = %err, "run failed");
            match err.downcast_ref::<chronopart::Error>() {
                Some(inner) if inner.is_fatal() => ExitCode::from(2),
                _ => ExitCode::from(1),
            }
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<bool> {
    let text = fs::read_to_string(&cli.config)
        .map_err(|err| anyhow::anyhow!("cannot read {}: {err}", cli.config.display()))?;
    let config: RunConfig = serde_yaml::from_str(&text)?;
    config.validate()?;

    let mode = if cli.discovery {
        Mode::Discovery
    } else if let Some(table) = &cli.stats {
        Mode::Stats(table.clone())
    } else if cli.init_fast {
        Mode::InitFast
    } else if cli.init {
        Mode::InitScan
    } else {
        Mode::Maintain
    };

    if cli.dry_run {
        info!("dry-run: no DDL will be executed");
    }

    let mut catalog = MySqlCatalog::connect(&config.database, config.replicate_ddl, cli.dry_run)?;
    let now = chrono::Utc::now().naive_utc();

    let auto_approve = cli.yes || !io::stdin().is_terminal();
    let mut confirm = |table: &str| auto_approve || prompt_approval(table);

    let output = Runner::new(&config, &mut catalog).run(&mode, now, &mut confirm)?;
    match output {
        RunOutput::Discovery(entries) => {
            println!("{}", serde_json::to_string(&entries)?);
            Ok(true)
        }
        RunOutput::Stats(stats) => {
            println!("{}", serde_json::to_string(&stats)?);
            Ok(true)
        }
        RunOutput::Summary(summary) => Ok(!summary.has_failures()),
    }
}

fn prompt_approval(table: &str) -> bool {
    eprint!("Convert `{table}` to a partitioned table? [y/N]: ");
    let _ = io::stderr().flush();
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
