//! tidewater - extract operational data into JSON files
//!
//! Exit codes:
//! - 0: run completed (individual tasks may have failed, see the log)
//! - 1: fatal startup error (configuration, connection, unknown task)
//! - 2: `--strict` was given and at least one task failed

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tidewater_core::catalog;
use tidewater_core::domain::VehicleId;
use tidewater_core::impls::JsonFilePersister;
use tidewater_core::observability::LogContext;
use tidewater_core::{Config, run_extraction};

const DEFAULT_CONFIG_FILE: &str = "tidewater.toml";

#[derive(Parser)]
#[command(name = "tidewater")]
#[command(about = "Extract vessel, incident and message data into JSON files", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML config file (defaults to ./tidewater.toml when it exists)
    #[arg(long, global = true, env = "TIDEWATER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the extraction tasks
    Run(RunArgs),

    /// List the registered tasks without connecting anywhere
    List(ScopeArgs),
}

#[derive(Args)]
struct ScopeArgs {
    /// Day of the lake partitions to extract (defaults to yesterday, UTC)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Vehicle for the lake tasks, e.g. 123 or V000123 (repeatable, replaces TIDEWATER_VEHICLES)
    #[arg(long = "vehicle")]
    vehicles: Vec<VehicleId>,
}

#[derive(Args)]
struct RunArgs {
    /// Task id or group to run (repeatable, defaults to all tasks)
    #[arg(long = "task")]
    tasks: Vec<String>,

    #[command(flatten)]
    scope: ScopeArgs,

    /// Directory for the JSON files (overrides TIDEWATER_OUTPUT_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Exit with status 2 when any task failed
    #[arg(long)]
    strict: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    summary_json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // .env は clap が TIDEWATER_CONFIG を読む前に読み込む
    let dotenv = dotenvy::dotenv();
    init_tracing();
    if let Some(e) = dotenv_failure(dotenv) {
        tracing::warn!(error = %e, "could not load .env");
    }

    let cli = Cli::parse();
    let config_file = resolve_config_file(cli.config);

    let result = match cli.command {
        Command::Run(args) => run(args, config_file.as_deref()).await,
        Command::List(scope) => list(scope, config_file.as_deref()),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            let message = format!("{e:#}");
            tracing::error!(error = %message, "tidewater failed");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

/// `.env` が無いのは正常。それ以外の失敗だけを返す
fn dotenv_failure<T>(result: Result<T, dotenvy::Error>) -> Option<dotenvy::Error> {
    match result {
        Ok(_) => None,
        Err(e) if e.not_found() => None,
        Err(e) => Some(e),
    }
}

fn resolve_config_file(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let default = Path::new(DEFAULT_CONFIG_FILE);
        default.exists().then(|| default.to_path_buf())
    })
}

fn load_config(file: Option<&Path>, scope: &ScopeArgs) -> Result<Config> {
    let mut config = Config::load(file, |key| std::env::var(key).ok()).context("loading configuration")?;
    if !scope.vehicles.is_empty() {
        config.lake.vehicles = scope.vehicles.clone();
    }
    Ok(config)
}

fn lake_date(scope: &ScopeArgs) -> NaiveDate {
    scope.date.unwrap_or_else(|| {
        let today = Utc::now().date_naive();
        today.pred_opt().unwrap_or(today)
    })
}

async fn run(args: RunArgs, config_file: Option<&Path>) -> Result<ExitCode> {
    let mut config = load_config(config_file, &args.scope)?;
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }

    let registry = catalog::default_registry(&config, lake_date(&args.scope))?
        .select(&args.tasks)
        .context("selecting tasks")?;

    let log = LogContext::new("extract");
    let sink = JsonFilePersister::new(&config.output_dir).with_log(log.child("persist"));
    let summary = run_extraction(&config, &registry, &sink, log).await?;

    if args.summary_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    if args.strict && summary.has_failures() {
        let failed = summary.counts().failed;
        tracing::warn!(failed, "strict mode: failing the run");
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

fn list(scope: ScopeArgs, config_file: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config_file, &scope)?;
    let registry = catalog::default_registry(&config, lake_date(&scope))?;
    for task in &registry {
        println!("{}\t{}\t{}\t{}", task.id(), task.group(), task.source(), task.output());
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dotenv_is_not_a_failure() {
        assert!(dotenv_failure(dotenvy::from_filename("tidewater-no-such-file.env")).is_none());
    }

    #[test]
    fn malformed_dotenv_is_reported() {
        let result = dotenvy::from_read("TIDEWATER_BROKEN LINE".as_bytes());
        assert!(matches!(dotenv_failure(result), Some(dotenvy::Error::LineParse(..))));
    }
}
