//! `metadata-ingest`: run a batch of metadata ingestion jobs from a JSON job file.
//!
//! Snapshots are written as JSON lines to `--output` (or stdout). Logs and the batch summary
//! go to stderr. The exit code is 0 only when every job succeeded.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{debug, error, info};

use metadata_ingest::catalog::{CatalogCache, CatalogEmitter, JsonLinesCatalog};
use metadata_ingest::config::{DEFAULT_ENV, SinkDescriptor, load_jobs};
use metadata_ingest::ingestion::TracingObserver;
use metadata_ingest::logging::{LogConfig, init_logging};
use metadata_ingest::orchestrator::{Orchestrator, OrchestratorOptions};

#[derive(Parser)]
#[command(
    name = "metadata-ingest",
    version,
    about = "Ingest dataset schemas from files, databases and object stores into a metadata catalog"
)]
struct Cli {
    /// Enable verbose (DEBUG level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable TRACE level logging output.
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON objects.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every job in a job file.
    Ingest {
        /// Job file: one JSON job object or an array of them.
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Timestamp partition templates are resolved against (RFC 3339 or YYYY-MM-DD, UTC).
        #[arg(long, value_name = "TIMESTAMP", env = "INGEST_RUN_TIMESTAMP", value_parser = parse_run_timestamp)]
        run_timestamp: Option<DateTime<Utc>>,

        /// Target environment for snapshots without a per-job `env`.
        #[arg(long, value_name = "ENV", env = "INGEST_ENV", default_value = DEFAULT_ENV)]
        env: String,

        /// Append JSON-lines snapshots to this file instead of stdout.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&LogConfig::from_flags(cli.verbose, cli.debug, cli.json_logs)) {
        eprintln!("warning: {e:#}");
    }

    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(true)` when every job succeeded.
fn run(command: Commands) -> Result<bool> {
    match command {
        Commands::Ingest {
            config,
            run_timestamp,
            env,
            output,
        } => {
            let jobs = load_jobs(&config)
                .with_context(|| format!("failed to load jobs from {}", config.display()))?;
            info!(jobs = jobs.len(), config = %config.display(), "loaded job file");

            let emitter: Arc<dyn CatalogEmitter> = match &output {
                Some(path) => Arc::new(
                    JsonLinesCatalog::append_to(path)
                        .with_context(|| format!("failed to open output {}", path.display()))?,
                ),
                None => Arc::new(JsonLinesCatalog::stdout()),
            };

            let alert_at_or_above = OrchestratorOptions::default().alert_at_or_above;
            let options = OrchestratorOptions {
                run_timestamp,
                observer: Some(Arc::new(TracingObserver::new(alert_at_or_above))),
                alert_at_or_above,
            };
            debug!(?options, "starting batch");
            let orchestrator = Orchestrator::new(CatalogCache::shared(emitter)).with_options(options);

            match orchestrator.run_batch(&jobs, &SinkDescriptor::new(env)) {
                Ok(report) => {
                    eprint!("{report}");
                    Ok(report.all_succeeded())
                }
                Err(e) => {
                    if let Some(report) = e.batch_report() {
                        eprint!("{report}");
                    }
                    Err(e.into())
                }
            }
        }
    }
}

fn parse_run_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| anyhow!("expected an RFC 3339 timestamp or YYYY-MM-DD, got '{raw}'"))?;
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| anyhow!("invalid date '{raw}'"))
}
