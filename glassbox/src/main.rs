//! Main entry point for the glassbox binary
//!
//! Wires the production adapters through `GlassboxBuilder` and prints every
//! result as pretty JSON on stdout. Logs go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use glassbox::{ConfigArgs, ExecuteRequest, Glassbox, ScenarioRequest, SummaryRequest};
use shared::{logging, LevelSelection, QueryKind, TelemetryQuery};

/// Run end-to-end tests and collect correlated browser and backend telemetry
#[derive(Parser)]
#[command(name = "glassbox")]
#[command(about = "Runs a test command and collects correlated browser and backend telemetry")]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GLASSBOX_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Shell command that runs the tests
    #[arg(long = "command")]
    pub entry_command: String,

    /// Containers whose logs are collected (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub containers: Vec<String>,

    /// Override the response body budget for this run
    #[arg(long)]
    pub truncate_body_chars: Option<usize>,

    /// Override the summary log levels for this run (comma separated)
    #[arg(long)]
    pub levels: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run once and print the full telemetry
    Execute {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Run once, print a summary and optionally query the stored run
    Summary {
        #[command(flatten)]
        run: RunArgs,

        /// Use this run id instead of a generated one
        #[arg(long)]
        run_id: Option<String>,

        /// Query evaluated against the stored run
        #[arg(long)]
        query: Option<QueryKind>,

        /// Status filter for `network_by_status`
        #[arg(long)]
        status: Option<u16>,

        /// URL filter for `network_request_full`
        #[arg(long)]
        request_url: Option<String>,

        /// Level selection for `backend_logs` (`full` or comma separated)
        #[arg(long)]
        query_levels: Option<LevelSelection>,
    },
    /// Run with a fresh trace id and trace recording
    Scenario {
        #[command(flatten)]
        run: RunArgs,

        /// Restore the savepoint after the run
        #[arg(long)]
        restore_savepoint_after: bool,

        #[arg(long)]
        savepoint_name: Option<String>,

        /// Also print the trace correlation of the run
        #[arg(long)]
        inspect: bool,

        /// Also print the DOM snapshot nearest this offset
        #[arg(long)]
        snapshot_at_ms: Option<u64>,
    },
    /// Manage container savepoints
    Savepoint {
        #[command(subcommand)]
        action: SavepointAction,
    },
    /// Print the DOM snapshot of a trace archive nearest an offset
    Snapshot {
        trace_path: PathBuf,
        offset_ms: u64,
    },
}

#[derive(Subcommand)]
pub enum SavepointAction {
    Create { name: String },
    Restore { name: String },
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logging::init_tracing(Some(&args.log_level));

    let config = args.config.into_config().context("invalid configuration")?;
    let engine = Glassbox::builder(config).build();
    logging::log_startup(&format!("glassbox ({:?})", engine.capabilities()));

    match run(&engine, args.command).await {
        Ok(()) => Ok(()),
        Err(e) => {
            logging::log_error("glassbox", &e);
            Err(e)
        }
    }
}

async fn run(engine: &Glassbox, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Execute { run } => {
            let report = engine
                .execute_with_telemetry(ExecuteRequest {
                    entry_command: run.entry_command,
                    target_containers: run.containers,
                })
                .await?;
            print_json(&report)
        }
        Commands::Summary {
            run,
            run_id,
            query,
            status,
            request_url,
            query_levels,
        } => {
            let report = engine
                .run_and_summarize(SummaryRequest {
                    entry_command: run.entry_command,
                    target_containers: run.containers,
                    run_id: run_id.map(Into::into),
                    correlation_id: None,
                    trace_path: None,
                    truncate_body_chars: run.truncate_body_chars,
                    backend_log_levels: run.levels.as_deref().map(LevelSelection::parse_levels),
                })
                .await?;

            match query {
                None => print_json(&report),
                Some(kind) => {
                    let mut telemetry_query = TelemetryQuery::new(kind);
                    telemetry_query.status = status;
                    telemetry_query.request_url = request_url;
                    telemetry_query.truncate_body_chars = run.truncate_body_chars;
                    telemetry_query.backend_log_levels = query_levels;
                    let data = engine.query_telemetry(&report.run_id, &telemetry_query)?;
                    print_json(&json!({ "run_id": report.run_id, "summary": report.summary, "query": data }))
                }
            }
        }
        Commands::Scenario {
            run,
            restore_savepoint_after,
            savepoint_name,
            inspect,
            snapshot_at_ms,
        } => {
            let report = engine
                .run_deterministic_scenario(ScenarioRequest {
                    entry_command: run.entry_command,
                    target_containers: run.containers,
                    restore_savepoint_after,
                    savepoint_name,
                    truncate_body_chars: run.truncate_body_chars,
                    backend_log_levels: run.levels.as_deref().map(LevelSelection::parse_levels),
                })
                .await?;

            if !inspect && snapshot_at_ms.is_none() {
                return print_json(&report);
            }
            let correlation = if inspect {
                Some(engine.inspect_trace_correlation(&report.run_id, &report.trace_id)?)
            } else {
                None
            };
            let dom_snapshot = match snapshot_at_ms {
                Some(offset) => Some(engine.dom_snapshot_at(&report.run_id, offset).await?),
                None => None,
            };
            print_json(&json!({ "scenario": report, "correlation": correlation, "dom_snapshot": dom_snapshot }))
        }
        Commands::Savepoint { action } => match action {
            SavepointAction::Create { name } => print_json(&json!({ "message": engine.create_savepoint(&name).await? })),
            SavepointAction::Restore { name } => {
                print_json(&json!({ "message": engine.restore_savepoint(&name).await? }))
            }
            SavepointAction::List => print_json(&json!({ "savepoints": engine.list_savepoints().await? })),
        },
        Commands::Snapshot { trace_path, offset_ms } => {
            let snapshot = engine.snapshot_from_trace(trace_path, offset_ms).await?;
            print_json(&json!({ "offset_ms": offset_ms, "snapshot": snapshot }))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
