// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use mgnrega_districts_core::ExitCode;
use mgnrega_districts_ingest::{backfill_ids, ingest_file};
use mgnrega_districts_store::SqliteStore;
use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;
use tracing_subscriber::EnvFilter;

const ENV_DB_PATH: &str = "MGNREGA_DB_PATH";
const ENV_LOG_LEVEL: &str = "MGNREGA_LOG_LEVEL";

#[derive(Parser)]
#[command(name = "mgnrega-districts")]
#[command(about = "MGNREGA district records operations CLI")]
struct Cli {
    /// SQLite database path; defaults to $MGNREGA_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upsert records from a JSON file (a single record or an array).
    Ingest {
        #[arg(long)]
        file: PathBuf,
    },
    /// Assign derived ids to legacy documents that predate the identity
    /// scheme. Conflicts are reported, never auto-resolved.
    Backfill,
}

fn resolve_db_path(cli: &Cli) -> PathBuf {
    cli.db
        .clone()
        .or_else(|| std::env::var(ENV_DB_PATH).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("data/mgnrega.db"))
}

async fn run(cli: Cli) -> Result<(), String> {
    let db_path = resolve_db_path(&cli);
    let store = SqliteStore::open(&db_path).map_err(|e| e.to_string())?;

    match cli.command {
        Commands::Ingest { file } => {
            let summary = ingest_file(&store, &file).await.map_err(|e| e.to_string())?;
            for id in &summary.ids {
                println!("upserted {id}");
            }
            println!("Ingested file {} ({} records)", file.display(), summary.ingested);
        }
        Commands::Backfill => {
            let report = backfill_ids(&store).await.map_err(|e| e.to_string())?;
            for conflict in &report.conflict_details {
                eprintln!(
                    "conflict: _id={} computed={}",
                    conflict.key, conflict.candidate_id
                );
            }
            println!(
                "Backfill complete. updated={} conflicts={}",
                report.updated, report.conflicts
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ProcessExitCode {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::Success.into(),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::Failure.into()
        }
    }
}
