//! tablesync command-line task
//!
//! Synchronizes every support table declared in a manifest, in dependency
//! order, and prints how many rows each entity type created or updated.
//!
//! Usage:
//!   tablesync --manifest config/tablesync.toml --database app.db
//!
//! Rows are only ever created or updated, never deleted.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tablesync_cli::{EntitySummary, RunSummary, build_registry, database_path};
use tablesync_db::Database;
use tablesync_model::Manifest;
use tablesync_sync::{Orchestrator, Synchronizer};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "tablesync")]
#[command(about = "Synchronize support tables from their canonical data files")]
struct Args {
    /// Manifest declaring entity types and their data sources
    #[arg(short, long, default_value = "tablesync.toml")]
    manifest: PathBuf,

    /// SQLite database file (overrides the manifest setting)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Base directory for relative data sources (overrides the manifest setting)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Entity type to include even if it has no data sources (repeatable)
    #[arg(short, long = "entity")]
    entities: Vec<String>,

    /// Print only the order entity types would be synchronized in
    #[arg(long)]
    plan: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let manifest = Manifest::load(&args.manifest)
        .with_context(|| format!("failed to load manifest {}", args.manifest.display()))?;
    let registry = build_registry(&manifest, args.data_dir.clone())
        .context("invalid entity registration")?;
    info!(
        "Loaded {} entity types from {}",
        registry.len(),
        args.manifest.display()
    );

    let db_path = database_path(&manifest, args.database.clone())
        .context("no database given; pass --database or set settings.database")?;
    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    let orchestrator = Orchestrator::new(Synchronizer::new(db, Arc::new(registry)));

    if args.plan {
        for entity in orchestrator.plan(&args.entities)? {
            println!("{entity}");
        }
        return Ok(());
    }

    let mut summary = RunSummary::default();
    orchestrator
        .sync_all_with_progress(&args.entities, |entity, changes, elapsed| {
            let entry = EntitySummary::new(entity, changes, elapsed);
            if !args.json {
                println!("{entry}");
            }
            summary.push(entry);
        })
        .context("support table sync failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "\n{} entity types: {} created, {} updated in {} ms",
            summary.entities.len(),
            summary.created(),
            summary.updated(),
            summary.elapsed_ms()
        );
    }
    Ok(())
}
