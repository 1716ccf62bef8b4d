use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jobdedup_core::load_jobs_from_path;
use jobdedup_engine::{DedupConfig, DedupEngine, DedupPipeline, InMemoryJobStore};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "jobdedup-cli")]
#[command(about = "Deduplicate and reconcile scraped job listing batches")]
struct Cli {
    /// YAML file overriding the default dedup settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print unique listings and duplicate lineage for a batch.
    Find { batch: PathBuf },
    /// Print similarity groups for a batch.
    Group {
        batch: PathBuf,
        #[arg(long, default_value_t = 0.75)]
        threshold: f64,
    },
    /// Merge a batch and drop listings already present in a history file.
    Reconcile {
        batch: PathBuf,
        #[arg(long)]
        history: PathBuf,
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

fn load_config(path: Option<&Path>) -> Result<DedupConfig> {
    match path {
        Some(path) => DedupConfig::from_path(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(DedupConfig::default()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("serializing output")?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Find { batch } => {
            let engine = DedupEngine::new(config)?;
            let jobs = load_jobs_from_path(&batch)?;
            print_json(&engine.find_duplicates(&jobs))?;
        }
        Commands::Group { batch, threshold } => {
            let engine = DedupEngine::new(config)?;
            let jobs = load_jobs_from_path(&batch)?;
            print_json(&engine.group_similar_jobs(&jobs, threshold)?)?;
        }
        Commands::Reconcile {
            batch,
            history,
            concurrency,
        } => {
            if let Some(concurrency) = concurrency {
                config.lookup_concurrency = concurrency;
            }
            let engine = DedupEngine::new(config)?;
            let jobs = load_jobs_from_path(&batch)?;
            let store = InMemoryJobStore::from_path(&history)?;
            if store.is_empty() {
                warn!(history = %history.display(), "history file has no listings");
            }
            info!(
                batch = jobs.len(),
                history = store.len(),
                concurrency = engine.config().lookup_concurrency,
                "reconciling batch against history"
            );

            let cancel = Arc::new(AtomicBool::new(false));
            let flag = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received; finishing current lookups");
                    flag.store(true, Ordering::SeqCst);
                }
            });

            let pipeline = DedupPipeline::new(engine, store);
            let outcome = pipeline.run(&jobs, Some(cancel.as_ref())).await;
            print_json(&outcome)?;
        }
    }

    Ok(())
}
