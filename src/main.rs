use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use imdb_snapshot_loader::ingestion::{
    CompositeObserver, DEFAULT_CLEANED_SUFFIX, FileObserver, Pipeline, PipelineObserver, PipelineOptions,
    ProgressObserver, TracingObserver,
};
use imdb_snapshot_loader::registry::TableRegistry;
use imdb_snapshot_loader::store::{MemoryStore, PostgresStore};
use imdb_snapshot_loader::types::RunReport;

#[derive(Debug, Parser)]
#[command(name = "imdb-snapshot-loader", version)]
#[command(about = "Provision IMDb tables in PostgreSQL and bulk-load their TSV snapshots")]
struct Args {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", required_unless_present = "dry_run")]
    database_url: Option<String>,

    /// Directory holding one `<table>.tsv` snapshot per table
    #[arg(long, env = "IMDB_DATA_ROOT", default_value = "data")]
    data_root: PathBuf,

    /// Only process this table (repeatable, or comma-separated). Defaults to every table.
    #[arg(long = "table", value_name = "NAME", env = "IMDB_TABLES", value_delimiter = ',')]
    tables: Vec<String>,

    /// Suffix of the cleaned artifact written beside each snapshot
    #[arg(long, env = "IMDB_CLEANED_SUFFIX", default_value = DEFAULT_CLEANED_SUFFIX)]
    cleaned_suffix: String,

    /// Keep cleaned artifacts after loading
    #[arg(long, env = "IMDB_KEEP_CLEANED")]
    keep_cleaned: bool,

    /// Skip the post-load VACUUM ANALYZE pass
    #[arg(long, env = "IMDB_SKIP_MAINTENANCE")]
    skip_maintenance: bool,

    /// Append pipeline events to this file as JSON lines
    #[arg(long, value_name = "PATH", env = "IMDB_EVENT_LOG")]
    event_log: Option<PathBuf>,

    /// Run against an in-memory store instead of PostgreSQL
    #[arg(long, env = "IMDB_DRY_RUN")]
    dry_run: bool,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let registry = TableRegistry::imdb();

    let mut observers: Vec<Arc<dyn PipelineObserver>> = vec![Arc::new(TracingObserver)];
    observers.push(Arc::new(ProgressObserver::stdout()));
    if let Some(path) = &args.event_log {
        observers.push(Arc::new(FileObserver::new(path)));
    }

    let options = PipelineOptions {
        data_root: args.data_root.clone(),
        tables: (!args.tables.is_empty()).then(|| args.tables.clone()),
        cleaned_suffix: args.cleaned_suffix.clone(),
        keep_cleaned: args.keep_cleaned,
        skip_maintenance: args.skip_maintenance,
        observer: Some(Arc::new(CompositeObserver::new(observers))),
        ..Default::default()
    };
    info!(?options, dry_run = args.dry_run, "starting import");
    let pipeline = Pipeline::new(&registry, options);

    let report = if args.dry_run {
        let mut store = MemoryStore::new();
        pipeline.run(&mut store)?
    } else {
        let url = args
            .database_url
            .as_deref()
            .context("DATABASE_URL is required unless --dry-run is set")?;
        let mut store = PostgresStore::connect(url).context("failed to connect to PostgreSQL")?;
        let result = pipeline.run(&mut store);
        let closed = store.close();
        let report = result?;
        closed.context("failed to close the PostgreSQL connection")?;
        report
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    println!(
        "✅ All tables loaded successfully! ({} loaded, {} skipped, {} rows in {:.1?})",
        report.tables_loaded(),
        report.tables_skipped(),
        report.rows_loaded(),
        report.elapsed
    );
}
