//! Orchestrator: provisions and loads every table, one at a time.
//!
//! For each table, in registry order:
//!
//! 1. the snapshot file must exist, otherwise the run aborts before any schema work
//! 2. [`super::provision::ensure_schema`]
//! 3. [`super::gate::check`]; a table that already holds rows is skipped
//! 4. [`super::sanitize::clean`] then [`super::bulk::load`] (only when the gate says load)
//! 5. [`super::maintenance::analyze`], whose failure is reported but not fatal
//!
//! Any other failure aborts the run immediately; tables after the failing one are left
//! untouched and tables before it stay loaded. Re-running resumes at table granularity
//! because loaded tables are skipped by the gate.

use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{PipelineError, PipelineResult};
use crate::registry::TableRegistry;
use crate::store::Store;
use crate::types::{LoadOutcome, LoadStatus, RunReport, TableSpec};

use super::gate::GateDecision;
use super::metrics::PipelineMetrics;
use super::observability::{PipelineEvent, PipelineObserver, PipelineSeverity, TableContext};
use super::sanitize::DEFAULT_CLEANED_SUFFIX;
use super::{bulk, gate, maintenance, provision, sanitize};

/// Options controlling a pipeline run.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct PipelineOptions {
    /// Directory holding one snapshot file per table.
    pub data_root: PathBuf,
    /// If `Some`, only these tables are processed (still in registry order).
    pub tables: Option<Vec<String>>,
    /// Suffix of cleaned artifacts, appended to the table name.
    pub cleaned_suffix: String,
    /// Keep cleaned artifacts on disk after loading.
    pub keep_cleaned: bool,
    /// Do not run the post-load maintenance pass.
    pub skip_maintenance: bool,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn PipelineObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: PipelineSeverity,
}

impl fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("data_root", &self.data_root)
            .field("tables", &self.tables)
            .field("cleaned_suffix", &self.cleaned_suffix)
            .field("keep_cleaned", &self.keep_cleaned)
            .field("skip_maintenance", &self.skip_maintenance)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            tables: None,
            cleaned_suffix: DEFAULT_CLEANED_SUFFIX.to_string(),
            keep_cleaned: false,
            skip_maintenance: false,
            observer: None,
            alert_at_or_above: PipelineSeverity::Critical,
        }
    }
}

/// Sequential ingestion pipeline over a [`TableRegistry`].
pub struct Pipeline<'r> {
    registry: &'r TableRegistry,
    options: PipelineOptions,
    metrics: Arc<PipelineMetrics>,
}

impl<'r> Pipeline<'r> {
    pub fn new(registry: &'r TableRegistry, options: PipelineOptions) -> Self {
        Self {
            registry,
            options,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Get a handle to real-time run metrics.
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Snapshot file for `spec` under the configured data root.
    pub fn source_path(&self, spec: &TableSpec) -> PathBuf {
        self.options.data_root.join(spec.source_file)
    }

    /// Run the pipeline against `store`.
    ///
    /// When an observer is configured, every stage reports progress through
    /// [`PipelineObserver::on_event`]; the failure that aborts the run is reported through
    /// `on_failure` (and `on_alert` at or above `options.alert_at_or_above`), followed by a
    /// [`PipelineEvent::RunAborted`], before it is returned. Metrics record the elapsed time
    /// either way.
    pub fn run<S: Store + ?Sized>(&self, store: &mut S) -> PipelineResult<RunReport> {
        let start = Instant::now();
        let specs = match &self.options.tables {
            Some(tables) => self.registry.select(tables)?,
            None => self.registry.tables().collect(),
        };

        self.metrics.begin_run();
        self.emit(PipelineEvent::RunStarted {
            tables: specs.len(),
        });

        let mut outcomes = Vec::with_capacity(specs.len());
        for spec in specs {
            let ctx = TableContext {
                table: spec.name.to_string(),
                source: self.source_path(spec),
            };
            match self.process_table(store, spec, &ctx) {
                Ok(outcome) => {
                    self.emit(PipelineEvent::TableFinished {
                        outcome: outcome.clone(),
                    });
                    outcomes.push(outcome);
                }
                Err(e) => {
                    self.report(&ctx, severity_for_error(&e), &e);
                    let elapsed = start.elapsed();
                    self.metrics.end_run(elapsed);
                    self.emit(PipelineEvent::RunAborted {
                        table: ctx.table,
                        elapsed,
                        metrics: self.metrics.snapshot(),
                    });
                    return Err(e);
                }
            }
        }

        let elapsed = start.elapsed();
        self.metrics.end_run(elapsed);
        self.emit(PipelineEvent::RunFinished {
            elapsed,
            metrics: self.metrics.snapshot(),
        });

        Ok(RunReport { outcomes, elapsed })
    }

    fn process_table<S: Store + ?Sized>(
        &self,
        store: &mut S,
        spec: &TableSpec,
        ctx: &TableContext,
    ) -> PipelineResult<LoadOutcome> {
        let table = spec.name.to_string();
        self.emit(PipelineEvent::TableStarted {
            table: table.clone(),
        });

        ensure_input(spec, &ctx.source)?;

        provision::ensure_schema(store, spec)?;
        self.emit(PipelineEvent::SchemaEnsured {
            table: table.clone(),
            indexes: spec.indexes.len(),
        });

        let (status, rows_loaded, rows_dropped) = match gate::check(store, spec)? {
            GateDecision::Skip { existing_rows } => {
                self.metrics.on_table_skipped();
                self.emit(PipelineEvent::LoadSkipped {
                    table: table.clone(),
                    existing_rows,
                });
                (LoadStatus::Skipped, 0, 0)
            }
            GateDecision::Load => {
                let mut artifact = sanitize::clean(&ctx.source, spec, &self.options.cleaned_suffix)?;
                if self.options.keep_cleaned {
                    artifact.retain();
                }
                let stats = artifact.stats().clone();
                self.metrics.on_rows_dropped(stats.rows_dropped);
                self.emit(PipelineEvent::Sanitized {
                    table: table.clone(),
                    stats: stats.clone(),
                });

                let rows = bulk::load(store, spec, artifact.path())?;
                self.metrics.on_copy(rows);
                self.emit(PipelineEvent::Loaded {
                    table: table.clone(),
                    rows,
                });
                if rows != stats.rows_kept {
                    self.emit(PipelineEvent::RowCountMismatch {
                        table: table.clone(),
                        cleaned_rows: stats.rows_kept,
                        loaded_rows: rows,
                    });
                }
                (LoadStatus::Loaded, rows, stats.rows_dropped)
            }
        };

        let maintained = self.maintain(store, spec, ctx);
        self.metrics.on_table_processed();

        Ok(LoadOutcome {
            table,
            rows_loaded,
            status,
            rows_dropped,
            maintained,
        })
    }

    fn maintain<S: Store + ?Sized>(&self, store: &mut S, spec: &TableSpec, ctx: &TableContext) -> bool {
        if self.options.skip_maintenance {
            return false;
        }
        match maintenance::analyze(store, spec) {
            Ok(()) => {
                self.emit(PipelineEvent::Maintained {
                    table: spec.name.to_string(),
                });
                true
            }
            Err(e) => {
                self.metrics.on_maintenance_failure();
                self.report(ctx, PipelineSeverity::Warning, &e);
                false
            }
        }
    }

    fn report(&self, ctx: &TableContext, severity: PipelineSeverity, error: &PipelineError) {
        if let Some(obs) = self.options.observer.as_ref() {
            obs.on_failure(ctx, severity, error);
            if severity >= self.options.alert_at_or_above {
                obs.on_alert(ctx, severity, error);
            }
        }
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(obs) = &self.options.observer {
            obs.on_event(&event);
        }
    }
}

fn ensure_input(spec: &TableSpec, source: &Path) -> PipelineResult<()> {
    if source.is_file() {
        Ok(())
    } else {
        Err(PipelineError::MissingInput {
            table: spec.name.to_string(),
            path: source.to_path_buf(),
        })
    }
}

fn severity_for_error(e: &PipelineError) -> PipelineSeverity {
    match e {
        PipelineError::Io(_) | PipelineError::MissingInput { .. } => PipelineSeverity::Critical,
        PipelineError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => PipelineSeverity::Critical,
            _ => PipelineSeverity::Error,
        },
        PipelineError::Database(err) => match err {
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                PipelineSeverity::Critical
            }
            // Driver errors frequently wrap a socket failure further down the chain.
            other if error_chain_contains_io(other) => PipelineSeverity::Critical,
            _ => PipelineSeverity::Error,
        },
        PipelineError::Configuration { .. } | PipelineError::Store { .. } => PipelineSeverity::Error,
    }
}

fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}
