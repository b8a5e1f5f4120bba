use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::PipelineError;
use crate::types::{LoadOutcome, LoadStatus};

use super::metrics::PipelineMetricsSnapshot;
use super::sanitize::SanitizeStats;

/// Severity classification used for failure callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineSeverity {
    /// Informational event.
    Info,
    /// Non-fatal problem (for example a failed maintenance pass).
    Warning,
    /// The run was aborted by a store or configuration error.
    Error,
    /// The run was aborted by an I/O, missing-input or connectivity failure.
    Critical,
}

/// The table a failure relates to.
#[derive(Debug, Clone)]
pub struct TableContext {
    pub table: String,
    /// Snapshot file for the table.
    pub source: PathBuf,
}

/// Progress events emitted by the pipeline, in order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunStarted { tables: usize },
    TableStarted { table: String },
    SchemaEnsured { table: String, indexes: usize },
    LoadSkipped { table: String, existing_rows: u64 },
    Sanitized { table: String, stats: SanitizeStats },
    Loaded { table: String, rows: u64 },
    /// The store ingested a different number of rows than the cleaned artifact holds.
    RowCountMismatch { table: String, cleaned_rows: u64, loaded_rows: u64 },
    Maintained { table: String },
    TableFinished { outcome: LoadOutcome },
    RunFinished {
        elapsed: Duration,
        metrics: PipelineMetricsSnapshot,
    },
    /// The run stopped at `table`; later tables were not processed.
    RunAborted {
        table: String,
        elapsed: Duration,
        metrics: PipelineMetricsSnapshot,
    },
}

/// Observer interface for pipeline progress and failures.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait PipelineObserver: Send + Sync {
    /// Called for every progress event.
    fn on_event(&self, _event: &PipelineEvent) {}

    /// Called when a stage fails, fatally or not.
    fn on_failure(&self, _ctx: &TableContext, _severity: PipelineSeverity, _error: &PipelineError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &TableContext, severity: PipelineSeverity, error: &PipelineError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_event(&self, event: &PipelineEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }

    fn on_failure(&self, ctx: &TableContext, severity: PipelineSeverity, error: &PipelineError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &TableContext, severity: PipelineSeverity, error: &PipelineError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Emits pipeline events as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RunStarted { tables } => info!(tables, "pipeline started"),
            PipelineEvent::TableStarted { table } => debug!(%table, "processing table"),
            PipelineEvent::SchemaEnsured { table, indexes } => {
                debug!(%table, indexes, "schema ensured")
            }
            PipelineEvent::LoadSkipped { table, existing_rows } => {
                info!(%table, existing_rows, "table already has data, skipping load")
            }
            PipelineEvent::Sanitized { table, stats } => {
                if stats.rows_dropped > 0 {
                    warn!(
                        %table,
                        kept = stats.rows_kept,
                        dropped = stats.rows_dropped,
                        first_dropped_lines = ?stats.dropped_lines,
                        "dropped malformed rows"
                    );
                } else {
                    debug!(%table, kept = stats.rows_kept, "snapshot sanitized");
                }
            }
            PipelineEvent::Loaded { table, rows } => info!(%table, rows, "table loaded"),
            PipelineEvent::RowCountMismatch {
                table,
                cleaned_rows,
                loaded_rows,
            } => warn!(%table, cleaned_rows, loaded_rows, "store row count differs from cleaned artifact"),
            PipelineEvent::Maintained { table } => debug!(%table, "vacuum analyze finished"),
            PipelineEvent::TableFinished { outcome } => debug!(
                table = %outcome.table,
                status = ?outcome.status,
                rows = outcome.rows_loaded,
                "table finished"
            ),
            PipelineEvent::RunFinished { elapsed, metrics } => {
                info!(elapsed = ?elapsed, %metrics, "pipeline finished")
            }
            PipelineEvent::RunAborted {
                table,
                elapsed,
                metrics,
            } => error!(%table, elapsed = ?elapsed, %metrics, "pipeline aborted"),
        }
    }

    fn on_failure(&self, ctx: &TableContext, severity: PipelineSeverity, error: &PipelineError) {
        match severity {
            PipelineSeverity::Info => info!(table = %ctx.table, %error, "stage reported"),
            PipelineSeverity::Warning => warn!(table = %ctx.table, %error, "non-fatal stage failure"),
            PipelineSeverity::Error | PipelineSeverity::Critical => error!(
                table = %ctx.table,
                source = %ctx.source.display(),
                ?severity,
                %error,
                "stage failed"
            ),
        }
    }

    fn on_alert(&self, ctx: &TableContext, severity: PipelineSeverity, error: &PipelineError) {
        error!(
            alert = true,
            table = %ctx.table,
            source = %ctx.source.display(),
            ?severity,
            %error,
            "pipeline alert"
        );
    }
}

/// Writes one human-readable line per finished table as soon as it finishes.
///
/// Tables completed before an aborting failure are therefore still reported.
pub struct ProgressObserver<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> ProgressObserver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl ProgressObserver<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W> fmt::Debug for ProgressObserver<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressObserver").finish_non_exhaustive()
    }
}

impl<W: Write + Send> PipelineObserver for ProgressObserver<W> {
    fn on_event(&self, event: &PipelineEvent) {
        let PipelineEvent::TableFinished { outcome } = event else {
            return;
        };
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        let _ = match outcome.status {
            LoadStatus::Loaded => writeln!(
                out,
                "✅ Loaded {} ({} rows, {} dropped)",
                outcome.table, outcome.rows_loaded, outcome.rows_dropped
            ),
            LoadStatus::Skipped => writeln!(out, "Table {} already has data.", outcome.table),
        };
        let _ = out.flush();
    }
}

/// Appends pipeline events to a local file as JSON lines.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append(&self, value: serde_json::Value) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{value}");
        }
    }

    fn failure_line(kind: &str, ctx: &TableContext, severity: PipelineSeverity, error: &PipelineError) -> serde_json::Value {
        serde_json::json!({
            "ts": unix_ts(),
            "event": kind,
            "severity": severity,
            "table": ctx.table,
            "source": ctx.source.display().to_string(),
            "error": error.to_string(),
        })
    }
}

impl PipelineObserver for FileObserver {
    fn on_event(&self, event: &PipelineEvent) {
        let Ok(mut value) = serde_json::to_value(event) else {
            return;
        };
        if let Some(obj) = value.as_object_mut() {
            obj.insert("ts".to_string(), unix_ts().into());
        }
        self.append(value);
    }

    fn on_failure(&self, ctx: &TableContext, severity: PipelineSeverity, error: &PipelineError) {
        self.append(Self::failure_line("failure", ctx, severity, error));
    }

    fn on_alert(&self, ctx: &TableContext, severity: PipelineSeverity, error: &PipelineError) {
        self.append(Self::failure_line("alert", ctx, severity, error));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
