use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Real-time counters for a pipeline run.
///
/// The pipeline updates these as it goes; callers can snapshot them at any time.
pub struct PipelineMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    tables_processed: AtomicU64,
    tables_loaded: AtomicU64,
    tables_skipped: AtomicU64,
    rows_loaded: AtomicU64,
    rows_dropped: AtomicU64,
    copies: AtomicU64,
    maintenance_failures: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
            tables_processed: AtomicU64::new(0),
            tables_loaded: AtomicU64::new(0),
            tables_skipped: AtomicU64::new(0),
            rows_loaded: AtomicU64::new(0),
            rows_dropped: AtomicU64::new(0),
            copies: AtomicU64::new(0),
            maintenance_failures: AtomicU64::new(0),
        }
    }

    pub fn begin_run(&self) {
        let _ = self.run_id.fetch_add(1, Ordering::SeqCst);

        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.tables_processed.store(0, Ordering::SeqCst);
        self.tables_loaded.store(0, Ordering::SeqCst);
        self.tables_skipped.store(0, Ordering::SeqCst);
        self.rows_loaded.store(0, Ordering::SeqCst);
        self.rows_dropped.store(0, Ordering::SeqCst);
        self.copies.store(0, Ordering::SeqCst);
        self.maintenance_failures.store(0, Ordering::SeqCst);
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns
            .store(elapsed.as_nanos().min(u64::MAX as u128) as u64, Ordering::SeqCst);
    }

    pub fn on_table_processed(&self) {
        let _ = self.tables_processed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_table_skipped(&self) {
        let _ = self.tables_skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_rows_dropped(&self, n: u64) {
        let _ = self.rows_dropped.fetch_add(n, Ordering::SeqCst);
    }

    /// A bulk copy finished with `rows` ingested.
    pub fn on_copy(&self, rows: u64) {
        let _ = self.copies.fetch_add(1, Ordering::SeqCst);
        let _ = self.tables_loaded.fetch_add(1, Ordering::SeqCst);
        let _ = self.rows_loaded.fetch_add(rows, Ordering::SeqCst);
    }

    pub fn on_maintenance_failure(&self) {
        let _ = self.maintenance_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> PipelineMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = if elapsed_ns > 0 {
            Some(Duration::from_nanos(elapsed_ns))
        } else {
            None
        };

        PipelineMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed,
            tables_processed: self.tables_processed.load(Ordering::SeqCst),
            tables_loaded: self.tables_loaded.load(Ordering::SeqCst),
            tables_skipped: self.tables_skipped.load(Ordering::SeqCst),
            rows_loaded: self.rows_loaded.load(Ordering::SeqCst),
            rows_dropped: self.rows_dropped.load(Ordering::SeqCst),
            copies: self.copies.load(Ordering::SeqCst),
            maintenance_failures: self.maintenance_failures.load(Ordering::SeqCst),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PipelineMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PipelineMetrics").field(&self.snapshot()).finish()
    }
}

/// Immutable snapshot of [`PipelineMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub tables_processed: u64,
    pub tables_loaded: u64,
    pub tables_skipped: u64,
    pub rows_loaded: u64,
    pub rows_dropped: u64,
    pub copies: u64,
    pub maintenance_failures: u64,
}

impl fmt::Display for PipelineMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, tables={} (loaded={}, skipped={}), rows_loaded={}, rows_dropped={}, copies={}, maintenance_failures={}, elapsed={:?}",
            self.run_id,
            self.tables_processed,
            self.tables_loaded,
            self.tables_skipped,
            self.rows_loaded,
            self.rows_dropped,
            self.copies,
            self.maintenance_failures,
            self.elapsed
        )
    }
}
