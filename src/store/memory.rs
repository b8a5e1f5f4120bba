//! In-process store used for dry runs and tests.

use std::collections::{BTreeMap, HashSet};
use std::io::Read;

use crate::error::{PipelineError, PipelineResult};
use crate::types::BulkFormat;

use super::{CopyRequest, Ddl, Store};

/// A table held by [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTable {
    /// Column names in declaration order.
    pub columns: Vec<String>,
    /// Row-major values; `None` is NULL.
    pub rows: Vec<Vec<Option<String>>>,
}

/// [`Store`] that keeps tables in memory.
///
/// It mirrors the behavior the pipeline relies on from PostgreSQL:
///
/// - `CREATE ... IF NOT EXISTS` is idempotent and never alters an existing table
/// - a COPY is all-or-nothing; a record whose field count differs from the column list fails
///   the whole copy, as does copying into a missing table
/// - fields equal to the format's NULL token are stored as NULL
///
/// Text-format backslash escapes are not decoded; values are kept as raw field text.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, MemoryTable>,
    indexes: BTreeMap<String, String>,
    ddl_log: Vec<String>,
    copies: usize,
    maintenance_runs: usize,
    fail_maintenance: bool,
    fail_copy: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every maintenance call fail.
    pub fn with_failing_maintenance(mut self) -> Self {
        self.fail_maintenance = true;
        self
    }

    /// Make copies into `table` fail.
    pub fn fail_copy_for(mut self, table: impl Into<String>) -> Self {
        self.fail_copy.insert(table.into());
        self
    }

    pub fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.get(name)
    }

    /// Row count of `name`, or `None` if the table does not exist.
    pub fn row_count(&self, name: &str) -> Option<usize> {
        self.tables.get(name).map(|t| t.rows.len())
    }

    /// Names of indexes created on `table`.
    pub fn indexes_on(&self, table: &str) -> Vec<&str> {
        self.indexes
            .iter()
            .filter(|(_, t)| t.as_str() == table)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Every DDL statement executed so far, in order.
    pub fn ddl_statements(&self) -> &[String] {
        &self.ddl_log
    }

    /// Number of bulk copies that completed successfully.
    pub fn copies_performed(&self) -> usize {
        self.copies
    }

    /// Number of maintenance calls that succeeded.
    pub fn maintenance_runs(&self) -> usize {
        self.maintenance_runs
    }

    /// Append raw rows to an existing table, bypassing COPY.
    pub fn insert_rows(&mut self, table: &str, rows: Vec<Vec<Option<String>>>) -> PipelineResult<()> {
        let t = self.table_mut(table)?;
        if let Some(bad) = rows.iter().find(|r| r.len() != t.columns.len()) {
            return Err(PipelineError::store(
                table,
                format!("row has {} values, table has {} columns", bad.len(), t.columns.len()),
            ));
        }
        t.rows.extend(rows);
        Ok(())
    }

    /// Remove all rows from `table`.
    pub fn truncate(&mut self, table: &str) -> PipelineResult<()> {
        self.table_mut(table)?.rows.clear();
        Ok(())
    }

    fn table_mut(&mut self, table: &str) -> PipelineResult<&mut MemoryTable> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| PipelineError::store(table, "relation does not exist"))
    }
}

impl Store for MemoryStore {
    fn execute_ddl(&mut self, ddl: &Ddl<'_>) -> PipelineResult<()> {
        match ddl {
            Ddl::CreateTable(spec) => {
                self.tables
                    .entry(spec.name.to_string())
                    .or_insert_with(|| MemoryTable {
                        columns: spec.column_names().map(str::to_string).collect(),
                        rows: Vec::new(),
                    });
            }
            Ddl::CreateIndex { table, index } => {
                if !self.tables.contains_key(table.name) {
                    return Err(PipelineError::store(table.name, "relation does not exist"));
                }
                self.indexes
                    .entry(index.name.to_string())
                    .or_insert_with(|| table.name.to_string());
            }
        }
        self.ddl_log.push(ddl.to_sql());
        Ok(())
    }

    fn count_rows(&mut self, table: &str) -> PipelineResult<u64> {
        self.row_count(table)
            .map(|n| n as u64)
            .ok_or_else(|| PipelineError::store(table, "relation does not exist"))
    }

    fn bulk_copy(&mut self, request: &CopyRequest<'_>, source: &mut dyn Read) -> PipelineResult<u64> {
        if self.fail_copy.contains(request.table) {
            return Err(PipelineError::store(request.table, "copy failed (injected)"));
        }
        let columns = &self.table_mut(request.table)?.columns;
        if columns.iter().map(String::as_str).ne(request.columns.iter().copied()) {
            return Err(PipelineError::store(
                request.table,
                format!("copy column list {:?} does not match table columns {columns:?}", request.columns),
            ));
        }

        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(request.format.delimiter());
        match request.format {
            BulkFormat::Strict { quote, .. } => {
                builder.quote(quote);
            }
            BulkFormat::Permissive { .. } => {
                builder.quoting(false);
            }
        }
        let null = request.format.null_token();

        let mut staged = Vec::new();
        for record in builder.from_reader(source).byte_records() {
            let record = record?;
            if record.len() != request.columns.len() {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                return Err(PipelineError::store(
                    request.table,
                    format!(
                        "line {line}: expected {} fields, found {}",
                        request.columns.len(),
                        record.len()
                    ),
                ));
            }
            staged.push(
                record
                    .iter()
                    .map(|raw| {
                        let value = String::from_utf8_lossy(raw);
                        (value != null).then(|| value.into_owned())
                    })
                    .collect::<Vec<_>>(),
            );
        }

        let loaded = staged.len() as u64;
        self.table_mut(request.table)?.rows.extend(staged);
        self.copies += 1;
        Ok(loaded)
    }

    fn execute_maintenance(&mut self, table: &str) -> PipelineResult<()> {
        self.table_mut(table)?;
        if self.fail_maintenance {
            return Err(PipelineError::store(table, "maintenance failed (injected)"));
        }
        self.maintenance_runs += 1;
        Ok(())
    }
}
