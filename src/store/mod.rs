//! Store interface consumed by the pipeline.
//!
//! The pipeline only ever talks to the relational store through [`Store`]:
//!
//! - [`Store::execute_ddl`]: idempotent schema commands ([`Ddl`])
//! - [`Store::count_rows`]: the load gate's row count
//! - [`Store::bulk_copy`]: streaming bulk ingestion ([`CopyRequest`])
//! - [`Store::execute_maintenance`]: post-load statistics refresh / space reclaim
//!
//! Two implementations ship with the crate: [`postgres::PostgresStore`] and the in-process
//! [`memory::MemoryStore`] used for dry runs and tests.

pub mod memory;
pub mod postgres;

use std::io::Read;

use crate::error::PipelineResult;
use crate::types::{BulkFormat, IndexDef, TableSpec};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// A relational store holding one connection for the duration of a run.
///
/// All calls block until the store has finished the operation.
pub trait Store {
    /// Execute one schema-definition command.
    fn execute_ddl(&mut self, ddl: &Ddl<'_>) -> PipelineResult<()>;

    /// Number of rows currently in `table`.
    fn count_rows(&mut self, table: &str) -> PipelineResult<u64>;

    /// Stream delimited records from `source` into the table described by `request`.
    ///
    /// Returns the number of rows the store reports as ingested.
    fn bulk_copy(&mut self, request: &CopyRequest<'_>, source: &mut dyn Read) -> PipelineResult<u64>;

    /// Refresh planner statistics and reclaim space for `table`.
    fn execute_maintenance(&mut self, table: &str) -> PipelineResult<()>;
}

/// Idempotent schema-definition command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ddl<'a> {
    /// `CREATE TABLE IF NOT EXISTS` for the spec's columns and primary key.
    CreateTable(&'a TableSpec),
    /// `CREATE INDEX IF NOT EXISTS` for one of the spec's indexes.
    CreateIndex {
        table: &'a TableSpec,
        index: &'a IndexDef,
    },
}

impl Ddl<'_> {
    /// Name of the table the command targets.
    pub fn table(&self) -> &'static str {
        match self {
            Self::CreateTable(spec) | Self::CreateIndex { table: spec, .. } => spec.name,
        }
    }

    /// Render the SQL statement.
    pub fn to_sql(&self) -> String {
        match self {
            Self::CreateTable(spec) => {
                let mut defs = spec
                    .columns
                    .iter()
                    .map(|c| format!("{} {}", c.name, c.column_type.sql()))
                    .collect::<Vec<_>>();
                if let Some(pk) = spec.primary_key {
                    defs.push(format!("PRIMARY KEY ({pk})"));
                }
                format!(
                    "CREATE TABLE IF NOT EXISTS {} ({})",
                    spec.name,
                    defs.join(", ")
                )
            }
            Self::CreateIndex { table, index } => format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({}{})",
                index.name,
                table.name,
                index.column,
                if index.descending { " DESC" } else { "" }
            ),
        }
    }
}

/// Parameters for one bulk copy: target table, column order and encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest<'a> {
    pub table: &'a str,
    pub columns: Vec<&'a str>,
    pub format: BulkFormat,
}

impl<'a> CopyRequest<'a> {
    pub fn for_spec(spec: &'a TableSpec) -> Self {
        Self {
            table: spec.name,
            columns: spec.column_names().collect(),
            format: spec.format,
        }
    }

    /// Render the `COPY ... FROM STDIN` statement.
    ///
    /// The header option is always off: snapshot headers are stripped before copying.
    pub fn to_sql(&self) -> String {
        let options = match self.format {
            BulkFormat::Strict {
                delimiter,
                quote,
                null,
            } => format!(
                "FORMAT csv, DELIMITER {}, NULL {}, HEADER false, QUOTE {}",
                escape_literal(&char::from(delimiter).to_string()),
                escape_literal(null),
                escape_literal(&char::from(quote).to_string()),
            ),
            BulkFormat::Permissive { delimiter, null } => format!(
                "FORMAT text, DELIMITER {}, NULL {}",
                escape_literal(&char::from(delimiter).to_string()),
                escape_literal(null),
            ),
        };
        format!(
            "COPY {} ({}) FROM STDIN WITH ({options})",
            self.table,
            self.columns.join(", ")
        )
    }
}

/// Render `value` as a PostgreSQL escape-string literal (`E'...'`).
///
/// Escape syntax is interpreted the same way whatever `standard_conforming_strings` is set to.
pub(crate) fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 3);
    out.push_str("E'");
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
