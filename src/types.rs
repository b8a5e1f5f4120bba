//! Core data model types for the loader.
//!
//! A [`TableSpec`] describes one target table: its columns, keys, indexes, and the
//! [`BulkFormat`] its snapshot file is copied with. Specs are immutable and `'static`; they
//! are collected in a [`crate::registry::TableRegistry`] once at startup.

use std::time::Duration;

use serde::Serialize;

/// Logical column type used when rendering `CREATE TABLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Free text (`TEXT`).
    Text,
    /// 32-bit integer (`INTEGER`).
    Integer,
    /// Double precision float (`FLOAT`).
    Float,
}

impl ColumnType {
    /// SQL type keyword.
    pub fn sql(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
        }
    }
}

/// A single named, typed column of a [`TableSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Column name, as written in DDL and in the COPY column list.
    pub name: &'static str,
    /// Column type.
    pub column_type: ColumnType,
}

impl Column {
    pub const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self { name, column_type }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub const fn float(name: &'static str) -> Self {
        Self::new(name, ColumnType::Float)
    }
}

/// A single-column secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDef {
    /// Index name (unique per database schema).
    pub name: &'static str,
    /// Indexed column.
    pub column: &'static str,
    /// Whether the index is built in descending order.
    pub descending: bool,
}

impl IndexDef {
    pub const fn new(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            descending: false,
        }
    }

    pub const fn descending(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            descending: true,
        }
    }
}

/// Encoding used by the store's bulk-copy mechanism for one table.
///
/// The two variants are mutually exclusive:
///
/// - [`BulkFormat::Strict`]: CSV framing with a distinguished quote byte. Choosing a quote
///   byte that never occurs in the data (backspace for IMDb) makes literal `"` characters in
///   free-text fields plain data.
/// - [`BulkFormat::Permissive`]: raw delimited text with an explicit NULL sentinel.
///
/// Neither variant asks the copy mechanism to skip a header; the sanitizer already removed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkFormat {
    Strict {
        delimiter: u8,
        quote: u8,
        null: &'static str,
    },
    Permissive {
        delimiter: u8,
        null: &'static str,
    },
}

impl BulkFormat {
    /// Tab-delimited CSV framing with backspace as the quote byte and `''` as NULL.
    pub const fn strict_tsv() -> Self {
        Self::Strict {
            delimiter: b'\t',
            quote: 0x08,
            null: "",
        }
    }

    /// Tab-delimited text framing with `\N` as NULL.
    pub const fn permissive_tsv() -> Self {
        Self::Permissive {
            delimiter: b'\t',
            null: "\\N",
        }
    }

    pub fn delimiter(&self) -> u8 {
        match *self {
            Self::Strict { delimiter, .. } | Self::Permissive { delimiter, .. } => delimiter,
        }
    }

    /// Raw field value the store interprets as NULL.
    pub fn null_token(&self) -> &'static str {
        match *self {
            Self::Strict { null, .. } | Self::Permissive { null, .. } => null,
        }
    }
}

/// Declarative description of one target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Table name.
    pub name: &'static str,
    /// Snapshot file name, relative to the configured data root.
    pub source_file: &'static str,
    /// Ordered columns. This is also the COPY column order.
    pub columns: &'static [Column],
    /// Optional single-column primary key.
    pub primary_key: Option<&'static str>,
    /// Secondary indexes created after the table.
    pub indexes: &'static [IndexDef],
    /// Raw field count a snapshot row must have to be kept.
    pub expected_column_count: usize,
    /// Bulk-copy encoding.
    pub format: BulkFormat,
}

impl TableSpec {
    /// Iterate column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    /// Returns `true` if `name` is a declared column.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

/// What happened to a table during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    /// The table was empty and its cleaned snapshot was copied in.
    Loaded,
    /// The table already held rows; no copy was attempted.
    Skipped,
}

/// Per-table result of one run. Produced once per table and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    pub table: String,
    /// Rows the store reported as ingested (0 when skipped).
    pub rows_loaded: u64,
    pub status: LoadStatus,
    /// Snapshot rows dropped by the sanitizer (0 when skipped).
    pub rows_dropped: u64,
    /// `false` if the post-load maintenance pass failed or was skipped.
    pub maintained: bool,
}

/// Summary of a full pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Outcomes in processing order.
    pub outcomes: Vec<LoadOutcome>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn rows_loaded(&self) -> u64 {
        self.outcomes.iter().map(|o| o.rows_loaded).sum()
    }

    pub fn tables_loaded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == LoadStatus::Loaded)
            .count()
    }

    pub fn tables_skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == LoadStatus::Skipped)
            .count()
    }
}
