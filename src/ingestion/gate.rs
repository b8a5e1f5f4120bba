//! Load gate: a table is loaded only while it is empty.
//!
//! The check is per table, not per row. A table left partially filled by an interrupted copy
//! looks the same as a complete one and is skipped; empty it externally to force a reload.

use crate::error::PipelineResult;
use crate::store::Store;
use crate::types::TableSpec;

/// Result of the load gate for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// The table is empty.
    Load,
    /// The table already holds rows.
    Skip { existing_rows: u64 },
}

/// Count the table's rows and decide whether to load it.
pub fn check<S: Store + ?Sized>(store: &mut S, spec: &TableSpec) -> PipelineResult<GateDecision> {
    Ok(match store.count_rows(spec.name)? {
        0 => GateDecision::Load,
        existing_rows => GateDecision::Skip { existing_rows },
    })
}

/// `true` iff the table currently has zero rows.
pub fn should_load<S: Store + ?Sized>(store: &mut S, spec: &TableSpec) -> PipelineResult<bool> {
    Ok(check(store, spec)? == GateDecision::Load)
}
