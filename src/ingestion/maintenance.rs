//! Post-load maintenance.

use crate::error::PipelineResult;
use crate::store::Store;
use crate::types::TableSpec;

/// Ask the store to refresh statistics and reclaim space for `spec`'s table.
///
/// Callers treat a failure as a warning; it has no bearing on the loaded data.
pub fn analyze<S: Store + ?Sized>(store: &mut S, spec: &TableSpec) -> PipelineResult<()> {
    store.execute_maintenance(spec.name)
}
