//! Table provisioner.

use crate::error::PipelineResult;
use crate::store::{Ddl, Store};
use crate::types::TableSpec;

/// Create `spec`'s table and then each of its indexes, if not already present.
///
/// Safe to call on every run: existing tables and indexes are left untouched, including when
/// their structure no longer matches `spec`. Any store error is returned to the caller as-is.
pub fn ensure_schema<S: Store + ?Sized>(store: &mut S, spec: &TableSpec) -> PipelineResult<()> {
    store.execute_ddl(&Ddl::CreateTable(spec))?;
    for index in spec.indexes {
        store.execute_ddl(&Ddl::CreateIndex { table: spec, index })?;
    }
    Ok(())
}
