//! Bulk loader.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::PipelineResult;
use crate::store::{CopyRequest, Store};
use crate::types::TableSpec;

/// Stream the cleaned artifact at `cleaned` into `spec`'s table.
///
/// Uses the spec's column order and [`crate::types::BulkFormat`]. Returns the row count
/// reported by the store. A failure leaves previously loaded tables as they are.
pub fn load<S: Store + ?Sized>(store: &mut S, spec: &TableSpec, cleaned: &Path) -> PipelineResult<u64> {
    let mut reader = BufReader::new(File::open(cleaned)?);
    store.bulk_copy(&CopyRequest::for_spec(spec), &mut reader)
}
