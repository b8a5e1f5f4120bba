//! Ingestion pipeline stages and orchestration.
//!
//! Most callers should use [`Pipeline`] (from [`pipeline`]), which:
//!
//! - provisions each registered table and its indexes
//! - loads a table only while it is empty ([`gate`])
//! - sanitizes the snapshot ([`sanitize`]) and streams it into the store ([`bulk`])
//! - runs a best-effort maintenance pass ([`maintenance`])
//! - optionally reports progress/failures/alerts to a [`PipelineObserver`]
//!
//! Each stage is also available on its own.

pub mod bulk;
pub mod gate;
pub mod maintenance;
pub mod metrics;
pub mod observability;
pub mod pipeline;
pub mod provision;
pub mod sanitize;

pub use gate::GateDecision;
pub use metrics::{PipelineMetrics, PipelineMetricsSnapshot};
pub use observability::{
    CompositeObserver, FileObserver, PipelineEvent, PipelineObserver, PipelineSeverity, ProgressObserver,
    TableContext, TracingObserver,
};
pub use pipeline::{Pipeline, PipelineOptions};
pub use sanitize::{CleanedArtifact, SanitizeStats, DEFAULT_CLEANED_SUFFIX};
