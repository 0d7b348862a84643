//! Pipeline module.
//!
//! This module provides the preparation pipeline, its outlier filter and
//! progress reporting.

mod builder;
pub mod outliers;
pub mod progress;

pub use builder::{Pipeline, PipelineBuilder};
pub use outliers::{ColumnFence, OutlierFilter, OutlierReport};
pub use progress::{ClosureProgressReporter, PrepStage, ProgressReporter, ProgressUpdate};
