//! Completeness check run before partitioning.

use polars::prelude::*;
use tracing::{info, warn};

use crate::error::{PrepError, Result};
use crate::utils::null_summary;

/// Fail with [`PrepError::DataIntegrity`] if any cell in `df` is missing.
pub fn assert_complete(df: &DataFrame) -> Result<()> {
    let (missing, per_column) = null_summary(df);
    if missing > 0 {
        for (column, count) in &per_column {
            warn!("Column '{}' has {} missing value(s)", column, count);
        }
        return Err(PrepError::DataIntegrity {
            missing,
            columns: per_column.into_iter().map(|(name, _)| name).collect(),
        });
    }

    info!(
        "Validation passed: {} rows x {} columns, no missing values",
        df.height(),
        df.width()
    );
    Ok(())
}
