//! Outlier filtering module.
//!
//! Removes whole records that fall outside the inter-quartile fence of any
//! numeric feature column.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::utils::{column_as_f64, column_as_float, linear_quantile, numeric_feature_columns};

/// IQR fence of a single column, with the number of records outside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFence {
    pub column: String,
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
    pub violations: usize,
}

impl ColumnFence {
    /// Null cells never violate a fence.
    pub fn contains(&self, value: Option<f64>) -> bool {
        value.is_none_or(|v| v >= self.lower && v <= self.upper)
    }
}

/// Row counts around the filter and the per-column fences used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub fences: Vec<ColumnFence>,
}

impl OutlierReport {
    pub fn rows_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }
}

/// Conjunctive IQR filter: a record survives only if every numeric feature
/// lies inside its column's fence.
pub struct OutlierFilter {
    target_column: String,
    multiplier: f64,
}

impl OutlierFilter {
    pub fn new(target_column: impl Into<String>, multiplier: f64) -> Self {
        Self {
            target_column: target_column.into(),
            multiplier,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.target_column.clone(), config.iqr_multiplier)
    }

    /// Compute the fence of every numeric feature column.
    ///
    /// Columns without observed values get no fence.
    pub fn fences(&self, df: &DataFrame) -> Result<Vec<ColumnFence>> {
        let mut fences = Vec::new();
        for column in numeric_feature_columns(df, &self.target_column) {
            let values = column_as_float(df, &column)?;
            let (Some(q1), Some(q3)) = (
                linear_quantile(&values, 0.25)?,
                linear_quantile(&values, 0.75)?,
            ) else {
                continue;
            };
            let fence = self.multiplier * (q3 - q1);
            let mut col_fence = ColumnFence {
                column,
                q1,
                q3,
                lower: q1 - fence,
                upper: q3 + fence,
                violations: 0,
            };
            col_fence.violations = values.into_iter().filter(|v| !col_fence.contains(*v)).count();
            fences.push(col_fence);
        }
        Ok(fences)
    }

    /// Drop every record outside any fence, preserving row order.
    pub fn filter(&self, df: &DataFrame) -> Result<(DataFrame, OutlierReport)> {
        let fences = self.fences(df)?;
        let mut keep = vec![true; df.height()];

        for fence in &fences {
            let values = column_as_f64(df, &fence.column)?;
            for (flag, value) in keep.iter_mut().zip(values) {
                if !fence.contains(value) {
                    *flag = false;
                }
            }
            if fence.violations > 0 {
                debug!(
                    "Column '{}': {} value(s) outside [{:.3}, {:.3}]",
                    fence.column, fence.violations, fence.lower, fence.upper
                );
            }
        }

        let mask = BooleanChunked::from_slice("mask".into(), &keep);
        let filtered = df.filter(&mask)?;

        let report = OutlierReport {
            rows_before: df.height(),
            rows_after: filtered.height(),
            fences,
        };
        info!(
            "Outlier filter: {} -> {} rows ({} removed, IQR x {})",
            report.rows_before,
            report.rows_after,
            report.rows_removed(),
            self.multiplier
        );
        Ok((filtered, report))
    }
}
