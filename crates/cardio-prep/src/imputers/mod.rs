//! Imputation module for handling missing values.
//!
//! [`ImputationEngine`] runs the tiers in order:
//! - Median per numeric feature column
//! - KNN for any numeric gap the median tier left
//! - Mode for text feature columns

mod knn;
mod statistical;

pub use knn::KNNImputer;
pub use statistical::StatisticalImputer;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::config::{NumericImputation, PipelineConfig};
use crate::error::{PrepError, Result};
use crate::utils::{numeric_feature_columns, text_feature_columns};

/// Which numeric tiers actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImputationMethod {
    #[serde(rename = "median")]
    Median,
    #[serde(rename = "median+knn")]
    MedianThenKnn,
    #[serde(rename = "knn")]
    Knn,
}

impl ImputationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Median => "median",
            Self::MedianThenKnn => "median+knn",
            Self::Knn => "knn",
        }
    }
}

impl fmt::Display for ImputationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an imputation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationReport {
    pub method: ImputationMethod,
    pub cells_filled: usize,
    pub processing_steps: Vec<String>,
}

/// Tiered missing-value imputation over every feature column.
pub struct ImputationEngine {
    target_column: String,
    strategy: NumericImputation,
    knn: KNNImputer,
}

impl ImputationEngine {
    pub fn new(target_column: impl Into<String>, strategy: NumericImputation, k: usize) -> Self {
        Self {
            target_column: target_column.into(),
            strategy,
            knn: KNNImputer::new(k),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.target_column.clone(),
            config.numeric_imputation,
            config.knn_neighbors,
        )
    }

    /// Return a copy of `df` with no missing feature values.
    ///
    /// # Errors
    ///
    /// [`PrepError::InsufficientData`] when a feature column has no observed
    /// value to impute from.
    pub fn impute(&self, df: &DataFrame) -> Result<(DataFrame, ImputationReport)> {
        let numeric = numeric_feature_columns(df, &self.target_column);
        let text = text_feature_columns(df, &self.target_column);
        let missing_before: usize = df.get_columns().iter().map(|c| c.null_count()).sum();

        let mut out = df.clone();
        let mut processing_steps = Vec::new();

        let method = match self.strategy {
            NumericImputation::MedianThenKnn => {
                for col in &numeric {
                    StatisticalImputer::apply_numeric_median(&mut out, col, &mut processing_steps)?;
                }
                let remaining = count_nulls(&out, &numeric);
                if remaining > 0 {
                    debug!("{} numeric gap(s) left after median fill, running KNN", remaining);
                    out = self.knn.fit_transform(&out, &numeric)?;
                    processing_steps.push(format!("KNN imputed {} remaining value(s)", remaining));
                    ImputationMethod::MedianThenKnn
                } else {
                    ImputationMethod::Median
                }
            }
            NumericImputation::Knn => {
                let missing = count_nulls(&out, &numeric);
                out = self.knn.fit_transform(&out, &numeric)?;
                if missing > 0 {
                    processing_steps.push(format!("KNN imputed {} value(s)", missing));
                }
                ImputationMethod::Knn
            }
        };

        for col in &text {
            if StatisticalImputer::apply_mode_imputation(&mut out, col, &mut processing_steps)?
                .is_none()
            {
                return Err(PrepError::InsufficientData { column: col.clone() });
            }
        }

        let missing_after: usize = out.get_columns().iter().map(|c| c.null_count()).sum();
        let cells_filled = missing_before.saturating_sub(missing_after);
        info!(
            "Imputation ({}): filled {} cell(s) across {} numeric and {} text column(s)",
            method,
            cells_filled,
            numeric.len(),
            text.len()
        );

        Ok((
            out,
            ImputationReport {
                method,
                cells_filled,
                processing_steps,
            },
        ))
    }
}

fn count_nulls(df: &DataFrame, columns: &[String]) -> usize {
    columns
        .iter()
        .filter_map(|name| df.column(name).ok())
        .map(|col| col.null_count())
        .sum()
}
