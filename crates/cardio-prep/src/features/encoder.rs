//! Fitted column-wise transform: standardization for numeric columns and
//! drop-first one-hot encoding for categorical columns.
//!
//! The transform is fitted once and then replayed unchanged, either in the
//! same run or later from its JSON form.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, info};

use super::derive::DerivationParams;
use crate::error::{PrepError, Result, ResultExt};
use crate::io::write_text;
use crate::utils::{
    column_as_f64, column_as_float, column_as_strings, numeric_feature_columns, parse_numeric,
    text_feature_columns,
};

/// Mean and scale learned for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub column: String,
    pub mean: f64,
    /// Population standard deviation, or 1.0 for a constant column.
    pub scale: f64,
}

impl StandardScaler {
    fn fit(column: &str, values: &Float64Chunked) -> Self {
        let std = values.std(0).unwrap_or(0.0);
        Self {
            column: column.to_string(),
            mean: values.mean().unwrap_or(0.0),
            scale: if std > 0.0 { std } else { 1.0 },
        }
    }

    fn transform(&self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        values
            .iter()
            .map(|v| v.map(|x| (x - self.mean) / self.scale))
            .collect()
    }
}

/// Vocabulary learned for one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub column: String,
    /// All categories seen at fit time, in sorted order. The first one is the
    /// dropped reference category.
    pub categories: Vec<String>,
}

impl OneHotEncoder {
    fn fit(column: &str, values: &[Option<String>]) -> Self {
        let mut categories: Vec<String> = values.iter().flatten().cloned().collect();
        sort_categories(&mut categories);
        categories.dedup();
        Self {
            column: column.to_string(),
            categories,
        }
    }

    /// Names of the indicator columns this encoder emits.
    pub fn feature_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .skip(1)
            .map(|category| format!("{}_{}", self.column, category))
            .collect()
    }

    fn transform(&self, values: &[Option<String>]) -> Result<Vec<Series>> {
        for value in values {
            match value {
                None => {
                    return Err(PrepError::EncodingMismatch {
                        column: self.column.clone(),
                        reason: "missing value".to_string(),
                    });
                }
                Some(v) if !self.categories.contains(v) => {
                    return Err(PrepError::EncodingMismatch {
                        column: self.column.clone(),
                        reason: format!("unseen category '{}'", v),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(self
            .categories
            .iter()
            .skip(1)
            .zip(self.feature_names())
            .map(|(category, name)| {
                let indicator: Vec<f64> = values
                    .iter()
                    .map(|v| f64::from(v.as_deref() == Some(category.as_str())))
                    .collect();
                Series::new(name.into(), indicator)
            })
            .collect())
    }
}

/// Numeric categories sort by value, anything else lexicographically.
fn sort_categories(categories: &mut [String]) {
    let all_numeric = categories.iter().all(|c| parse_numeric(c).is_some());
    if all_numeric {
        categories.sort_by(|a, b| {
            let (a, b) = (parse_numeric(a), parse_numeric(b));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        });
    } else {
        categories.sort();
    }
}

/// Immutable encoding parameters learned from one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTransform {
    pub target_column: String,
    /// Derivation learned alongside the encoding, replayed before it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation: Option<DerivationParams>,
    pub numeric: Vec<StandardScaler>,
    pub categorical: Vec<OneHotEncoder>,
}

impl FittedTransform {
    /// Learn scalers for the numeric feature columns and vocabularies for the
    /// text feature columns of `df`.
    pub fn fit(df: &DataFrame, target_column: &str) -> Result<Self> {
        let mut numeric = Vec::new();
        for column in numeric_feature_columns(df, target_column) {
            let values = column_as_float(df, &column)?;
            numeric.push(StandardScaler::fit(&column, &values));
        }

        let mut categorical = Vec::new();
        for column in text_feature_columns(df, target_column) {
            let values = column_as_strings(df, &column)?;
            let encoder = OneHotEncoder::fit(&column, &values);
            debug!(
                "Column '{}': {} categories, reference '{}'",
                column,
                encoder.categories.len(),
                encoder.categories.first().map(String::as_str).unwrap_or("")
            );
            categorical.push(encoder);
        }

        let transform = Self {
            target_column: target_column.to_string(),
            derivation: None,
            numeric,
            categorical,
        };
        info!(
            "Fitted transform: {} scaled, {} encoded -> {} features",
            transform.numeric.len(),
            transform.categorical.len(),
            transform.feature_names().len()
        );
        Ok(transform)
    }

    /// Attach the derivation that produced the fitted table.
    pub fn with_derivation(mut self, derivation: DerivationParams) -> Self {
        self.derivation = Some(derivation);
        self
    }

    /// Derive (when a derivation is attached) and encode a cleaned table.
    pub fn replay(&self, cleaned: &DataFrame) -> Result<DataFrame> {
        match &self.derivation {
            Some(derivation) => {
                let (derived, _) = derivation.apply(cleaned)?;
                self.apply(&derived)
            }
            None => self.apply(cleaned),
        }
    }

    /// Output feature names, excluding the outcome.
    pub fn feature_names(&self) -> Vec<String> {
        self.numeric
            .iter()
            .map(|s| s.column.clone())
            .chain(self.categorical.iter().flat_map(|e| e.feature_names()))
            .collect()
    }

    /// Apply the transform. The outcome column, when present, is carried
    /// through unchanged as the last column.
    ///
    /// # Errors
    ///
    /// [`PrepError::EncodingMismatch`] when a fitted column is missing or a
    /// categorical value was not seen at fit time.
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::new();

        for scaler in &self.numeric {
            let values = self.fitted_column_f64(df, &scaler.column)?;
            columns.push(
                Series::new(scaler.column.as_str().into(), scaler.transform(&values)).into_column(),
            );
        }

        for encoder in &self.categorical {
            let values = self.fitted_column_strings(df, &encoder.column)?;
            columns.extend(encoder.transform(&values)?.into_iter().map(Series::into_column));
        }

        if let Ok(target) = df.column(&self.target_column) {
            columns.push(target.clone());
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Fit on `df` and apply to the same table.
    pub fn fit_apply(df: &DataFrame, target_column: &str) -> Result<(DataFrame, Self)> {
        let transform = Self::fit(df, target_column)?;
        let encoded = transform.apply(df)?;
        Ok((encoded, transform))
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        write_text(path, &serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .context(format!("Reading transform {}", path.display()))?;
        Ok(serde_json::from_str(&text)?)
    }

    fn fitted_column_f64(&self, df: &DataFrame, column: &str) -> Result<Vec<Option<f64>>> {
        column_as_f64(df, column).map_err(|e| mismatch(column, e))
    }

    fn fitted_column_strings(&self, df: &DataFrame, column: &str) -> Result<Vec<Option<String>>> {
        column_as_strings(df, column).map_err(|e| mismatch(column, e))
    }
}

fn mismatch(column: &str, err: PrepError) -> PrepError {
    match err {
        PrepError::ColumnNotFound(_) => PrepError::EncodingMismatch {
            column: column.to_string(),
            reason: "column missing from input".to_string(),
        },
        other => other,
    }
}
