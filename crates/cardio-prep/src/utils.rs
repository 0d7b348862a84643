//! Shared utilities for the preparation pipeline.
//!
//! Column extraction, numeric parsing and the small statistics (quantiles,
//! mode) every stage agrees on.

use polars::prelude::*;
use std::collections::HashMap;

use crate::error::{PrepError, Result};

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType holds text (plain strings or categoricals).
#[inline]
pub fn is_text_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(_, _))
}

/// Numeric columns of `df`, in frame order, excluding `target`.
pub fn numeric_feature_columns(df: &DataFrame, target: &str) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| col.name().as_str() != target && is_numeric_dtype(col.dtype()))
        .map(|col| col.name().to_string())
        .collect()
}

/// Text columns of `df`, in frame order, excluding `target`.
pub fn text_feature_columns(df: &DataFrame, target: &str) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| col.name().as_str() != target && is_text_dtype(col.dtype()))
        .map(|col| col.name().to_string())
        .collect()
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse a raw cell as a finite number.
///
/// Empty strings, `?`, words and non-finite values all yield `None`.
pub fn parse_numeric(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed == "?" {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Render a numeric category without a trailing `.0` for integral values.
pub fn format_category(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

// =============================================================================
// Column Extraction
// =============================================================================

/// Look up a column, mapping a miss to [`PrepError::ColumnNotFound`].
pub fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| PrepError::ColumnNotFound(name.to_string()))
}

/// A column cast to `Float64`, nulls preserved.
pub fn column_as_float(df: &DataFrame, name: &str) -> Result<Float64Chunked> {
    let column = require_column(df, name)?;
    let casted = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(casted.f64()?.clone())
}

/// Values of a column as `f64`, nulls preserved.
pub fn column_as_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(column_as_float(df, name)?.into_iter().collect())
}

/// Values of a column as strings, nulls preserved.
pub fn column_as_strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = require_column(df, name)?;
    let casted = column.as_materialized_series().cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Total and per-column null counts, only listing columns with nulls.
pub fn null_summary(df: &DataFrame) -> (usize, Vec<(String, usize)>) {
    let per_column: Vec<(String, usize)> = df
        .get_columns()
        .iter()
        .filter(|col| col.null_count() > 0)
        .map(|col| (col.name().to_string(), col.null_count()))
        .collect();
    let total = per_column.iter().map(|(_, n)| n).sum();
    (total, per_column)
}

// =============================================================================
// Statistics
// =============================================================================

/// Linear-interpolated quantile of the non-null values, `None` when there are
/// none.
pub fn linear_quantile(values: &Float64Chunked, q: f64) -> Result<Option<f64>> {
    Ok(values.quantile(q, QuantileMethod::Linear)?)
}

/// Most frequent value; ties go to the value seen first.
pub fn mode_first_seen<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut counts: HashMap<&'a str, (usize, usize)> = HashMap::new();
    for (idx, value) in values.into_iter().enumerate() {
        let entry = counts.entry(value).or_insert((0, idx));
        entry.0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(value, _)| value.to_string())
}

// =============================================================================
// Tests
// =============================================================================
