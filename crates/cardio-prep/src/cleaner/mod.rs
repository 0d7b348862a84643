//! Ingestion and type normalization.
//!
//! This module provides:
//! - Loading the raw record file with every column as text
//! - Header validation against the configured schema
//! - Numeric coercion of feature columns and outcome labelling

mod normalizer;

pub use normalizer::{NormalizationReport, TypeNormalizer};

use polars::prelude::*;
use std::path::Path;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::{PrepError, Result};
use crate::io::read_raw_csv;

/// Read the raw record file and check its header.
///
/// A file without the outcome column is always rejected; the full header is
/// compared only when `config.expected_schema` is set.
pub fn load_raw_records(path: impl AsRef<Path>, config: &PipelineConfig) -> Result<DataFrame> {
    let df = read_raw_csv(path.as_ref())?;
    validate_schema(
        &df,
        config.expected_schema.as_deref(),
        &config.target_column,
    )?;
    info!(
        "Loaded raw records from {} ({} rows x {} columns)",
        path.as_ref().display(),
        df.height(),
        df.width()
    );
    Ok(df)
}

/// Check the header of a raw table.
pub fn validate_schema(
    df: &DataFrame,
    expected: Option<&[String]>,
    target_column: &str,
) -> Result<()> {
    let found: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.trim().to_string())
        .collect();

    if !found.iter().any(|name| name == target_column) {
        return Err(PrepError::ColumnNotFound(target_column.to_string()));
    }

    if let Some(expected) = expected
        && expected != found.as_slice()
    {
        return Err(PrepError::SchemaMismatch {
            expected: expected.to_vec(),
            found,
        });
    }

    Ok(())
}
