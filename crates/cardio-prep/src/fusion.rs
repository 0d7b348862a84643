//! Positional fusion of an external feature batch.
//!
//! The batch is aligned to the engineered table by row position, not by a
//! key. Row `i` of the batch is assumed to describe the same subject as row
//! `i` of the table.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::{PrepError, Result};
use crate::utils::{column_as_f64, parse_numeric};

/// Whether external features were merged into the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FusionStatus {
    /// External columns were appended; `padded_rows` rows had no batch row.
    Fused {
        columns: Vec<String>,
        padded_rows: usize,
    },
    /// No batch was available; the table is unchanged.
    PassThrough,
}

impl FusionStatus {
    pub fn is_fused(&self) -> bool {
        matches!(self, Self::Fused { .. })
    }
}

impl fmt::Display for FusionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fused {
                columns,
                padded_rows,
            } => write!(
                f,
                "fused [{}] ({} padded row(s))",
                columns.join(", "),
                padded_rows
            ),
            Self::PassThrough => write!(f, "pass-through"),
        }
    }
}

/// Merges an external batch into the engineered table.
#[derive(Debug, Clone)]
pub struct ExternalFuser {
    target_column: String,
}

impl ExternalFuser {
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
        }
    }

    /// Fuse `batch` into `table`, or pass `table` through when there is no
    /// batch.
    ///
    /// External columns are coerced to numeric, padded with nulls when the
    /// batch is shorter, inserted before the outcome column and then filled
    /// with their median over the fused table. A longer batch is truncated.
    ///
    /// # Errors
    ///
    /// [`PrepError::DuplicateColumn`] when a batch column shares a name with
    /// a table column.
    pub fn fuse(
        &self,
        table: &DataFrame,
        batch: Option<&DataFrame>,
    ) -> Result<(DataFrame, FusionStatus)> {
        let Some(batch) = batch else {
            info!("External fusion: pass-through (no external batch)");
            return Ok((table.clone(), FusionStatus::PassThrough));
        };

        let n_rows = table.height();
        if batch.height() > n_rows {
            warn!(
                "External batch has {} rows, table has {}; truncating {} trailing batch row(s)",
                batch.height(),
                n_rows,
                batch.height() - n_rows
            );
        }
        let padded_rows = n_rows.saturating_sub(batch.height());

        let mut external = Vec::with_capacity(batch.width());
        for column in batch.get_columns() {
            let name = column.name().to_string();
            if table.column(&name).is_ok() {
                return Err(PrepError::DuplicateColumn(name));
            }

            let mut values = coerce_numeric(batch, &name)?;
            values.resize(n_rows, None);

            let values = Float64Chunked::from_iter_options(name.as_str().into(), values.into_iter());
            let filled = match values.median() {
                Some(fill) => values.fill_null_with_values(fill)?,
                None => {
                    warn!("External column '{}' has no numeric values, left empty", name);
                    values
                }
            };
            debug!("External column '{}' aligned to {} rows", name, n_rows);
            external.push(filled.into_series().into_column());
        }

        let columns: Vec<String> = external.iter().map(|c| c.name().to_string()).collect();
        let mut fused: Vec<Column> = table
            .get_columns()
            .iter()
            .filter(|c| c.name().as_str() != self.target_column)
            .cloned()
            .collect();
        fused.extend(external);
        if let Ok(target) = table.column(&self.target_column) {
            fused.push(target.clone());
        }
        let fused = DataFrame::new(fused)?;

        info!(
            "External fusion: appended [{}] positionally, {} padded row(s); schema now {} columns",
            columns.join(", "),
            padded_rows,
            fused.width()
        );
        Ok((
            fused,
            FusionStatus::Fused {
                columns,
                padded_rows,
            },
        ))
    }
}

/// Batch values as numbers; text cells go through the same parser as raw
/// records.
fn coerce_numeric(batch: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = batch.column(name)?;
    if column.dtype() == &DataType::String {
        Ok(column
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_numeric))
            .collect())
    } else {
        column_as_f64(batch, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> DataFrame {
        df! {
            "age" => [0.1, -0.2, 0.3, 0.4],
            "chol" => [1.0, 0.5, -1.0, 0.0],
            "target" => [0i64, 1, 1, 0],
        }
        .unwrap()
    }

    #[test]
    fn test_absent_batch_passes_through() {
        let df = table();
        let (out, status) = ExternalFuser::new("target").fuse(&df, None).unwrap();
        assert_eq!(status, FusionStatus::PassThrough);
        assert_eq!(status.to_string(), "pass-through");
        assert!(out.equals_missing(&df));
    }

    #[test]
    fn test_short_batch_is_padded_and_median_filled() {
        let batch = df! {
            "systolic" => [120i64, 140],
            "heart_rate" => [70i64, 90],
        }
        .unwrap();

        let (out, status) = ExternalFuser::new("target").fuse(&table(), Some(&batch)).unwrap();

        assert_eq!(
            status,
            FusionStatus::Fused {
                columns: vec!["systolic".to_string(), "heart_rate".to_string()],
                padded_rows: 2,
            }
        );
        let names: Vec<&str> = out.get_column_names().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["age", "chol", "systolic", "heart_rate", "target"]);
        assert_eq!(
            column_as_f64(&out, "systolic").unwrap(),
            vec![Some(120.0), Some(140.0), Some(130.0), Some(130.0)]
        );
        assert_eq!(out.get_columns().iter().map(|c| c.null_count()).sum::<usize>(), 0);
    }

    #[test]
    fn test_fusion_never_drops_rows_or_changes_originals() {
        let df = table();
        let batch = df! { "cholesterol" => ["180", "?"] }.unwrap();
        let (out, _) = ExternalFuser::new("target").fuse(&df, Some(&batch)).unwrap();

        assert_eq!(out.height(), df.height());
        for name in ["age", "chol", "target"] {
            assert!(
                out.column(name)
                    .unwrap()
                    .as_materialized_series()
                    .equals_missing(df.column(name).unwrap().as_materialized_series())
            );
        }
        assert_eq!(
            column_as_f64(&out, "cholesterol").unwrap(),
            vec![Some(180.0); 4]
        );
    }

    #[test]
    fn test_long_batch_is_truncated() {
        let batch = df! { "heart_rate" => [60i64, 61, 62, 63, 64, 65] }.unwrap();
        let (out, status) = ExternalFuser::new("target").fuse(&table(), Some(&batch)).unwrap();
        assert_eq!(out.height(), 4);
        assert!(matches!(status, FusionStatus::Fused { padded_rows: 0, .. }));
    }

    #[test]
    fn test_all_missing_external_column_stays_null() {
        let batch = df! { "diastolic" => [None::<f64>, None] }.unwrap();
        let (out, _) = ExternalFuser::new("target").fuse(&table(), Some(&batch)).unwrap();
        assert_eq!(out.column("diastolic").unwrap().null_count(), 4);
    }

    #[test]
    fn test_name_collision_is_rejected() {
        let batch = df! { "chol" => [180.0] }.unwrap();
        let err = ExternalFuser::new("target").fuse(&table(), Some(&batch)).unwrap_err();
        assert!(matches!(err, PrepError::DuplicateColumn(ref c) if c == "chol"));
    }
}
