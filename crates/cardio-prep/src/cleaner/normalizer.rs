//! Type normalization: every feature column to `f64`, the outcome to an
//! integer label.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::utils::{is_numeric_dtype, parse_numeric, require_column};

/// What the normalizer changed, for the step log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationReport {
    /// Non-null cells per column that could not be parsed and became null.
    pub coercion_failures: Vec<(String, usize)>,
    /// Outcome cells that were missing or unparseable and defaulted to 0.
    pub outcome_defaulted: usize,
    /// Outcome values above 1 folded into the positive class.
    pub outcome_binarized: usize,
}

impl NormalizationReport {
    /// Total number of cells that failed numeric coercion.
    pub fn total_coercion_failures(&self) -> usize {
        self.coercion_failures.iter().map(|(_, n)| n).sum()
    }
}

/// Coerces raw text columns into the types later stages expect.
#[derive(Debug, Clone)]
pub struct TypeNormalizer {
    target_column: String,
    text_columns: Vec<String>,
    binarize_outcome: bool,
}

impl TypeNormalizer {
    pub fn new(
        target_column: impl Into<String>,
        text_columns: Vec<String>,
        binarize_outcome: bool,
    ) -> Self {
        Self {
            target_column: target_column.into(),
            text_columns,
            binarize_outcome,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.target_column.clone(),
            config.text_columns.clone(),
            config.binarize_outcome,
        )
    }

    /// Normalize a table without dropping rows.
    ///
    /// Feature columns become `Float64` (text columns stay `String` with
    /// `?`/empty mapped to null) and the outcome becomes `Int64`. Running it on
    /// an already normalized table returns an equal table.
    pub fn normalize(&self, df: &DataFrame) -> Result<(DataFrame, NormalizationReport)> {
        require_column(df, &self.target_column)?;

        let mut report = NormalizationReport::default();
        let mut columns: Vec<Column> = Vec::with_capacity(df.width());

        for col in df.get_columns() {
            let name = col.name().as_str();
            let series = col.as_materialized_series();

            let normalized = if name == self.target_column {
                self.normalize_outcome(series, &mut report)?
            } else if self.text_columns.iter().any(|c| c == name) {
                normalize_text(series)?
            } else {
                let (coerced, failures) = coerce_numeric(series)?;
                if failures > 0 {
                    warn!(
                        "Column '{}': {} value(s) could not be parsed as numbers and were set to null",
                        name, failures
                    );
                    report.coercion_failures.push((name.to_string(), failures));
                }
                coerced
            };
            columns.push(normalized.into_column());
        }

        let out = DataFrame::new(columns)?;
        info!(
            "Normalized {} columns ({} coercion failure(s), {} outcome value(s) defaulted to 0)",
            out.width(),
            report.total_coercion_failures(),
            report.outcome_defaulted
        );
        Ok((out, report))
    }

    fn normalize_outcome(
        &self,
        series: &Series,
        report: &mut NormalizationReport,
    ) -> Result<Series> {
        let (values, _) = coerce_numeric(series)?;
        let values = values.f64()?;

        let mut labels: Vec<i64> = Vec::with_capacity(values.len());
        for value in values.into_iter() {
            let value = match value {
                Some(v) => v,
                None => {
                    report.outcome_defaulted += 1;
                    0.0
                }
            };
            let label = if self.binarize_outcome {
                if value > 1.0 {
                    report.outcome_binarized += 1;
                }
                i64::from(value > 0.0)
            } else {
                value.trunc() as i64
            };
            labels.push(label);
        }

        if report.outcome_binarized > 0 {
            debug!(
                "Outcome '{}': {} value(s) above 1 mapped to the positive class",
                self.target_column, report.outcome_binarized
            );
        }
        Ok(Series::new(series.name().clone(), labels))
    }
}

/// Coerce a column to `Float64`, returning the number of non-null cells that
/// failed to parse.
fn coerce_numeric(series: &Series) -> Result<(Series, usize)> {
    if is_numeric_dtype(series.dtype()) {
        return Ok((series.cast(&DataType::Float64)?, 0));
    }

    if !matches!(series.dtype(), DataType::String) {
        let casted = series.cast(&DataType::Float64)?;
        let failures = casted.null_count().saturating_sub(series.null_count());
        return Ok((casted, failures));
    }

    let mut failures = 0usize;
    let parsed: Vec<Option<f64>> = series
        .str()?
        .into_iter()
        .map(|cell| match cell {
            Some(raw) => {
                let value = parse_numeric(raw);
                if value.is_none() {
                    failures += 1;
                }
                value
            }
            None => None,
        })
        .collect();

    Ok((Series::new(series.name().clone(), parsed), failures))
}

fn normalize_text(series: &Series) -> Result<Series> {
    let casted = series.cast(&DataType::String)?;
    let values: Vec<Option<String>> = casted
        .str()?
        .into_iter()
        .map(|cell| {
            cell.map(str::trim)
                .filter(|s| !s.is_empty() && *s != "?")
                .map(|s| s.to_string())
        })
        .collect();
    Ok(Series::new(series.name().clone(), values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn normalizer() -> TypeNormalizer {
        TypeNormalizer::new("target", Vec::new(), true)
    }

    #[test]
    fn test_coerces_markers_to_null_and_counts() {
        let df = df! {
            "age" => ["63", "41", "57"],
            "ca" => ["0", "?", ""],
            "thal" => ["3", "seven", "7"],
            "target" => ["1", "0", "2"],
        }
        .unwrap();

        let (out, report) = normalizer().normalize(&df).unwrap();

        assert_eq!(out.height(), 3);
        assert_eq!(out.column("age").unwrap().dtype(), &DataType::Float64);
        assert_eq!(out.column("ca").unwrap().null_count(), 2);
        assert_eq!(out.column("thal").unwrap().null_count(), 1);
        assert_eq!(
            report.coercion_failures,
            vec![("ca".to_string(), 2), ("thal".to_string(), 1)]
        );
        assert_eq!(report.total_coercion_failures(), 3);
    }

    #[test]
    fn test_outcome_binarized_and_defaulted() {
        let df = df! {
            "age" => ["63", "41", "57", "50"],
            "target" => [Some("3"), Some("0"), None, Some("?")],
        }
        .unwrap();

        let (out, report) = normalizer().normalize(&df).unwrap();
        let target: Vec<Option<i64>> = out.column("target").unwrap().i64().unwrap().into_iter().collect();

        assert_eq!(target, vec![Some(1), Some(0), Some(0), Some(0)]);
        assert_eq!(report.outcome_defaulted, 2);
        assert_eq!(report.outcome_binarized, 1);
    }

    #[test]
    fn test_outcome_kept_when_not_binarizing() {
        let df = df! {
            "age" => ["63", "41"],
            "target" => ["3", "1"],
        }
        .unwrap();

        let (out, _) = TypeNormalizer::new("target", Vec::new(), false)
            .normalize(&df)
            .unwrap();
        let target: Vec<Option<i64>> = out.column("target").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(target, vec![Some(3), Some(1)]);
    }

    #[test]
    fn test_text_columns_keep_strings() {
        let df = df! {
            "site" => ["cleveland", "?", " hungary "],
            "target" => ["1", "0", "1"],
        }
        .unwrap();

        let (out, report) = TypeNormalizer::new("target", vec!["site".to_string()], true)
            .normalize(&df)
            .unwrap();

        let site: Vec<Option<&str>> = out.column("site").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(site, vec![Some("cleveland"), None, Some("hungary")]);
        assert!(report.coercion_failures.is_empty());
    }

    #[test]
    fn test_idempotent() {
        let df = df! {
            "age" => ["63", "x", "57"],
            "chol" => ["233", "250", "?"],
            "target" => ["1", "4", "0"],
        }
        .unwrap();

        let (once, _) = normalizer().normalize(&df).unwrap();
        let (twice, report) = normalizer().normalize(&once).unwrap();

        assert!(once.equals_missing(&twice));
        assert_eq!(report, NormalizationReport::default());
    }

    #[test]
    fn test_missing_outcome_rejected() {
        let df = df! { "age" => ["63"] }.unwrap();
        let err = normalizer().normalize(&df).unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }
}
