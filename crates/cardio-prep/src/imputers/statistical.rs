//! Statistical imputation methods.
//!
//! Median for numeric columns, mode for text columns.

use polars::prelude::*;

use crate::error::Result;
use crate::utils::{column_as_float, column_as_strings, mode_first_seen};

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill nulls in a numeric column with its median.
    ///
    /// Returns the number of cells filled. A column without any observed value
    /// is left untouched and reports zero.
    pub fn apply_numeric_median(
        df: &mut DataFrame,
        col_name: &str,
        processing_steps: &mut Vec<String>,
    ) -> Result<usize> {
        let values = column_as_float(df, col_name)?;
        let missing = values.null_count();
        if missing == 0 {
            return Ok(0);
        }

        let Some(median_val) = values.median() else {
            return Ok(0);
        };

        let filled = values.fill_null_with_values(median_val)?.into_series();
        df.replace(col_name, filled)?;
        processing_steps.push(format!(
            "Filled {} missing value(s) in '{}' with median {}",
            missing, col_name, median_val
        ));
        Ok(missing)
    }

    /// Fill nulls in a text column with its most frequent value.
    ///
    /// Returns the number of cells filled, or `None` when the column has no
    /// observed value to take a mode from.
    pub fn apply_mode_imputation(
        df: &mut DataFrame,
        col_name: &str,
        processing_steps: &mut Vec<String>,
    ) -> Result<Option<usize>> {
        let values = column_as_strings(df, col_name)?;
        let missing = values.iter().filter(|v| v.is_none()).count();
        if missing == 0 {
            return Ok(Some(0));
        }

        let Some(mode_val) = mode_first_seen(values.iter().flatten().map(String::as_str)) else {
            return Ok(None);
        };

        let filled: Vec<String> = values
            .into_iter()
            .map(|v| v.unwrap_or_else(|| mode_val.clone()))
            .collect();
        df.replace(col_name, Series::new(col_name.into(), filled))?;
        processing_steps.push(format!(
            "Filled {} missing value(s) in '{}' with mode '{}'",
            missing, col_name, mode_val
        ));
        Ok(Some(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::column_as_f64;

    #[test]
    fn test_apply_numeric_median() {
        let mut df = df! {
            "chol" => [Some(200.0), None, Some(240.0), Some(210.0)],
        }
        .unwrap();
        let mut steps = Vec::new();

        let filled = StatisticalImputer::apply_numeric_median(&mut df, "chol", &mut steps).unwrap();

        assert_eq!(filled, 1);
        assert_eq!(
            column_as_f64(&df, "chol").unwrap(),
            vec![Some(200.0), Some(210.0), Some(240.0), Some(210.0)]
        );
        assert_eq!(steps.len(), 1);
        assert!(steps[0].contains("median 210"));
    }

    #[test]
    fn test_median_leaves_all_null_column() {
        let mut df = df! { "ca" => [Option::<f64>::None, None] }.unwrap();
        let mut steps = Vec::new();

        let filled = StatisticalImputer::apply_numeric_median(&mut df, "ca", &mut steps).unwrap();
        assert_eq!(filled, 0);
        assert_eq!(df.column("ca").unwrap().null_count(), 2);
        assert!(steps.is_empty());
    }

    #[test]
    fn test_apply_mode_imputation_first_seen_tie() {
        let mut df = df! {
            "site" => [Some("va"), Some("cleveland"), None, Some("cleveland"), Some("va")],
        }
        .unwrap();
        let mut steps = Vec::new();

        let filled = StatisticalImputer::apply_mode_imputation(&mut df, "site", &mut steps).unwrap();
        assert_eq!(filled, Some(1));
        let site = column_as_strings(&df, "site").unwrap();
        assert_eq!(site[2].as_deref(), Some("va"));
    }

    #[test]
    fn test_mode_without_values() {
        let mut df = df! { "site" => [Option::<&str>::None] }.unwrap();
        let mut steps = Vec::new();
        let filled = StatisticalImputer::apply_mode_imputation(&mut df, "site", &mut steps).unwrap();
        assert_eq!(filled, None);
    }
}
