use polars::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::io::write_csv;
use crate::utils::{column_as_float, column_as_strings, linear_quantile, numeric_feature_columns};

const STATISTICS: [&str; 9] = [
    "count", "missing", "mean", "std", "min", "25%", "50%", "75%", "max",
];

/// Descriptive statistics of a table and the distribution of its outcome.
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    /// One row per statistic, one column per numeric column.
    pub statistics: DataFrame,
    /// Outcome values and their counts, most frequent first.
    pub target_distribution: DataFrame,
}

impl DatasetSummary {
    /// Write `dataset_summary_statistics.csv` and `target_distribution.csv`.
    pub fn write(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        write_csv(&self.statistics, dir.join("dataset_summary_statistics.csv"))?;
        write_csv(&self.target_distribution, dir.join("target_distribution.csv"))?;
        Ok(())
    }
}

/// Summarize every numeric column of `df` (outcome included) and count the
/// outcome classes.
///
/// `std` is the sample standard deviation and is empty for fewer than two
/// values; all statistics except the counts are empty for a column with no
/// values.
pub fn summarize(df: &DataFrame, target_column: &str) -> Result<DatasetSummary> {
    let mut columns = vec![Column::new("statistic".into(), STATISTICS.to_vec())];

    // Passing an empty target keeps the outcome among the numeric columns.
    for name in numeric_feature_columns(df, "") {
        let values = column_as_float(df, &name)?;
        columns.push(Column::new(name.as_str().into(), describe(&values)?.to_vec()));
    }
    let statistics = DataFrame::new(columns)?;

    let target_distribution = value_counts(df, target_column)?;
    debug!(
        "Summarized {} columns, {} outcome classes",
        statistics.width() - 1,
        target_distribution.height()
    );

    Ok(DatasetSummary {
        statistics,
        target_distribution,
    })
}

fn describe(values: &Float64Chunked) -> Result<[Option<f64>; 9]> {
    let missing = values.null_count();
    let count = values.len() - missing;
    let std = if count > 1 { values.std(1) } else { None };

    Ok([
        Some(count as f64),
        Some(missing as f64),
        values.mean(),
        std,
        values.min(),
        linear_quantile(values, 0.25)?,
        linear_quantile(values, 0.5)?,
        linear_quantile(values, 0.75)?,
        values.max(),
    ])
}

/// Outcome values with their counts, most frequent first; ties keep the order
/// values first appear in.
fn value_counts(df: &DataFrame, target_column: &str) -> Result<DataFrame> {
    let values = column_as_strings(df, target_column)?;

    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, u32> = HashMap::new();
    for value in values.into_iter().flatten() {
        let count = counts.entry(value.clone()).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));

    let tallies: Vec<u32> = order.iter().map(|v| counts[v]).collect();
    Ok(DataFrame::new(vec![
        Column::new(target_column.into(), order),
        Column::new("count".into(), tallies),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::column_as_f64;
    use pretty_assertions::assert_eq;

    fn sample() -> DataFrame {
        df! {
            "chol" => [Some(200.0), Some(240.0), None, Some(280.0)],
            "target" => [1i64, 0, 1, 1],
        }
        .unwrap()
    }

    #[test]
    fn test_statistics_layout() {
        let summary = summarize(&sample(), "target").unwrap();
        let names: Vec<&str> = summary
            .statistics
            .get_column_names()
            .iter()
            .map(|s| s.as_str())
            .collect();
        assert_eq!(names, vec!["statistic", "chol", "target"]);
        assert_eq!(summary.statistics.height(), STATISTICS.len());
    }

    fn chunked(values: &[Option<f64>]) -> Float64Chunked {
        Float64Chunked::from_iter_options("chol".into(), values.iter().copied())
    }

    #[test]
    fn test_describe_values() {
        let chol = describe(&chunked(&[Some(200.0), Some(240.0), None, Some(280.0)])).unwrap();
        assert_eq!(chol[0], Some(3.0));
        assert_eq!(chol[1], Some(1.0));
        assert_eq!(chol[2], Some(240.0));
        assert!((chol[3].unwrap() - 40.0).abs() < 1e-9);
        assert_eq!(chol[4], Some(200.0));
        assert_eq!(chol[5], Some(220.0));
        assert_eq!(chol[6], Some(240.0));
        assert_eq!(chol[8], Some(280.0));
    }

    #[test]
    fn test_describe_empty_and_single() {
        let empty = describe(&chunked(&[None, None])).unwrap();
        assert_eq!(empty[0], Some(0.0));
        assert_eq!(empty[1], Some(2.0));
        assert!(empty[2..].iter().all(Option::is_none));

        let single = describe(&chunked(&[Some(5.0)])).unwrap();
        assert_eq!(single[2], Some(5.0));
        assert_eq!(single[3], None);
    }

    #[test]
    fn test_target_distribution_most_frequent_first() {
        let summary = summarize(&sample(), "target").unwrap();
        let dist = &summary.target_distribution;
        assert_eq!(
            column_as_strings(dist, "target").unwrap(),
            vec![Some("1".to_string()), Some("0".to_string())]
        );
        assert_eq!(
            column_as_f64(dist, "count").unwrap(),
            vec![Some(3.0), Some(1.0)]
        );
    }

    #[test]
    fn test_write_both_files() {
        let dir = tempfile::tempdir().unwrap();
        summarize(&sample(), "target").unwrap().write(dir.path()).unwrap();
        assert!(dir.path().join("dataset_summary_statistics.csv").exists());
        assert!(dir.path().join("target_distribution.csv").exists());
    }
}
