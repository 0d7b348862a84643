use polars::prelude::*;
use tracing::debug;

use crate::error::{PrepError, Result};
use crate::utils::{column_as_f64, column_as_float};

/// Distance-weighted K-nearest-neighbour imputation over numeric columns.
pub struct KNNImputer {
    n_neighbors: usize,
}

impl KNNImputer {
    /// Create a new KNN imputer with specified number of neighbors
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
        }
    }

    /// Fill every null in `columns`.
    ///
    /// Distances are measured over the other columns of `columns` only, each
    /// divided by its observed range, and donors are rows with an observed
    /// value in the column being filled. Values filled for one column never
    /// act as donors for another.
    pub fn fit_transform(&self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        let mut result_df = df.clone();

        let data_matrix = self.create_data_matrix(df, columns)?;
        let ranges = column_ranges(df, columns)?;
        let n_rows = df.height();

        for (col_idx, col_name) in columns.iter().enumerate() {
            let has_nulls = data_matrix.iter().any(|row| row[col_idx].is_none());
            if !has_nulls {
                continue;
            }

            let donors: Vec<usize> = (0..n_rows)
                .filter(|&row| data_matrix[row][col_idx].is_some())
                .collect();
            if donors.is_empty() {
                return Err(PrepError::InsufficientData {
                    column: col_name.clone(),
                });
            }

            let mut imputed_values = Vec::with_capacity(n_rows);
            let mut filled = 0usize;
            for (row_idx, row) in data_matrix.iter().enumerate() {
                match row[col_idx] {
                    Some(value) => imputed_values.push(Some(value)),
                    None => {
                        let value =
                            self.impute_value(&data_matrix, &ranges, row_idx, col_idx, &donors);
                        imputed_values.push(Some(value));
                        filled += 1;
                    }
                }
            }

            debug!(
                "KNN filled {} value(s) in '{}' from {} donor row(s)",
                filled,
                col_name,
                donors.len()
            );
            let imputed_series = Series::new(col_name.as_str().into(), imputed_values);
            result_df.replace(col_name, imputed_series)?;
        }

        Ok(result_df)
    }

    /// Row-major copy of the numeric columns.
    fn create_data_matrix(
        &self,
        df: &DataFrame,
        columns: &[String],
    ) -> Result<Vec<Vec<Option<f64>>>> {
        let n_rows = df.height();
        let mut matrix = vec![vec![None; columns.len()]; n_rows];

        for (col_idx, col_name) in columns.iter().enumerate() {
            let values = column_as_f64(df, col_name)?;
            for (row, value) in matrix.iter_mut().zip(values) {
                row[col_idx] = value;
            }
        }

        Ok(matrix)
    }

    /// Estimate one missing cell from its nearest donors.
    fn impute_value(
        &self,
        data_matrix: &[Vec<Option<f64>>],
        ranges: &[f64],
        target_row: usize,
        target_col: usize,
        donors: &[usize],
    ) -> f64 {
        let mut distances: Vec<(usize, f64)> = donors
            .iter()
            .map(|&donor| {
                let distance = calculate_distance(
                    &data_matrix[target_row],
                    &data_matrix[donor],
                    ranges,
                    target_col,
                );
                (donor, distance)
            })
            .collect();

        // stable: equal distances keep row order
        distances.sort_by(|a, b| a.1.total_cmp(&b.1));

        let k = self.n_neighbors.min(distances.len());
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;

        for &(neighbor_row, distance) in distances.iter().take(k) {
            if let Some(value) = data_matrix[neighbor_row][target_col] {
                let weight = if distance < 1e-10 {
                    1e10
                } else {
                    1.0 / distance
                };
                weighted_sum += value * weight;
                weight_sum += weight;
            }
        }

        if weight_sum > 0.0 {
            weighted_sum / weight_sum
        } else {
            // no donor shares an observed coordinate with the target row
            let values: Vec<f64> = donors
                .iter()
                .filter_map(|&row| data_matrix[row][target_col])
                .collect();
            values.iter().sum::<f64>() / values.len() as f64
        }
    }
}

/// Observed max minus min per column; 1.0 for constant or empty columns.
fn column_ranges(df: &DataFrame, columns: &[String]) -> Result<Vec<f64>> {
    columns
        .iter()
        .map(|name| {
            let values = column_as_float(df, name)?;
            let range = match (values.min(), values.max()) {
                (Some(min), Some(max)) if max > min => max - min,
                _ => 1.0,
            };
            Ok(range)
        })
        .collect()
}

/// Euclidean distance over the range-scaled coordinates both rows observe,
/// excluding `skip_col`, normalized by the number of such coordinates.
fn calculate_distance(
    row1: &[Option<f64>],
    row2: &[Option<f64>],
    ranges: &[f64],
    skip_col: usize,
) -> f64 {
    let mut sum_squared_diff = 0.0;
    let mut count = 0;

    for (col_idx, (a, b)) in row1.iter().zip(row2).enumerate() {
        if col_idx == skip_col {
            continue;
        }
        if let (Some(val1), Some(val2)) = (a, b) {
            let diff = (val1 - val2) / ranges[col_idx];
            sum_squared_diff += diff * diff;
            count += 1;
        }
    }

    if count > 0 {
        (sum_squared_diff / count as f64).sqrt()
    } else {
        f64::INFINITY
    }
}
