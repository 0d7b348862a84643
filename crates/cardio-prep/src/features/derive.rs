//! Derived clinical features: binned age, categorical chest-pain type and a
//! simple additive risk score.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PrepError, Result};
use crate::utils::{column_as_f64, column_as_float, format_category, mode_first_seen};

pub const AGE_GROUP_COLUMN: &str = "age_group";
pub const RISK_SCORE_COLUMN: &str = "risk_score_simple";

/// What derivation produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivationReport {
    /// Ages outside every bin, filled with the most common age group.
    pub ages_out_of_range: usize,
    /// Columns re-typed from numeric codes to categories.
    pub categorized: Vec<String>,
    /// Columns appended to the table.
    pub added: Vec<String>,
}

/// Derivation parameters learned from one table, replayable on another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivationParams {
    pub age_column: String,
    pub age_bin_edges: Vec<f64>,
    pub age_bin_labels: Vec<String>,
    /// Most common age group at fit time; assigned to ages outside every bin.
    pub age_fill_label: Option<String>,
    pub categorical_columns: Vec<String>,
    /// Each risk component with the maximum it is divided by. Zero means the
    /// component contributes nothing.
    pub risk_scales: Vec<(String, f64)>,
}

impl DerivationParams {
    /// Add `age_group` and `risk_score_simple` and re-type coded columns.
    pub fn apply(&self, df: &DataFrame) -> Result<(DataFrame, DerivationReport)> {
        let mut out = df.clone();
        let mut report = DerivationReport::default();

        let (age_group, out_of_range) = self.age_groups(df)?;
        report.ages_out_of_range = out_of_range;
        out.with_column(age_group)?;
        report.added.push(AGE_GROUP_COLUMN.to_string());

        for column in &self.categorical_columns {
            let codes = column_as_f64(df, column)?;
            let categories: Vec<Option<String>> = codes
                .into_iter()
                .map(|v| v.map(format_category))
                .collect();
            out.replace(column, Series::new(column.as_str().into(), categories))?;
            report.categorized.push(column.clone());
            debug!("Re-typed '{}' as categorical", column);
        }

        out.with_column(self.risk_score(df)?)?;
        report.added.push(RISK_SCORE_COLUMN.to_string());

        info!(
            "Derived {} ({} rows x {} columns)",
            report.added.join(", "),
            out.height(),
            out.width()
        );
        Ok((out, report))
    }

    /// Label each age with its right-inclusive bin.
    fn age_groups(&self, df: &DataFrame) -> Result<(Series, usize)> {
        let ages = column_as_f64(df, &self.age_column)?;
        let mut labels: Vec<Option<&str>> = ages
            .iter()
            .map(|age| bin_label(&self.age_bin_edges, &self.age_bin_labels, *age))
            .collect();

        let out_of_range = labels.iter().filter(|l| l.is_none()).count();
        if out_of_range > 0 {
            let fill = self.age_fill_label.as_deref().ok_or_else(|| {
                PrepError::InsufficientData {
                    column: AGE_GROUP_COLUMN.to_string(),
                }
            })?;
            warn!(
                "{} age value(s) outside the configured bins, assigned to '{}'",
                out_of_range, fill
            );
            for label in labels.iter_mut().filter(|l| l.is_none()) {
                *label = Some(fill);
            }
        }

        Ok((Series::new(AGE_GROUP_COLUMN.into(), labels), out_of_range))
    }

    /// Sum of each component divided by its fitted maximum.
    fn risk_score(&self, df: &DataFrame) -> Result<Series> {
        let mut score: Vec<Option<f64>> = vec![Some(0.0); df.height()];

        for (component, scale) in &self.risk_scales {
            let values = column_as_f64(df, component)?;
            for (acc, value) in score.iter_mut().zip(values) {
                *acc = match (*acc, value) {
                    (Some(total), Some(v)) if *scale != 0.0 => Some(total + v / scale),
                    (Some(total), Some(_)) => Some(total),
                    _ => None,
                };
            }
        }

        Ok(Series::new(RISK_SCORE_COLUMN.into(), score))
    }
}

fn bin_label<'a>(edges: &[f64], labels: &'a [String], age: Option<f64>) -> Option<&'a str> {
    let age = age?;
    edges
        .windows(2)
        .position(|w| age > w[0] && age <= w[1])
        .map(|idx| labels[idx].as_str())
}

/// Learns [`DerivationParams`] from a cleaned table.
#[derive(Debug, Clone)]
pub struct FeatureDeriver {
    age_column: String,
    age_bin_edges: Vec<f64>,
    age_bin_labels: Vec<String>,
    categorical_columns: Vec<String>,
    risk_components: Vec<String>,
}

impl FeatureDeriver {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            age_column: "age".to_string(),
            age_bin_edges: config.age_bin_edges.clone(),
            age_bin_labels: config.age_bin_labels.clone(),
            categorical_columns: config.categorical_columns.clone(),
            risk_components: config.risk_components.clone(),
        }
    }

    /// Learn the out-of-range age label and the risk component maxima.
    ///
    /// The fill label is the most frequent group among binned ages; a
    /// component whose maximum is zero or missing gets scale zero.
    pub fn fit(&self, df: &DataFrame) -> Result<DerivationParams> {
        let ages = column_as_f64(df, &self.age_column)?;
        let age_fill_label = mode_first_seen(
            ages.iter()
                .filter_map(|age| bin_label(&self.age_bin_edges, &self.age_bin_labels, *age)),
        );

        let mut risk_scales = Vec::with_capacity(self.risk_components.len());
        for component in &self.risk_components {
            let max = column_as_float(df, component)?.max().unwrap_or(0.0);
            let scale = if max.is_finite() { max } else { 0.0 };
            risk_scales.push((component.clone(), scale));
        }

        Ok(DerivationParams {
            age_column: self.age_column.clone(),
            age_bin_edges: self.age_bin_edges.clone(),
            age_bin_labels: self.age_bin_labels.clone(),
            age_fill_label,
            categorical_columns: self.categorical_columns.clone(),
            risk_scales,
        })
    }

    /// Fit on `df` and apply to the same table.
    pub fn derive(&self, df: &DataFrame) -> Result<(DataFrame, DerivationReport)> {
        self.fit(df)?.apply(df)
    }
}
