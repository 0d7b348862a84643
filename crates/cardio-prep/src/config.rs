//! Configuration types for the data preparation pipeline.
//!
//! Paths, seed and thresholds are all explicit configuration. Use
//! [`PipelineConfig::builder()`] for a validated configuration, or
//! [`PipelineConfig::from_json_file`] to load one from disk.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PrepError, Result, ResultExt};

/// Feature columns of the heart-disease record, in file order.
pub const HEART_FEATURE_COLUMNS: [&str; 13] = [
    "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang", "oldpeak",
    "slope", "ca", "thal",
];

/// Name of the outcome column in the heart-disease record.
pub const DEFAULT_TARGET_COLUMN: &str = "target";

/// Strategy for imputing missing numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NumericImputation {
    /// Column median first, KNN only for gaps the median could not close
    #[default]
    MedianThenKnn,
    /// K-Nearest Neighbors imputation for every gap
    Knn,
}

/// Configuration for the preparation pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use cardio_prep::config::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .input_path("data/raw/heart_raw.csv")
///     .iqr_multiplier(3.0)
///     .seed(7)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw CSV with the heart-disease schema.
    /// Default: "data/raw/heart_raw.csv"
    pub input_path: PathBuf,

    /// Directory for cleaned, engineered and split tables.
    /// Default: "data/processed"
    pub output_dir: PathBuf,

    /// Directory for the milestone report.
    /// Default: "docs"
    pub report_dir: PathBuf,

    /// Directory for the importance ranking and the fitted transform.
    /// Default: "outputs"
    pub artifact_dir: PathBuf,

    /// Optional external (OCR) feature batch. A configured path that does
    /// not exist is treated as absent.
    /// Default: "data/processed/ocr_results.csv"
    pub external_batch_path: Option<PathBuf>,

    /// Outcome column.
    /// Default: "target"
    pub target_column: String,

    /// Expected header of the raw file. `None` skips the header check.
    /// Default: the 13 heart-disease features followed by the outcome
    pub expected_schema: Option<Vec<String>>,

    /// Columns kept as text through normalization and mode-imputed.
    /// Default: empty
    pub text_columns: Vec<String>,

    /// Numeric columns re-typed as categorical before encoding.
    /// Default: ["cp"]
    pub categorical_columns: Vec<String>,

    /// Map any outcome value above zero to 1.
    /// Default: true
    pub binarize_outcome: bool,

    /// Strategy for imputing missing numeric values.
    /// Default: MedianThenKnn
    pub numeric_imputation: NumericImputation,

    /// Number of neighbors for KNN imputation.
    /// Default: 5
    pub knn_neighbors: usize,

    /// Fence width as a multiple of the inter-quartile range.
    /// Default: 1.5
    pub iqr_multiplier: f64,

    /// Age bin edges; bins are right-inclusive.
    /// Default: [0, 35, 50, 65, 120]
    pub age_bin_edges: Vec<f64>,

    /// One label per age bin.
    /// Default: ["young", "mid", "senior", "old"]
    pub age_bin_labels: Vec<String>,

    /// Columns summed (each scaled by its maximum) into the risk score.
    /// Default: ["age", "trestbps", "chol"]
    pub risk_components: Vec<String>,

    /// Number of trees in the importance forest.
    /// Default: 200
    pub n_estimators: usize,

    /// Maximum depth of each tree. `None` grows until leaves are pure.
    /// Default: None
    pub max_depth: Option<usize>,

    /// Fraction of rows held out from training (0.0 - 1.0, exclusive).
    /// Default: 0.30
    pub holdout_fraction: f64,

    /// Share of the holdout assigned to validation (0.0 - 1.0, exclusive).
    /// Default: 0.5
    pub validation_share: f64,

    /// Seed for the forest and the partitioner.
    /// Default: 42
    pub seed: u64,

    /// Whether to write the fitted transform as JSON.
    /// Default: true
    pub write_transform: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("data/raw/heart_raw.csv"),
            output_dir: PathBuf::from("data/processed"),
            report_dir: PathBuf::from("docs"),
            artifact_dir: PathBuf::from("outputs"),
            external_batch_path: Some(PathBuf::from("data/processed/ocr_results.csv")),
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
            expected_schema: Some(default_schema()),
            text_columns: Vec::new(),
            categorical_columns: vec!["cp".to_string()],
            binarize_outcome: true,
            numeric_imputation: NumericImputation::default(),
            knn_neighbors: 5,
            iqr_multiplier: 1.5,
            age_bin_edges: vec![0.0, 35.0, 50.0, 65.0, 120.0],
            age_bin_labels: ["young", "mid", "senior", "old"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            risk_components: ["age", "trestbps", "chol"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            n_estimators: 200,
            max_depth: None,
            holdout_fraction: 0.30,
            validation_share: 0.5,
            seed: 42,
            write_transform: true,
        }
    }
}

/// The heart-disease header: 13 features then the outcome.
pub fn default_schema() -> Vec<String> {
    HEART_FEATURE_COLUMNS
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(DEFAULT_TARGET_COLUMN.to_string()))
        .collect()
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load and validate a configuration from a JSON file.
    ///
    /// Fields absent from the file keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .context(format!("Reading config file {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if self.target_column.trim().is_empty() {
            return Err(ConfigValidationError::EmptyTargetColumn);
        }

        if let Some(schema) = &self.expected_schema
            && !schema.contains(&self.target_column)
        {
            return Err(ConfigValidationError::TargetNotInSchema(
                self.target_column.clone(),
            ));
        }

        if self.knn_neighbors == 0 {
            return Err(ConfigValidationError::InvalidKnnNeighbors(
                self.knn_neighbors,
            ));
        }

        if !(self.iqr_multiplier.is_finite() && self.iqr_multiplier > 0.0) {
            return Err(ConfigValidationError::InvalidIqrMultiplier(
                self.iqr_multiplier,
            ));
        }

        if self.age_bin_edges.len() < 2
            || self.age_bin_edges.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(ConfigValidationError::InvalidAgeBins(
                "edges must be strictly increasing with at least two values".to_string(),
            ));
        }

        if self.age_bin_labels.len() != self.age_bin_edges.len() - 1 {
            return Err(ConfigValidationError::InvalidAgeBins(format!(
                "{} label(s) for {} bin(s)",
                self.age_bin_labels.len(),
                self.age_bin_edges.len() - 1
            )));
        }

        if self.n_estimators == 0 {
            return Err(ConfigValidationError::InvalidForestSize(self.n_estimators));
        }

        for (field, value) in [
            ("holdout_fraction", self.holdout_fraction),
            ("validation_share", self.validation_share),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigValidationError::InvalidFraction {
                    field: field.to_string(),
                    value,
                });
            }
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Target column name must not be empty")]
    EmptyTargetColumn,

    #[error("Target column '{0}' is not part of the expected schema")]
    TargetNotInSchema(String),

    #[error("Invalid KNN neighbors: {0} (must be at least 1)")]
    InvalidKnnNeighbors(usize),

    #[error("Invalid IQR multiplier: {0} (must be a positive number)")]
    InvalidIqrMultiplier(f64),

    #[error("Invalid age bins: {0}")]
    InvalidAgeBins(String),

    #[error("Invalid forest size: {0} (must be at least 1 tree)")]
    InvalidForestSize(usize),

    #[error("Invalid fraction for '{field}': {value} (must be strictly between 0.0 and 1.0)")]
    InvalidFraction { field: String, value: f64 },
}

impl From<ConfigValidationError> for PrepError {
    fn from(err: ConfigValidationError) -> Self {
        PrepError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    input_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    report_dir: Option<PathBuf>,
    artifact_dir: Option<PathBuf>,
    external_batch_path: Option<Option<PathBuf>>,
    target_column: Option<String>,
    expected_schema: Option<Option<Vec<String>>>,
    text_columns: Option<Vec<String>>,
    categorical_columns: Option<Vec<String>>,
    binarize_outcome: Option<bool>,
    numeric_imputation: Option<NumericImputation>,
    knn_neighbors: Option<usize>,
    iqr_multiplier: Option<f64>,
    age_bins: Option<(Vec<f64>, Vec<String>)>,
    risk_components: Option<Vec<String>>,
    n_estimators: Option<usize>,
    max_depth: Option<Option<usize>>,
    holdout_fraction: Option<f64>,
    validation_share: Option<f64>,
    seed: Option<u64>,
    write_transform: Option<bool>,
}

impl PipelineConfigBuilder {
    /// Set the raw input CSV.
    pub fn input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = Some(path.into());
        self
    }

    /// Set the directory for processed tables.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set the directory for the milestone report.
    pub fn report_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(path.into());
        self
    }

    /// Set the directory for the importance ranking and fitted transform.
    pub fn artifact_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(path.into());
        self
    }

    /// Set (or clear) the external feature batch path.
    pub fn external_batch_path(mut self, path: Option<PathBuf>) -> Self {
        self.external_batch_path = Some(path);
        self
    }

    /// Set the outcome column.
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    /// Set (or disable) the expected raw header.
    pub fn expected_schema(mut self, schema: Option<Vec<String>>) -> Self {
        self.expected_schema = Some(schema);
        self
    }

    /// Set the columns kept as text.
    pub fn text_columns(mut self, columns: Vec<String>) -> Self {
        self.text_columns = Some(columns);
        self
    }

    /// Set the numeric columns re-typed as categorical before encoding.
    pub fn categorical_columns(mut self, columns: Vec<String>) -> Self {
        self.categorical_columns = Some(columns);
        self
    }

    /// Enable or disable outcome binarization.
    pub fn binarize_outcome(mut self, binarize: bool) -> Self {
        self.binarize_outcome = Some(binarize);
        self
    }

    /// Set the numeric imputation strategy.
    pub fn numeric_imputation(mut self, strategy: NumericImputation) -> Self {
        self.numeric_imputation = Some(strategy);
        self
    }

    /// Set the number of neighbors for KNN imputation.
    pub fn knn_neighbors(mut self, k: usize) -> Self {
        self.knn_neighbors = Some(k);
        self
    }

    /// Set the IQR fence multiplier.
    pub fn iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = Some(multiplier);
        self
    }

    /// Set the age bin edges and their labels.
    pub fn age_bins(mut self, edges: Vec<f64>, labels: Vec<String>) -> Self {
        self.age_bins = Some((edges, labels));
        self
    }

    /// Set the columns combined into the risk score.
    pub fn risk_components(mut self, columns: Vec<String>) -> Self {
        self.risk_components = Some(columns);
        self
    }

    /// Set the number of trees in the importance forest.
    pub fn n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = Some(n);
        self
    }

    /// Set the maximum tree depth.
    pub fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set the fraction of rows held out from training.
    pub fn holdout_fraction(mut self, fraction: f64) -> Self {
        self.holdout_fraction = Some(fraction);
        self
    }

    /// Set the share of the holdout assigned to validation.
    pub fn validation_share(mut self, share: f64) -> Self {
        self.validation_share = Some(share);
        self
    }

    /// Set the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enable or disable writing the fitted transform.
    pub fn write_transform(mut self, write: bool) -> Self {
        self.write_transform = Some(write);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> std::result::Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let (age_bin_edges, age_bin_labels) = self
            .age_bins
            .unwrap_or((defaults.age_bin_edges, defaults.age_bin_labels));

        let config = PipelineConfig {
            input_path: self.input_path.unwrap_or(defaults.input_path),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            report_dir: self.report_dir.unwrap_or(defaults.report_dir),
            artifact_dir: self.artifact_dir.unwrap_or(defaults.artifact_dir),
            external_batch_path: self
                .external_batch_path
                .unwrap_or(defaults.external_batch_path),
            target_column: self.target_column.unwrap_or(defaults.target_column),
            expected_schema: self.expected_schema.unwrap_or(defaults.expected_schema),
            text_columns: self.text_columns.unwrap_or(defaults.text_columns),
            categorical_columns: self
                .categorical_columns
                .unwrap_or(defaults.categorical_columns),
            binarize_outcome: self.binarize_outcome.unwrap_or(defaults.binarize_outcome),
            numeric_imputation: self.numeric_imputation.unwrap_or_default(),
            knn_neighbors: self.knn_neighbors.unwrap_or(defaults.knn_neighbors),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            age_bin_edges,
            age_bin_labels,
            risk_components: self.risk_components.unwrap_or(defaults.risk_components),
            n_estimators: self.n_estimators.unwrap_or(defaults.n_estimators),
            max_depth: self.max_depth.unwrap_or(defaults.max_depth),
            holdout_fraction: self.holdout_fraction.unwrap_or(defaults.holdout_fraction),
            validation_share: self.validation_share.unwrap_or(defaults.validation_share),
            seed: self.seed.unwrap_or(defaults.seed),
            write_transform: self.write_transform.unwrap_or(defaults.write_transform),
        };

        config.validate()?;
        Ok(config)
    }
}
