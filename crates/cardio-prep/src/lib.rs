//! Heart-disease data preparation library.
//!
//! Turns a raw heart-disease CSV into model-ready train/validation/test
//! tables, built on Polars.
//!
//! # Overview
//!
//! The stages run in order, each taking a table and returning a new one:
//!
//! - **Normalization**: features coerced to numbers, outcome to a 0/1 label
//! - **Imputation**: per-column median, KNN for remaining gaps, mode for text
//! - **Outlier filtering**: records outside any column's IQR fence are removed
//! - **Feature engineering**: age groups, risk score, standardization and
//!   one-hot encoding with a replayable fitted transform
//! - **Importance ranking**: seeded random forest, for reporting only
//! - **External fusion**: optional positional merge of OCR-derived features
//! - **Validation and partitioning**: completeness check, then a stratified
//!   70/15/15 split
//! - **Reporting**: cleaning report, milestone report, summary statistics
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cardio_prep::{Pipeline, PipelineConfig};
//!
//! // Read data/raw/heart_raw.csv, write everything under data/, docs/ and outputs/
//! let result = Pipeline::builder().build()?.run()?;
//! println!("{} rows kept", result.cleaning.cleaned.height());
//!
//! // Or in memory, with progress reporting
//! let config = PipelineConfig::builder()
//!     .iqr_multiplier(3.0)
//!     .seed(7)
//!     .build()?;
//!
//! let result = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .process(raw, None)?;
//! ```
//!
//! # Errors
//!
//! Every stage returns [`PrepError`]. A failing stage aborts the run with
//! [`PrepError::StageFailed`], naming the stage and carrying its error.

pub mod cleaner;
pub mod config;
pub mod error;
pub mod features;
pub mod fusion;
pub mod importance;
pub mod imputers;
pub mod io;
pub mod ocr;
pub mod partition;
pub mod pipeline;
pub mod reporting;
pub mod types;
pub mod utils;
pub mod validation;

// Re-exports for convenient access
pub use cleaner::{NormalizationReport, TypeNormalizer, load_raw_records, validate_schema};
pub use config::{
    ConfigValidationError, NumericImputation, PipelineConfig, PipelineConfigBuilder,
};
pub use error::{PrepError, Result, ResultExt};
pub use features::{
    DerivationParams, DerivationReport, FeatureDeriver, FittedTransform, engineer_features,
};
pub use fusion::{ExternalFuser, FusionStatus};
pub use importance::{FeatureImportance, ImportanceRanker};
pub use imputers::{ImputationEngine, ImputationMethod, ImputationReport, KNNImputer};
pub use ocr::{MedicalReading, field_accuracy, parse_medical_values, readings_to_frame};
pub use partition::{SplitManifest, StratifiedPartitioner};
pub use pipeline::{
    ClosureProgressReporter, OutlierFilter, OutlierReport, Pipeline, PipelineBuilder, PrepStage,
    ProgressReporter, ProgressUpdate,
};
pub use reporting::{CleaningReport, MilestoneReport, ReportGenerator, summarize};
pub use types::{CleaningResult, EngineeringResult, PipelineResult};
pub use validation::assert_complete;
