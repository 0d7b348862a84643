//! Progress reporting for the preparation pipeline.
//!
//! The pipeline runs its stages sequentially and reports each stage boundary
//! through a [`ProgressReporter`]. There is no cancellation: a run either
//! completes or fails at a stage.
//!
//! # Example
//!
//! ```rust,ignore
//! use cardio_prep::Pipeline;
//!
//! let result = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .process(raw, None)?;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stages of the preparation pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrepStage {
    /// Reading the raw file and checking its header
    Loading,
    /// Coercing features to numbers and the outcome to a label
    Normalization,
    /// Filling missing values
    Imputation,
    /// Removing records outside the IQR fences
    OutlierFiltering,
    /// Deriving features and fitting the encoding
    FeatureEngineering,
    /// Fitting the importance forest
    ImportanceRanking,
    /// Merging the external feature batch
    Fusion,
    /// Checking the table is complete
    Validation,
    /// Splitting into train/validation/test
    Partitioning,
    /// Writing tables and reports
    Reporting,
    /// Pipeline completed successfully
    Complete,
    /// Pipeline failed with an error
    Failed,
}

impl PrepStage {
    /// Stable identifier, also used to name the stage in errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Normalization => "normalization",
            Self::Imputation => "imputation",
            Self::OutlierFiltering => "outlier_filtering",
            Self::FeatureEngineering => "feature_engineering",
            Self::ImportanceRanking => "importance_ranking",
            Self::Fusion => "fusion",
            Self::Validation => "validation",
            Self::Partitioning => "partitioning",
            Self::Reporting => "reporting",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading Records",
            Self::Normalization => "Normalizing Types",
            Self::Imputation => "Imputing Values",
            Self::OutlierFiltering => "Filtering Outliers",
            Self::FeatureEngineering => "Engineering Features",
            Self::ImportanceRanking => "Ranking Features",
            Self::Fusion => "Fusing External Features",
            Self::Validation => "Validating",
            Self::Partitioning => "Partitioning",
            Self::Reporting => "Writing Reports",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of total run time this stage typically takes (0.0 - 1.0).
    ///
    /// The working stages sum to 1.0; terminal states weigh nothing.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Loading => 0.05,
            Self::Normalization => 0.05,
            Self::Imputation => 0.15,
            Self::OutlierFiltering => 0.05,
            Self::FeatureEngineering => 0.10,
            Self::ImportanceRanking => 0.40,
            Self::Fusion => 0.05,
            Self::Validation => 0.02,
            Self::Partitioning => 0.05,
            Self::Reporting => 0.08,
            Self::Complete | Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Complete => 1.0,
            Self::Failed => 0.0,
            _ => Self::WORKING
                .iter()
                .take_while(|stage| *stage != self)
                .map(|stage| stage.weight())
                .sum(),
        }
    }

    /// The working stages in execution order.
    pub const WORKING: [PrepStage; 10] = [
        Self::Loading,
        Self::Normalization,
        Self::Imputation,
        Self::OutlierFiltering,
        Self::FeatureEngineering,
        Self::ImportanceRanking,
        Self::Fusion,
        Self::Validation,
        Self::Partitioning,
        Self::Reporting,
    ];
}

impl fmt::Display for PrepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single progress notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current pipeline stage
    pub stage: PrepStage,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    /// Human-readable message describing current activity
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(stage: PrepStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: PrepStage::Complete,
            progress: 1.0,
            stage_progress: 1.0,
            message: message.into(),
        }
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stage: PrepStage::Failed,
            progress: 0.0,
            stage_progress: 0.0,
            message: message.into(),
        }
    }
}

/// Receiver of pipeline progress updates.
///
/// Implementations must be `Send + Sync` so a pipeline can be moved to a
/// worker thread while the reporter stays shared.
pub trait ProgressReporter: Send + Sync {
    /// Called at every stage boundary. Implementations should not block.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_stage_weights_sum() {
        let total: f32 = PrepStage::WORKING.iter().map(|s| s.weight()).sum();
        assert!((total - 1.0).abs() < 0.01, "Weights should sum to ~1.0");
    }

    #[test]
    fn test_base_progress_is_cumulative() {
        assert_eq!(PrepStage::Loading.base_progress(), 0.0);
        assert!((PrepStage::Imputation.base_progress() - 0.10).abs() < 1e-6);
        assert!(
            PrepStage::WORKING
                .windows(2)
                .all(|w| w[0].base_progress() < w[1].base_progress())
        );
        assert_eq!(PrepStage::Complete.base_progress(), 1.0);
    }

    #[test]
    fn test_progress_update_new() {
        let update = ProgressUpdate::new(PrepStage::Imputation, 0.5, "Imputing...");
        assert_eq!(update.stage, PrepStage::Imputation);
        assert_eq!(update.stage_progress, 0.5);
        assert!((update.progress - 0.175).abs() < 1e-6);
    }

    #[test]
    fn test_terminal_updates() {
        assert_eq!(ProgressUpdate::complete("Done").progress, 1.0);
        let failed = ProgressUpdate::failed("boom");
        assert_eq!(failed.stage, PrepStage::Failed);
        assert_eq!(failed.message, "boom");
    }

    #[test]
    fn test_closure_progress_reporter() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report(ProgressUpdate::new(PrepStage::Loading, 0.0, "Test"));
        reporter.report(ProgressUpdate::complete("Done"));

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stage_json_values() {
        for stage in PrepStage::WORKING {
            let json = serde_json::to_string(&stage).expect("Should serialize");
            assert_eq!(json, format!("\"{}\"", stage.as_str()));
        }
    }

    #[test]
    fn test_progress_reporter_across_threads() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = Arc::new(ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let reporter_clone = reporter.clone();
        let handle = std::thread::spawn(move || {
            reporter_clone.report(ProgressUpdate::new(PrepStage::Partitioning, 0.5, "bg"));
        });

        handle.join().expect("Thread should not panic");
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }
}
