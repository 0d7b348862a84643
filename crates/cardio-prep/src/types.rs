//! Values returned by the pipeline stages.

use polars::prelude::*;

use crate::features::{DerivationReport, FittedTransform};
use crate::fusion::FusionStatus;
use crate::importance::FeatureImportance;
use crate::partition::SplitManifest;
use crate::reporting::{CleaningReport, DatasetSummary, MilestoneReport};

/// Output of normalization, imputation and outlier removal.
#[derive(Debug, Clone)]
pub struct CleaningResult {
    /// Normalized table before imputation, kept for the summary statistics.
    pub normalized: DataFrame,
    /// Complete table after outlier removal.
    pub cleaned: DataFrame,
    pub report: CleaningReport,
}

/// Output of derivation, encoding and importance ranking.
#[derive(Debug, Clone)]
pub struct EngineeringResult {
    /// All-numeric table with the outcome as its last column.
    pub engineered: DataFrame,
    /// Encoding learned from the cleaned table, replayable on new data.
    pub transform: FittedTransform,
    pub derivation: DerivationReport,
    /// Features by descending importance.
    pub ranking: Vec<FeatureImportance>,
}

/// Everything a full run produced.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub cleaning: CleaningResult,
    pub engineering: EngineeringResult,
    /// Engineered table after external fusion (unchanged on pass-through).
    pub fused: DataFrame,
    pub fusion: FusionStatus,
    pub splits: SplitManifest,
    pub summary: DatasetSummary,
    pub milestone: MilestoneReport,
    /// Human-readable log of what each stage did.
    pub processing_steps: Vec<String>,
    pub duration_ms: u64,
}

impl PipelineResult {
    pub fn rows_removed(&self) -> usize {
        self.cleaning.report.outliers.rows_removed()
    }
}
