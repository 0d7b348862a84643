//! Main preparation pipeline module.
//!
//! This module provides the core `Pipeline` struct and builder for
//! composing the preparation stages.

use crate::cleaner::{TypeNormalizer, load_raw_records};
use crate::config::{ConfigValidationError, PipelineConfig};
use crate::error::Result;
use crate::features::engineer_features;
use crate::fusion::ExternalFuser;
use crate::importance::{ImportanceRanker, ranking_to_frame};
use crate::imputers::ImputationEngine;
use crate::io::{read_csv, write_csv};
use crate::partition::StratifiedPartitioner;
use crate::pipeline::outliers::OutlierFilter;
use crate::pipeline::progress::{
    ClosureProgressReporter, PrepStage, ProgressReporter, ProgressUpdate,
};
use crate::reporting::{CleaningReport, MilestoneReport, ReportGenerator, summarize};
use crate::types::{CleaningResult, EngineeringResult, PipelineResult};
use crate::validation::assert_complete;
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// The heart-disease preparation pipeline.
///
/// Use [`Pipeline::builder()`] to create a pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use cardio_prep::{Pipeline, PipelineConfig};
///
/// // In memory
/// let result = Pipeline::builder()
///     .config(PipelineConfig::default())
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .process(raw, None)?;
///
/// // From and to the configured paths
/// let result = Pipeline::builder().build()?.run()?;
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

// Ensure Pipeline is Send (can be moved to another thread)
static_assertions::assert_impl_all!(Pipeline: Send);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage on an in-memory raw table.
    ///
    /// `raw` is the table as read from disk (text columns). `external` is the
    /// optional external feature batch. Nothing is written.
    ///
    /// # Errors
    ///
    /// The first failing stage aborts the run with
    /// [`PrepError::StageFailed`](crate::error::PrepError::StageFailed)
    /// naming the stage and carrying its error.
    pub fn process(&self, raw: DataFrame, external: Option<&DataFrame>) -> Result<PipelineResult> {
        self.finish(self.process_internal(raw, external))
    }

    /// Load inputs from the configured paths, run every stage and write all
    /// tables and reports.
    pub fn run(&self) -> Result<PipelineResult> {
        self.finish(self.run_internal())
    }

    /// Normalization, imputation and outlier removal.
    pub fn clean(&self, raw: &DataFrame) -> Result<CleaningResult> {
        let (normalized, normalization) =
            self.stage(PrepStage::Normalization, "Normalizing column types", || {
                TypeNormalizer::from_config(&self.config).normalize(raw)
            })?;

        let (imputed, imputation) =
            self.stage(PrepStage::Imputation, "Imputing missing values", || {
                ImputationEngine::from_config(&self.config).impute(&normalized)
            })?;

        let (cleaned, outliers) =
            self.stage(PrepStage::OutlierFiltering, "Filtering outliers", || {
                OutlierFilter::from_config(&self.config).filter(&imputed)
            })?;

        Ok(CleaningResult {
            normalized,
            cleaned,
            report: CleaningReport::new(normalization, imputation, outliers),
        })
    }

    /// Derivation, encoding and importance ranking on a cleaned table.
    pub fn engineer(&self, cleaned: &DataFrame) -> Result<EngineeringResult> {
        let (engineered, transform, derivation) = self.stage(
            PrepStage::FeatureEngineering,
            "Deriving and encoding features",
            || engineer_features(cleaned, &self.config),
        )?;
        info!("Engineered schema: [{}]", column_list(&engineered));

        let ranking = self.stage(
            PrepStage::ImportanceRanking,
            "Ranking feature importance",
            || ImportanceRanker::from_config(&self.config).rank(&engineered),
        )?;

        Ok(EngineeringResult {
            engineered,
            transform,
            derivation,
            ranking,
        })
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    /// Announce `stage`, run it and tag any error with the stage name.
    fn stage<T>(
        &self,
        stage: PrepStage,
        message: &str,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        info!("{}...", message);
        self.report_progress(ProgressUpdate::new(stage, 0.0, message));
        f().map_err(|e| e.in_stage(stage.as_str()))
    }

    fn finish(&self, outcome: Result<PipelineResult>) -> Result<PipelineResult> {
        match outcome {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Pipeline completed successfully"));
                Ok(result)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    fn process_internal(
        &self,
        raw: DataFrame,
        external: Option<&DataFrame>,
    ) -> Result<PipelineResult> {
        let start_time = Instant::now();
        info!("Starting preparation pipeline...");

        let mut processing_steps: Vec<String> = Vec::new();

        let cleaning = self.clean(&raw)?;
        let report = &cleaning.report;
        processing_steps.push(format!(
            "Normalized {} columns ({} value(s) failed numeric coercion)",
            cleaning.normalized.width(),
            report.normalization.total_coercion_failures()
        ));
        processing_steps.push(format!(
            "Imputed {} cell(s) using {}",
            report.imputation.cells_filled, report.imputation.method
        ));
        processing_steps.extend(report.imputation.processing_steps.iter().cloned());
        processing_steps.push(format!(
            "Removed {} outlier row(s): {} -> {}",
            report.outliers.rows_removed(),
            report.rows_before,
            report.rows_after
        ));

        let summary = summarize(&cleaning.normalized, &self.config.target_column)?;

        let engineering = self.engineer(&cleaning.cleaned)?;
        processing_steps.push(format!(
            "Engineered {} feature(s): [{}]",
            engineering.transform.feature_names().len(),
            engineering.transform.feature_names().join(", ")
        ));

        let (fused, fusion) = self.stage(PrepStage::Fusion, "Fusing external features", || {
            ExternalFuser::new(self.config.target_column.clone())
                .fuse(&engineering.engineered, external)
        })?;
        processing_steps.push(format!("External features: {}", fusion));
        if fusion.is_fused() {
            info!("Fused schema: [{}]", column_list(&fused));
        }

        self.stage(PrepStage::Validation, "Checking for missing values", || {
            assert_complete(&fused)
        })?;

        let splits = self.stage(PrepStage::Partitioning, "Partitioning", || {
            StratifiedPartitioner::from_config(&self.config).split(&fused)
        })?;
        let split_summaries = splits.summaries()?;
        for split in &split_summaries {
            debug!(
                "{}: {} rows x {} columns, class balance {:?}",
                split.name, split.rows, split.columns, split.class_balance
            );
            processing_steps.push(format!(
                "Split '{}': ({}, {})",
                split.name, split.rows, split.columns
            ));
        }

        let milestone = MilestoneReport::new(
            report.rows_before,
            report.rows_after,
            report.imputation.method,
            &engineering.ranking,
            split_summaries,
            fusion.clone(),
            splits.is_complete(),
        );

        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!("Pipeline finished in {} ms", duration_ms);

        Ok(PipelineResult {
            cleaning,
            engineering,
            fused,
            fusion,
            splits,
            summary,
            milestone,
            processing_steps,
            duration_ms,
        })
    }

    fn run_internal(&self) -> Result<PipelineResult> {
        let config = &self.config;

        let (raw, external) = self.stage(PrepStage::Loading, "Loading input files", || {
            let raw = load_raw_records(&config.input_path, config)?;
            let external = match &config.external_batch_path {
                Some(path) if path.exists() => {
                    info!("Fusing external batch from {}", path.display());
                    Some(read_csv(path)?)
                }
                Some(path) => {
                    debug!("External batch {} not found", path.display());
                    None
                }
                None => None,
            };
            Ok((raw, external))
        })?;

        let result = self.process_internal(raw, external.as_ref())?;

        self.stage(PrepStage::Reporting, "Writing tables and reports", || {
            self.write_outputs(&result)
        })?;
        Ok(result)
    }

    fn write_outputs(&self, result: &PipelineResult) -> Result<()> {
        let config = &self.config;
        let out = &config.output_dir;
        let artifacts = &config.artifact_dir;

        write_csv(&result.cleaning.cleaned, out.join("heart_cleaned.csv"))?;
        result
            .cleaning
            .report
            .write(out.join("cleaning_report.txt"))?;
        write_csv(&result.engineering.engineered, out.join("heart_features.csv"))?;
        result.splits.write(out)?;

        write_csv(
            &ranking_to_frame(&result.engineering.ranking)?,
            artifacts.join("feature_importances.csv"),
        )?;
        if config.write_transform {
            result
                .engineering
                .transform
                .to_json_file(artifacts.join("feature_transform.json"))?;
        }
        result.summary.write(artifacts)?;

        ReportGenerator::new(config.report_dir.clone()).write_milestone(&result.milestone)?;
        Ok(())
    }
}

fn column_list(df: &DataFrame) -> String {
    df.get_column_names()
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builder for creating a [`Pipeline`] instance.
///
/// Use [`Pipeline::builder()`] to get started.
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

// Ensure PipelineBuilder is Send (can be moved to another thread during construction)
static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// This is a convenience method for simple progress handling.
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            config,
            progress_reporter: self.progress_reporter,
        })
    }
}
