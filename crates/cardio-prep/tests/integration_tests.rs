//! Integration tests for the heart-disease preparation pipeline.
//!
//! These tests run the pipeline end to end on a generated 300-record table.

use cardio_prep::io::{read_csv, write_csv};
use cardio_prep::{
    ExternalFuser, FittedTransform, FusionStatus, Pipeline, PipelineConfig, PrepStage,
    ProgressUpdate, TypeNormalizer, assert_complete, load_raw_records,
};
use polars::prelude::*;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ============================================================================
// Helper Functions
// ============================================================================

const HEADER: &str = "age,sex,cp,trestbps,chol,fbs,restecg,thalach,exang,oldpeak,slope,ca,thal,target";

/// 300 records: `chol` missing on 10 rows and extreme on 5 others.
fn raw_csv() -> String {
    let mut body = String::from(HEADER);
    body.push('\n');
    for i in 0..300usize {
        let chol = if i % 30 == 7 {
            "?".to_string()
        } else if i % 60 == 13 {
            "900".to_string()
        } else {
            (200 + i % 60).to_string()
        };
        // Outcome values 2..=4 fold into the positive class.
        let target = match i % 5 {
            0 | 1 | 2 => 0,
            3 => 1,
            _ => 2 + i % 3,
        };
        writeln!(
            body,
            "{},{},{},{},{},{},{},{},{},{:.1},{},{},{},{}",
            30 + i % 48,
            i % 2,
            i % 4,
            110 + i % 50,
            chol,
            (i / 2) % 2,
            i % 3,
            120 + i % 70,
            (i / 3) % 2,
            (i % 40) as f64 / 10.0,
            i % 3,
            i % 4,
            1 + i % 3,
            target
        )
        .unwrap();
    }
    body
}

fn write_raw(dir: &Path) -> PathBuf {
    let path = dir.join("heart_raw.csv");
    std::fs::write(&path, raw_csv()).unwrap();
    path
}

fn test_config(dir: &Path) -> PipelineConfig {
    PipelineConfig::builder()
        .input_path(write_raw(dir))
        .output_dir(dir.join("processed"))
        .report_dir(dir.join("docs"))
        .artifact_dir(dir.join("outputs"))
        .external_batch_path(None)
        .n_estimators(10)
        .build()
        .unwrap()
}

fn pipeline(config: PipelineConfig) -> Pipeline {
    Pipeline::builder().config(config).build().unwrap()
}

fn load(config: &PipelineConfig) -> DataFrame {
    load_raw_records(&config.input_path, config).unwrap()
}

fn labels(df: &DataFrame) -> Vec<Option<i64>> {
    df.column("target")
        .unwrap()
        .as_materialized_series()
        .cast(&DataType::Int64)
        .unwrap()
        .i64()
        .unwrap()
        .into_iter()
        .collect()
}

fn positive_share(df: &DataFrame) -> f64 {
    let labels = labels(df);
    let positives = labels.iter().filter(|v| **v == Some(1)).count();
    positives as f64 / labels.len() as f64
}

// ============================================================================
// Full Pipeline Tests
// ============================================================================

#[test]
fn test_missing_and_extreme_cholesterol() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let raw = load(&config);
    assert_eq!(raw.height(), 300);

    let result = pipeline(config).process(raw, None).unwrap();
    let cleaned = &result.cleaning.cleaned;

    assert_eq!(result.cleaning.report.rows_before, 300);
    assert_eq!(cleaned.height(), 295);
    assert_eq!(result.rows_removed(), 5);
    assert_eq!(cleaned.column("chol").unwrap().null_count(), 0);
    assert_eq!(result.cleaning.report.imputation.cells_filled, 10);

    let chol = cleaned.column("chol").unwrap().f64().unwrap();
    assert!(chol.into_iter().flatten().all(|v| v < 900.0));
}

#[test]
fn test_outcome_is_binary_and_last() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let result = pipeline(config.clone()).process(load(&config), None).unwrap();

    let engineered = &result.engineering.engineered;
    let names = engineered.get_column_names();
    assert_eq!(names.last().unwrap().as_str(), "target");

    assert!(labels(engineered).into_iter().all(|v| matches!(v, Some(0) | Some(1))));
    assert!(result.cleaning.report.normalization.outcome_binarized > 0);
}

#[test]
fn test_pass_through_without_external_batch() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let result = pipeline(config.clone()).process(load(&config), None).unwrap();

    assert_eq!(result.fusion, FusionStatus::PassThrough);
    assert!(result.fused.equals_missing(&result.engineering.engineered));
    assert!(assert_complete(&result.fused).is_ok());
    assert!(result.milestone.validation_passed);
    assert!(!result.milestone.fusion.is_fused());
}

#[test]
fn test_split_sizes_and_stratification() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let result = pipeline(config.clone()).process(load(&config), None).unwrap();

    let splits = &result.splits;
    let rows = result.fused.height();
    let sizes: Vec<usize> = splits
        .partitions()
        .iter()
        .map(|p| p.features.height())
        .collect();
    assert_eq!(sizes.iter().sum::<usize>(), rows);
    assert!(sizes[0] > sizes[1] && sizes[0] > sizes[2]);
    assert!((sizes[1] as isize - sizes[2] as isize).abs() <= 1);

    let overall = positive_share(&result.fused);
    for partition in splits.partitions() {
        assert_eq!(partition.labels.width(), 1);
        assert!(partition.features.column("target").is_err());
        let share = positive_share(&partition.labels);
        assert!(
            (share - overall).abs() <= 0.05,
            "{} positive share {} vs overall {}",
            partition.name,
            share,
            overall
        );
    }
}

#[test]
fn test_same_seed_same_split() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let first = pipeline(config.clone()).process(load(&config), None).unwrap();
    let second = pipeline(config.clone()).process(load(&config), None).unwrap();

    assert_eq!(first.splits.train.indices, second.splits.train.indices);
    assert_eq!(first.splits.test.indices, second.splits.test.indices);
    assert_eq!(first.engineering.ranking, second.engineering.ranking);
}

#[test]
fn test_fusion_keeps_row_count() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let batch = df! {
        "systolic" => [Some(120i64), None, Some(140)],
        "cholesterol_ocr" => [Some(210i64), Some(190), None],
    }
    .unwrap();

    let result = pipeline(config.clone())
        .process(load(&config), Some(&batch))
        .unwrap();

    assert_eq!(result.fused.height(), result.engineering.engineered.height());
    assert_eq!(
        result.fusion,
        FusionStatus::Fused {
            columns: vec!["systolic".to_string(), "cholesterol_ocr".to_string()],
            padded_rows: result.fused.height() - 3,
        }
    );
    assert!(assert_complete(&result.fused).is_ok());

    let names = result.fused.get_column_names();
    assert_eq!(names.last().unwrap().as_str(), "target");
}

#[test]
fn test_fusion_rejects_duplicate_column() {
    let table = df! {
        "chol" => [1.0, 2.0],
        "target" => [0i64, 1],
    }
    .unwrap();
    let batch = df! { "chol" => [3.0] }.unwrap();

    let err = ExternalFuser::new("target")
        .fuse(&table, Some(&batch))
        .unwrap_err();
    assert_eq!(err.error_code(), "DUPLICATE_COLUMN");
}

#[test]
fn test_normalizer_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let normalizer = TypeNormalizer::from_config(&config);

    let (once, _) = normalizer.normalize(&load(&config)).unwrap();
    let (twice, report) = normalizer.normalize(&once).unwrap();

    assert!(once.equals_missing(&twice));
    assert_eq!(report.total_coercion_failures(), 0);
    assert_eq!(report.outcome_binarized, 0);
}

#[test]
fn test_encoding_is_deterministic_and_replayable() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pipeline = pipeline(config.clone());
    let cleaning = pipeline.clean(&load(&config)).unwrap();

    let first = pipeline.engineer(&cleaning.cleaned).unwrap();
    let second = pipeline.engineer(&cleaning.cleaned).unwrap();
    assert!(first.engineered.equals_missing(&second.engineered));
    assert_eq!(first.transform, second.transform);

    let path = dir.path().join("transform.json");
    first.transform.to_json_file(&path).unwrap();
    let restored = FittedTransform::from_json_file(&path).unwrap();
    assert_eq!(restored, first.transform);

    let replayed = restored.replay(&cleaning.cleaned).unwrap();
    assert!(replayed.equals_missing(&first.engineered));
}

#[test]
fn test_schema_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, "age,sex,target\n50,1,0\n").unwrap();

    let config = PipelineConfig::default();
    let err = load_raw_records(&path, &config).unwrap_err();
    assert_eq!(err.error_code(), "SCHEMA_MISMATCH");
}

// ============================================================================
// File-based Run
// ============================================================================

#[test]
fn test_run_writes_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let stages = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&stages);
    let result = Pipeline::builder()
        .config(config)
        .on_progress(move |update: ProgressUpdate| seen.lock().unwrap().push(update.stage))
        .build()
        .unwrap()
        .run()
        .unwrap();

    let processed = dir.path().join("processed");
    for name in [
        "heart_cleaned.csv",
        "cleaning_report.txt",
        "heart_features.csv",
        "X_train.csv",
        "y_train.csv",
        "X_val.csv",
        "y_val.csv",
        "X_test.csv",
        "y_test.csv",
    ] {
        assert!(processed.join(name).exists(), "missing {}", name);
    }

    let outputs = dir.path().join("outputs");
    for name in [
        "feature_importances.csv",
        "feature_transform.json",
        "dataset_summary_statistics.csv",
        "target_distribution.csv",
    ] {
        assert!(outputs.join(name).exists(), "missing {}", name);
    }

    let docs = dir.path().join("docs");
    let markdown = std::fs::read_to_string(docs.join("milestone_report.md")).unwrap();
    assert!(markdown.starts_with("# Milestone 1 Summary Report"));
    assert!(docs.join("milestone_report.json").exists());

    let report = std::fs::read_to_string(processed.join("cleaning_report.txt")).unwrap();
    assert!(report.starts_with("Rows before cleaning: 300\nRows after outlier removal: 295\n"));

    let cleaned = read_csv(processed.join("heart_cleaned.csv")).unwrap();
    assert_eq!(cleaned.height(), 295);
    let train = read_csv(processed.join("X_train.csv")).unwrap();
    assert_eq!(train.height(), result.splits.train.features.height());

    let stages = stages.lock().unwrap();
    assert_eq!(stages.first(), Some(&PrepStage::Loading));
    assert_eq!(stages.last(), Some(&PrepStage::Complete));
}

#[test]
fn test_run_fuses_batch_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());

    let batch_path = dir.path().join("ocr_results.csv");
    let batch = df! {
        "systolic" => [Some(130i64), Some(125)],
        "heart_rate" => [Some(72i64), None],
    }
    .unwrap();
    write_csv(&batch, &batch_path).unwrap();
    config.external_batch_path = Some(batch_path);

    let result = pipeline(config).run().unwrap();
    assert!(result.fusion.is_fused());
    assert_eq!(result.fused.height(), 295);
    assert!(result.fused.column("heart_rate").is_ok());
}

#[test]
fn test_run_with_missing_batch_passes_through() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.external_batch_path = Some(dir.path().join("absent.csv"));

    let result = pipeline(config).run().unwrap();
    assert_eq!(result.fusion, FusionStatus::PassThrough);
}
