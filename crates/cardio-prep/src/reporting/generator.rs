use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::fusion::FusionStatus;
use crate::importance::FeatureImportance;
use crate::imputers::ImputationMethod;
use crate::io::write_text;
use crate::partition::PartitionSummary;

/// Number of ranked features listed in the milestone report.
const TOP_FEATURES: usize = 5;

// ============================================================================
// Milestone Report
// ============================================================================

/// Run summary written as `milestone_report.md` and `milestone_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneReport {
    /// Local time the report was generated, `%Y-%m-%d %H:%M:%S`.
    pub generated_at: String,
    pub rows_before: usize,
    pub rows_after: usize,
    pub imputation_method: ImputationMethod,
    /// Feature columns in each split (outcome excluded).
    pub feature_count: usize,
    pub top_features: Vec<FeatureImportance>,
    pub splits: Vec<PartitionSummary>,
    pub fusion: FusionStatus,
    pub validation_passed: bool,
}

impl MilestoneReport {
    pub fn new(
        rows_before: usize,
        rows_after: usize,
        imputation_method: ImputationMethod,
        ranking: &[FeatureImportance],
        splits: Vec<PartitionSummary>,
        fusion: FusionStatus,
        validation_passed: bool,
    ) -> Self {
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            rows_before,
            rows_after,
            imputation_method,
            feature_count: splits.first().map_or(0, |s| s.columns),
            top_features: ranking.iter().take(TOP_FEATURES).cloned().collect(),
            splits,
            fusion,
            validation_passed,
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# Milestone 1 Summary Report");
        let _ = writeln!(md, "Generated on: {}", self.generated_at);
        let _ = writeln!(md);

        let _ = writeln!(md, "## Data Cleaning");
        let _ = writeln!(md, "- Rows before cleaning: {}", self.rows_before);
        let _ = writeln!(md, "- Rows after cleaning: {}", self.rows_after);
        let _ = writeln!(md, "- Imputation method: {}", self.imputation_method);
        let _ = writeln!(md);

        let _ = writeln!(md, "## Feature Engineering");
        let _ = writeln!(md, "- Total features after engineering: {}", self.feature_count);
        if !self.top_features.is_empty() {
            let top: Vec<String> = self
                .top_features
                .iter()
                .map(|f| format!("{} ({:.4})", f.feature, f.importance))
                .collect();
            let _ = writeln!(md, "- Top features by importance: {}", top.join(", "));
        }
        let _ = writeln!(md);

        let _ = writeln!(md, "## Splits");
        for split in &self.splits {
            let balance: Vec<String> = split
                .class_balance
                .iter()
                .map(|(class, share)| format!("{}: {:.3}", class, share))
                .collect();
            let _ = writeln!(
                md,
                "- {}: ({}, {}), Class balance: {{{}}}",
                split_title(&split.name),
                split.rows,
                split.columns,
                balance.join(", ")
            );
        }
        let _ = writeln!(md);

        let _ = writeln!(md, "## Notes");
        let _ = writeln!(
            md,
            "- OCR integration: {}",
            if self.fusion.is_fused() { "Yes" } else { "No" }
        );
        if let FusionStatus::Fused {
            columns,
            padded_rows,
        } = &self.fusion
        {
            let _ = writeln!(
                md,
                "- External columns (merged by row position): {}; padded rows: {}",
                columns.join(", "),
                padded_rows
            );
        }
        let _ = writeln!(
            md,
            "- Validation checks: {}",
            if self.validation_passed {
                "Passed (no missing values after processing)"
            } else {
                "Failed"
            }
        );
        md
    }
}

fn split_title(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Report Generator
// ============================================================================

/// Writes reports under a single directory.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    report_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(report_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_dir: report_dir.into(),
        }
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    /// Write the markdown and JSON forms of `report`, returning both paths.
    pub fn write_milestone(&self, report: &MilestoneReport) -> Result<(PathBuf, PathBuf)> {
        let md_path = self.report_dir.join("milestone_report.md");
        let json_path = self.report_dir.join("milestone_report.json");

        write_text(&md_path, &report.to_markdown())?;
        write_text(&json_path, &serde_json::to_string_pretty(report)?)?;

        info!("Milestone report generated at {}", md_path.display());
        Ok((md_path, json_path))
    }
}
