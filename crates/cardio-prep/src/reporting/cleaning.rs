use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

use crate::cleaner::NormalizationReport;
use crate::error::Result;
use crate::imputers::{ImputationMethod, ImputationReport};
use crate::io::write_text;
use crate::pipeline::outliers::OutlierReport;

/// Everything the cleaning stages did, for `cleaning_report.txt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub normalization: NormalizationReport,
    pub imputation: ImputationReport,
    pub outliers: OutlierReport,
}

impl CleaningReport {
    pub fn new(
        normalization: NormalizationReport,
        imputation: ImputationReport,
        outliers: OutlierReport,
    ) -> Self {
        Self {
            rows_before: outliers.rows_before,
            rows_after: outliers.rows_after,
            normalization,
            imputation,
            outliers,
        }
    }

    /// Plain-text summary. The first three lines are fixed; details follow.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Rows before cleaning: {}", self.rows_before);
        let _ = writeln!(out, "Rows after outlier removal: {}", self.rows_after);
        let _ = writeln!(
            out,
            "Imputation: {}. Outliers removed by IQR.",
            imputation_plan(self.imputation.method)
        );
        let _ = writeln!(out);

        let _ = writeln!(out, "Imputation method used: {}", self.imputation.method);
        let _ = writeln!(out, "Cells imputed: {}", self.imputation.cells_filled);
        for step in &self.imputation.processing_steps {
            let _ = writeln!(out, "  - {}", step);
        }

        let _ = writeln!(
            out,
            "Values failing numeric coercion: {}",
            self.normalization.total_coercion_failures()
        );
        for (column, count) in &self.normalization.coercion_failures {
            let _ = writeln!(out, "  - {}: {}", column, count);
        }
        if self.normalization.outcome_defaulted > 0 {
            let _ = writeln!(
                out,
                "Outcome values defaulted to 0: {}",
                self.normalization.outcome_defaulted
            );
        }
        if self.normalization.outcome_binarized > 0 {
            let _ = writeln!(
                out,
                "Outcome values folded into class 1: {}",
                self.normalization.outcome_binarized
            );
        }

        let _ = writeln!(out, "Rows removed as outliers: {}", self.outliers.rows_removed());
        for fence in self.outliers.fences.iter().filter(|f| f.violations > 0) {
            let _ = writeln!(
                out,
                "  - {}: {} value(s) outside [{:.3}, {:.3}]",
                fence.column, fence.violations, fence.lower, fence.upper
            );
        }
        out
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        write_text(path, &self.to_text())
    }
}

fn imputation_plan(method: ImputationMethod) -> &'static str {
    match method {
        ImputationMethod::Median | ImputationMethod::MedianThenKnn => {
            "median then KNN (if needed)"
        }
        ImputationMethod::Knn => "KNN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::outliers::ColumnFence;

    fn report() -> CleaningReport {
        CleaningReport::new(
            NormalizationReport {
                coercion_failures: vec![("ca".to_string(), 4)],
                outcome_defaulted: 0,
                outcome_binarized: 2,
            },
            ImputationReport {
                method: ImputationMethod::Median,
                cells_filled: 6,
                processing_steps: vec!["Filled 6 missing value(s) in 'ca' with median 0".to_string()],
            },
            OutlierReport {
                rows_before: 303,
                rows_after: 280,
                fences: vec![ColumnFence {
                    column: "chol".to_string(),
                    q1: 211.0,
                    q3: 274.5,
                    lower: 115.75,
                    upper: 369.75,
                    violations: 5,
                }],
            },
        )
    }

    #[test]
    fn test_text_starts_with_fixed_lines() {
        let text = report().to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Rows before cleaning: 303");
        assert_eq!(lines[1], "Rows after outlier removal: 280");
        assert_eq!(
            lines[2],
            "Imputation: median then KNN (if needed). Outliers removed by IQR."
        );
        assert!(text.contains("Imputation method used: median"));
        assert!(text.contains("  - ca: 4"));
        assert!(text.contains("chol: 5 value(s)"));
        assert!(!text.contains("defaulted"));
    }

    #[test]
    fn test_third_line_follows_knn_strategy() {
        let mut report = report();
        report.imputation.method = ImputationMethod::Knn;
        let text = report.to_text();
        assert_eq!(
            text.lines().nth(2),
            Some("Imputation: KNN. Outliers removed by IQR.")
        );
        assert!(text.contains("Imputation method used: knn"));
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed").join("cleaning_report.txt");
        report().write(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("Rows removed as outliers: 23"));
    }
}
