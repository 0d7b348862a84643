//! Report generation module.
//!
//! - [`CleaningReport`]: plain-text summary of normalization, imputation and
//!   outlier removal (`cleaning_report.txt`).
//! - [`MilestoneReport`]: run summary with split shapes and class balance,
//!   written by [`ReportGenerator`] as markdown and JSON.
//! - [`summarize`]: descriptive statistics and the outcome distribution.
//!
//! # Example
//!
//! ```rust,ignore
//! use cardio_prep::reporting::{MilestoneReport, ReportGenerator};
//!
//! let generator = ReportGenerator::new("docs");
//! let (md, json) = generator.write_milestone(&report)?;
//! ```

mod cleaning;
mod generator;
mod summary;

pub use cleaning::CleaningReport;
pub use generator::{MilestoneReport, ReportGenerator};
pub use summary::{DatasetSummary, summarize};
