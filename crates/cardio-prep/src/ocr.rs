//! Parsing of recognized report text into an external feature batch.
//!
//! Image capture and text recognition happen elsewhere; this module starts
//! from the recognized text.

use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, ResultExt};

static BLOOD_PRESSURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2,3})\s*/\s*(\d{2,3})").expect("Invalid regex: blood pressure")
});

static CHOLESTEROL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(cholesterol|chol)\D*(\d{2,4})").expect("Invalid regex: cholesterol")
});

static HEART_RATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(heart rate|hr)\D*(\d{2,3})").expect("Invalid regex: heart rate")
});

/// Column names of the batch produced by [`readings_to_frame`].
pub const READING_COLUMNS: [&str; 4] = ["systolic", "diastolic", "cholesterol", "heart_rate"];

/// Values found in one report. Fields not found stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalReading {
    pub systolic: Option<i64>,
    pub diastolic: Option<i64>,
    pub cholesterol: Option<i64>,
    pub heart_rate: Option<i64>,
}

impl MedicalReading {
    fn fields(&self) -> [Option<i64>; 4] {
        [self.systolic, self.diastolic, self.cholesterol, self.heart_rate]
    }
}

/// Extract blood pressure (`120/80`), cholesterol (`Chol: 200`) and heart
/// rate (`HR 72`) from free text. The first match of each pattern wins.
pub fn parse_medical_values(text: &str) -> MedicalReading {
    let mut reading = MedicalReading::default();

    if let Some(caps) = BLOOD_PRESSURE.captures(text) {
        reading.systolic = caps[1].parse().ok();
        reading.diastolic = caps[2].parse().ok();
    }
    if let Some(caps) = CHOLESTEROL.captures(text) {
        reading.cholesterol = caps[2].parse().ok();
    }
    if let Some(caps) = HEART_RATE.captures(text) {
        reading.heart_rate = caps[2].parse().ok();
    }

    reading
}

/// One row per reading, one nullable integer column per field.
pub fn readings_to_frame(readings: &[MedicalReading]) -> Result<DataFrame> {
    let columns = READING_COLUMNS
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let values: Vec<Option<i64>> = readings.iter().map(|r| r.fields()[idx]).collect();
            Column::new((*name).into(), values)
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Percentage of ground-truth fields the parsed reading got exactly right.
///
/// Only fields present in `truth` are scored; `None` when there are none.
pub fn field_accuracy(parsed: &MedicalReading, truth: &MedicalReading) -> Option<f64> {
    let scored: Vec<bool> = parsed
        .fields()
        .iter()
        .zip(truth.fields())
        .filter_map(|(p, t)| t.map(|t| *p == Some(t)))
        .collect();
    if scored.is_empty() {
        return None;
    }
    let correct = scored.iter().filter(|ok| **ok).count();
    Some(correct as f64 / scored.len() as f64 * 100.0)
}

/// Parse every `.txt` transcript in `dir`, in file-name order.
pub fn parse_transcript_dir(dir: impl AsRef<Path>) -> Result<Vec<(PathBuf, MedicalReading)>> {
    let dir = dir.as_ref();
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .context(format!("Reading transcript directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("txt")))
        .collect();
    paths.sort();

    let mut readings = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(&path)
            .context(format!("Reading transcript {}", path.display()))?;
        let reading = parse_medical_values(&text);
        let found = reading.fields().iter().filter(|f| f.is_some()).count();
        if found == 0 {
            warn!("No medical values found in {}", path.display());
        } else {
            debug!("{}: {:?}", path.display(), reading);
        }
        readings.push((path, reading));
    }

    info!("Parsed {} transcript(s) from {}", readings.len(), dir.display());
    Ok(readings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parses_all_fields() {
        let text = "Patient vitals\nBP: 120 / 80 mmHg\nCholesterol: 190 mg/dL\nHeart Rate: 72 bpm";
        assert_eq!(
            parse_medical_values(text),
            MedicalReading {
                systolic: Some(120),
                diastolic: Some(80),
                cholesterol: Some(190),
                heart_rate: Some(72),
            }
        );
    }

    #[test]
    fn test_short_labels_are_case_insensitive() {
        let reading = parse_medical_values("CHOL 245, hr 88");
        assert_eq!(reading.cholesterol, Some(245));
        assert_eq!(reading.heart_rate, Some(88));
        assert_eq!(reading.systolic, None);
    }

    #[test]
    fn test_missing_fields_stay_empty() {
        assert_eq!(parse_medical_values("nothing legible"), MedicalReading::default());
    }

    #[test]
    fn test_frame_has_nulls_for_missing_fields() {
        let readings = vec![
            parse_medical_values("130/85 chol 210"),
            parse_medical_values("HR 64"),
        ];
        let df = readings_to_frame(&readings).unwrap();
        assert_eq!(df.shape(), (2, 4));
        assert_eq!(df.column("systolic").unwrap().null_count(), 1);
        assert_eq!(df.column("heart_rate").unwrap().null_count(), 1);
    }

    #[test]
    fn test_field_accuracy() {
        let truth = MedicalReading {
            systolic: Some(120),
            diastolic: Some(80),
            cholesterol: Some(190),
            heart_rate: Some(72),
        };
        let parsed = MedicalReading {
            systolic: Some(120),
            diastolic: Some(80),
            cholesterol: Some(180),
            heart_rate: None,
        };
        assert_eq!(field_accuracy(&parsed, &truth), Some(50.0));
        assert_eq!(field_accuracy(&parsed, &MedicalReading::default()), None);
    }

    #[test]
    fn test_transcript_dir_reads_only_txt_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "HR 70").unwrap();
        fs::write(dir.path().join("a.txt"), "140/90").unwrap();
        fs::write(dir.path().join("scan.png"), "not text").unwrap();

        let readings = parse_transcript_dir(dir.path()).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].1.systolic, Some(140));
        assert_eq!(readings[1].1.heart_rate, Some(70));
    }
}
