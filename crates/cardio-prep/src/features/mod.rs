//! Feature derivation and encoding.
//!
//! [`FeatureDeriver`] adds clinical features to the cleaned table;
//! [`FittedTransform`] turns the result into an all-numeric matrix with the
//! outcome as its last column.

mod derive;
mod encoder;

pub use derive::{
    AGE_GROUP_COLUMN, DerivationParams, DerivationReport, FeatureDeriver, RISK_SCORE_COLUMN,
};
pub use encoder::{FittedTransform, OneHotEncoder, StandardScaler};

use polars::prelude::*;

use crate::config::PipelineConfig;
use crate::error::Result;

/// Derive features, fit the transform on the derived table and apply it.
///
/// The returned transform carries the derivation, so
/// [`FittedTransform::replay`] on the same cleaned table gives the same
/// output.
pub fn engineer_features(
    cleaned: &DataFrame,
    config: &PipelineConfig,
) -> Result<(DataFrame, FittedTransform, DerivationReport)> {
    let derivation = FeatureDeriver::from_config(config).fit(cleaned)?;
    let (derived, report) = derivation.apply(cleaned)?;
    let transform =
        FittedTransform::fit(&derived, &config.target_column)?.with_derivation(derivation);
    let encoded = transform.apply(&derived)?;
    Ok((encoded, transform, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{column_as_f64, column_as_strings};

    fn cleaned() -> DataFrame {
        df! {
            "age" => [29.0, 45.0, 58.0, 71.0],
            "cp" => [0.0, 1.0, 2.0, 3.0],
            "trestbps" => [120.0, 130.0, 140.0, 150.0],
            "chol" => [200.0, 220.0, 240.0, 260.0],
            "target" => [0i64, 1, 0, 1],
        }
        .unwrap()
    }

    #[test]
    fn test_engineer_features_outcome_last() {
        let cleaned = cleaned();

        let (encoded, transform, report) =
            engineer_features(&cleaned, &PipelineConfig::default()).unwrap();

        let names: Vec<String> = encoded
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names.last().map(String::as_str), Some("target"));
        assert_eq!(names.len(), transform.feature_names().len() + 1);
        // four age groups and four chest-pain codes, one reference each
        assert!(names.contains(&"cp_3".to_string()));
        assert!(!names.contains(&"cp_0".to_string()));
        assert!(names.contains(&"age_group_young".to_string()));
        assert!(!names.contains(&"age_group_mid".to_string()));
        assert!(names.contains(&RISK_SCORE_COLUMN.to_string()));
        assert_eq!(report.added.len(), 2);
        assert_eq!(encoded.get_columns().iter().map(|c| c.null_count()).sum::<usize>(), 0);
    }

    #[test]
    fn test_replay_matches_engineered_table() {
        let cleaned = cleaned();
        let (encoded, transform, _) =
            engineer_features(&cleaned, &PipelineConfig::default()).unwrap();
        assert!(transform.replay(&cleaned).unwrap().equals_missing(&encoded));
    }

    #[test]
    fn test_replay_uses_fitted_derivation() {
        let (_, transform, _) = engineer_features(&cleaned(), &PipelineConfig::default()).unwrap();
        let derivation = transform.derivation.clone().unwrap();
        assert_eq!(derivation.age_fill_label.as_deref(), Some("young"));
        assert_eq!(
            derivation.risk_scales,
            vec![
                ("age".to_string(), 71.0),
                ("trestbps".to_string(), 150.0),
                ("chol".to_string(), 260.0),
            ]
        );

        // Larger maxima and an out-of-range age in the new batch.
        let batch = df! {
            "age" => [142.0, 40.0],
            "cp" => [1.0, 2.0],
            "trestbps" => [300.0, 150.0],
            "chol" => [520.0, 260.0],
        }
        .unwrap();
        let (derived, report) = derivation.apply(&batch).unwrap();

        assert_eq!(report.ages_out_of_range, 1);
        let groups = column_as_strings(&derived, AGE_GROUP_COLUMN).unwrap();
        assert_eq!(groups[0].as_deref(), Some("young"));
        let score = column_as_f64(&derived, RISK_SCORE_COLUMN).unwrap();
        assert!((score[0].unwrap() - (142.0 / 71.0 + 2.0 + 2.0)).abs() < 1e-12);

        let encoded = transform.replay(&batch).unwrap();
        assert_eq!(encoded.height(), 2);
        assert_eq!(encoded.width(), transform.feature_names().len());
    }
}
