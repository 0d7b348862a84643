//! Feature-importance ranking with a seeded random forest.
//!
//! Trees use Gini impurity, bootstrap samples and `ceil(sqrt(n_features))`
//! candidate features per split. Importance is the impurity decrease each
//! feature contributes, normalized per tree, averaged over the forest and
//! normalized again to sum to 1. The ranking is for reporting only; the
//! table is never modified.

use polars::prelude::*;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{PrepError, Result};
use crate::utils::{column_as_f64, require_column};

/// Importance score of one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Ranks the features of an encoded table by random-forest importance.
#[derive(Debug, Clone)]
pub struct ImportanceRanker {
    target_column: String,
    n_estimators: usize,
    max_depth: Option<usize>,
    seed: u64,
}

impl ImportanceRanker {
    pub fn new(target_column: impl Into<String>, n_estimators: usize, seed: u64) -> Self {
        Self {
            target_column: target_column.into(),
            n_estimators: n_estimators.max(1),
            max_depth: None,
            seed,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.target_column.clone(), config.n_estimators, config.seed)
            .with_max_depth(config.max_depth)
    }

    /// Fit the forest and return features sorted by descending importance.
    ///
    /// Equal scores keep the table's column order.
    pub fn rank(&self, df: &DataFrame) -> Result<Vec<FeatureImportance>> {
        let features: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|name| *name != self.target_column)
            .collect();

        let columns = self.feature_matrix(df, &features)?;
        let labels = self.class_labels(df)?;
        let n_samples = labels.len();
        let n_classes = labels.iter().max().map_or(0, |&c| c + 1);

        let mut totals = vec![0.0; features.len()];
        if n_samples > 0 && !features.is_empty() {
            let grower = TreeGrower {
                columns: &columns,
                labels: &labels,
                n_classes,
                max_features: ((features.len() as f64).sqrt().ceil() as usize).max(1),
                max_depth: self.max_depth,
            };

            for tree_idx in 0..self.n_estimators {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(tree_idx as u64));
                let bootstrap: Vec<usize> =
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

                let mut importances = vec![0.0; features.len()];
                grower.grow(&bootstrap, 0, &mut rng, &mut importances);

                let total: f64 = importances.iter().sum();
                if total > 0.0 {
                    for (acc, imp) in totals.iter_mut().zip(&importances) {
                        *acc += imp / total;
                    }
                }
            }
        }

        let n_trees = self.n_estimators as f64;
        for imp in &mut totals {
            *imp /= n_trees;
        }
        let total: f64 = totals.iter().sum();
        if total > 0.0 {
            for imp in &mut totals {
                *imp /= total;
            }
        }

        let mut ranking: Vec<FeatureImportance> = features
            .into_iter()
            .zip(totals)
            .map(|(feature, importance)| FeatureImportance {
                feature,
                importance,
            })
            .collect();
        ranking.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        info!(
            "Ranked {} features with {} trees (top: {})",
            ranking.len(),
            self.n_estimators,
            ranking
                .first()
                .map(|f| f.feature.as_str())
                .unwrap_or("none")
        );
        Ok(ranking)
    }

    fn feature_matrix(&self, df: &DataFrame, features: &[String]) -> Result<Vec<Vec<f64>>> {
        let mut columns = Vec::with_capacity(features.len());
        let mut with_nulls = Vec::new();
        let mut missing = 0usize;

        for name in features {
            let values = column_as_f64(df, name)?;
            let nulls = values.iter().filter(|v| v.is_none()).count();
            if nulls > 0 {
                missing += nulls;
                with_nulls.push(name.clone());
            }
            columns.push(values.into_iter().map(|v| v.unwrap_or(0.0)).collect());
        }

        if missing > 0 {
            return Err(PrepError::DataIntegrity {
                missing,
                columns: with_nulls,
            });
        }
        Ok(columns)
    }

    /// Outcome values mapped to dense class indices in ascending order.
    fn class_labels(&self, df: &DataFrame) -> Result<Vec<usize>> {
        require_column(df, &self.target_column)?;
        let raw = column_as_f64(df, &self.target_column)?;
        if raw.iter().any(|v| v.is_none()) {
            return Err(PrepError::DataIntegrity {
                missing: raw.iter().filter(|v| v.is_none()).count(),
                columns: vec![self.target_column.clone()],
            });
        }

        let mut classes: BTreeMap<i64, usize> = BTreeMap::new();
        for value in raw.iter().flatten() {
            classes.insert(*value as i64, 0);
        }
        for (idx, class) in classes.values_mut().enumerate() {
            *class = idx;
        }
        debug!("Outcome classes: {:?}", classes.keys().collect::<Vec<_>>());

        Ok(raw
            .iter()
            .flatten()
            .map(|v| classes[&(*v as i64)])
            .collect())
    }
}

/// Write a ranking as a two-column table.
pub fn ranking_to_frame(ranking: &[FeatureImportance]) -> Result<DataFrame> {
    let names: Vec<&str> = ranking.iter().map(|f| f.feature.as_str()).collect();
    let scores: Vec<f64> = ranking.iter().map(|f| f.importance).collect();
    Ok(DataFrame::new(vec![
        Column::new("feature".into(), names),
        Column::new("importance".into(), scores),
    ])?)
}

struct TreeGrower<'a> {
    columns: &'a [Vec<f64>],
    labels: &'a [usize],
    n_classes: usize,
    max_features: usize,
    max_depth: Option<usize>,
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl TreeGrower<'_> {
    /// Grow one node, recording impurity decrease per feature. Only the
    /// importances are kept; the tree structure itself is not needed.
    fn grow(
        &self,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
        importances: &mut [f64],
    ) {
        let n_samples = indices.len();
        let counts = self.class_counts(indices);
        let parent = gini(&counts, n_samples);

        let should_stop = n_samples < 2 || parent == 0.0 || self.max_depth.is_some_and(|d| depth >= d);
        if should_stop {
            return;
        }

        let Some(split) = self.best_split(indices, &counts, parent, rng) else {
            return;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.columns[split.feature][i] <= split.threshold);

        importances[split.feature] += n_samples as f64 * split.gain;

        self.grow(&left, depth + 1, rng, importances);
        self.grow(&right, depth + 1, rng, importances);
    }

    fn best_split(
        &self,
        indices: &[usize],
        counts: &[usize],
        parent: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<Split> {
        let n_features = self.columns.len();
        let candidates = sample(rng, n_features, self.max_features.min(n_features));
        let n = indices.len();
        let mut best: Option<Split> = None;

        for feature in candidates.iter() {
            let column = &self.columns[feature];
            let mut order = indices.to_vec();
            order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

            let mut left = vec![0usize; self.n_classes];
            let mut right = counts.to_vec();

            for pos in 0..n - 1 {
                let label = self.labels[order[pos]];
                left[label] += 1;
                right[label] -= 1;

                let (here, next) = (column[order[pos]], column[order[pos + 1]]);
                if here >= next {
                    continue;
                }

                let n_left = pos + 1;
                let n_right = n - n_left;
                let weighted = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / n as f64;
                let gain = parent - weighted;

                if gain > 1e-12 && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(Split {
                        feature,
                        threshold: (here + next) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in indices {
            counts[self.labels[i]] += 1;
        }
        counts
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}
