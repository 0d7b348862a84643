//! Stratified train/validation/test partitioning.
//!
//! A holdout fraction is split off stratified on the outcome, then the
//! holdout is split again, stratified, into validation and test. Per-class
//! sizes use largest-remainder allocation so class proportions stay as close
//! to the source as whole rows allow.

use polars::prelude::*;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::{PrepError, Result};
use crate::io::write_csv;
use crate::utils::column_as_f64;
use crate::validation::assert_complete;

/// One partition: its source row indices and its feature/label tables.
#[derive(Debug, Clone)]
pub struct Partition {
    pub name: &'static str,
    /// Ascending row indices into the partitioned table.
    pub indices: Vec<usize>,
    pub features: DataFrame,
    pub labels: DataFrame,
}

impl Partition {
    pub fn summary(&self, target_column: &str) -> Result<PartitionSummary> {
        let labels = column_as_f64(&self.labels, target_column)?;
        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        for label in labels.iter().flatten() {
            *counts.entry(*label as i64).or_default() += 1;
        }
        let n = labels.len().max(1) as f64;

        Ok(PartitionSummary {
            name: self.name.to_string(),
            rows: self.features.height(),
            columns: self.features.width(),
            class_balance: counts
                .into_iter()
                .map(|(class, count)| (class, count as f64 / n))
                .collect(),
        })
    }
}

/// Shape and class proportions of a partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSummary {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub class_balance: BTreeMap<i64, f64>,
}

/// The three disjoint partitions covering every row.
#[derive(Debug, Clone)]
pub struct SplitManifest {
    pub target_column: String,
    pub train: Partition,
    pub validation: Partition,
    pub test: Partition,
}

impl SplitManifest {
    pub fn partitions(&self) -> [&Partition; 3] {
        [&self.train, &self.validation, &self.test]
    }

    pub fn summaries(&self) -> Result<Vec<PartitionSummary>> {
        self.partitions()
            .iter()
            .map(|p| p.summary(&self.target_column))
            .collect()
    }

    /// Whether every feature and label table is free of missing cells.
    pub fn is_complete(&self) -> bool {
        self.partitions()
            .iter()
            .all(|p| assert_complete(&p.features).is_ok() && assert_complete(&p.labels).is_ok())
    }

    /// Write `X_<name>.csv` and `y_<name>.csv` for every partition.
    pub fn write(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        for partition in self.partitions() {
            write_csv(&partition.features, dir.join(format!("X_{}.csv", partition.name)))?;
            write_csv(&partition.labels, dir.join(format!("y_{}.csv", partition.name)))?;
        }
        Ok(())
    }
}

/// Seeded stratified splitter.
#[derive(Debug, Clone)]
pub struct StratifiedPartitioner {
    target_column: String,
    holdout_fraction: f64,
    validation_share: f64,
    seed: u64,
}

impl StratifiedPartitioner {
    pub fn new(target_column: impl Into<String>, seed: u64) -> Self {
        Self {
            target_column: target_column.into(),
            holdout_fraction: 0.30,
            validation_share: 0.5,
            seed,
        }
    }

    pub fn with_fractions(mut self, holdout_fraction: f64, validation_share: f64) -> Self {
        self.holdout_fraction = holdout_fraction;
        self.validation_share = validation_share;
        self
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.target_column.clone(), config.seed)
            .with_fractions(config.holdout_fraction, config.validation_share)
    }

    pub fn split(&self, df: &DataFrame) -> Result<SplitManifest> {
        let labels = self.labels(df)?;
        let all: Vec<usize> = (0..labels.len()).collect();

        let (train, holdout) = stratified_indices(&all, &labels, self.holdout_fraction, self.seed);
        let (validation, test) = stratified_indices(
            &holdout,
            &labels,
            1.0 - self.validation_share,
            self.seed,
        );

        let manifest = SplitManifest {
            target_column: self.target_column.clone(),
            train: self.partition(df, "train", train)?,
            validation: self.partition(df, "val", validation)?,
            test: self.partition(df, "test", test)?,
        };

        info!(
            "Stratified split (seed {}): train {}, val {}, test {}",
            self.seed,
            manifest.train.indices.len(),
            manifest.validation.indices.len(),
            manifest.test.indices.len()
        );
        Ok(manifest)
    }

    fn labels(&self, df: &DataFrame) -> Result<Vec<i64>> {
        let values = column_as_f64(df, &self.target_column)?;
        let missing = values.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            return Err(PrepError::DataIntegrity {
                missing,
                columns: vec![self.target_column.clone()],
            });
        }
        Ok(values.into_iter().flatten().map(|v| v as i64).collect())
    }

    fn partition(&self, df: &DataFrame, name: &'static str, indices: Vec<usize>) -> Result<Partition> {
        let mut keep = vec![false; df.height()];
        for &i in &indices {
            keep[i] = true;
        }
        let rows = df.filter(&BooleanChunked::from_slice("mask".into(), &keep))?;
        let labels = rows.select([self.target_column.as_str()])?;
        let features = rows.drop(&self.target_column)?;

        Ok(Partition {
            name,
            indices,
            features,
            labels,
        })
    }
}

/// Split `indices` into (kept, taken) where `taken` holds `ceil(fraction * n)`
/// rows allocated across classes by largest remainder.
///
/// Each class is shuffled with its own seeded generator; both halves are
/// returned in ascending order.
fn stratified_indices(
    indices: &[usize],
    labels: &[i64],
    fraction: f64,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let n = indices.len();
    let n_taken = ((fraction * n as f64 - 1e-9).ceil().max(0.0) as usize).min(n);

    let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for &i in indices {
        by_class.entry(labels[i]).or_default().push(i);
    }

    let quotas: Vec<f64> = by_class
        .values()
        .map(|members| members.len() as f64 * n_taken as f64 / n.max(1) as f64)
        .collect();
    let mut allocation: Vec<usize> = quotas.iter().map(|q| q.floor() as usize).collect();

    let mut remainders: Vec<(usize, f64)> = quotas
        .iter()
        .enumerate()
        .map(|(idx, q)| (idx, q - q.floor()))
        .collect();
    remainders.sort_by(|a, b| b.1.total_cmp(&a.1));
    let short = n_taken.saturating_sub(allocation.iter().sum());
    for &(idx, _) in remainders.iter().take(short) {
        allocation[idx] += 1;
    }

    let mut kept = Vec::with_capacity(n - n_taken);
    let mut taken = Vec::with_capacity(n_taken);
    for (class_idx, members) in by_class.into_values().enumerate() {
        let mut shuffled = members;
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(class_idx as u64));
        shuffled.shuffle(&mut rng);

        let take = allocation[class_idx].min(shuffled.len());
        taken.extend_from_slice(&shuffled[..take]);
        kept.extend_from_slice(&shuffled[take..]);
    }

    kept.sort_unstable();
    taken.sort_unstable();
    (kept, taken)
}
