//! Cross validation fold assignment.
//!
//! Every example is assigned to exactly one fold. Fold `k` tests on its own
//! members and trains on the members of every other fold. Assignment is done
//! once, with a seeded generator, and never reshuffled afterwards.

use crate::errors::{
    ConfigError,
    InputError,
    Result,
};
use crate::models::FeatureMatrix;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionPolicy {
    /// Split targets and decoys independently, keeping the ratio in every fold.
    #[default]
    ByLabel,
    /// Assign whole spectra to folds so PSMs of one spectrum never straddle
    /// a train/test boundary.
    BySpectrum,
    /// Single train/test split, `train_ratio` of each label goes to training.
    Holdout,
}

/// Train and test members of one fold, as indices into the feature matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Partitioner {
    num_folds: usize,
    seed: u64,
    policy: PartitionPolicy,
    train_ratio: f64,
}

impl Partitioner {
    pub fn new(num_folds: usize, seed: u64, policy: PartitionPolicy) -> Self {
        Self {
            num_folds,
            seed,
            policy,
            train_ratio: 0.6,
        }
    }

    pub fn with_train_ratio(mut self, train_ratio: f64) -> Self {
        self.train_ratio = train_ratio;
        self
    }

    pub fn split(&self, matrix: &FeatureMatrix) -> Result<Vec<Fold>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let (assigned_fold, num_groups) = match self.policy {
            PartitionPolicy::ByLabel => {
                self.check_fold_count(matrix.len())?;
                (self.assign_by_label(matrix, &mut rng), self.num_folds)
            }
            PartitionPolicy::BySpectrum => {
                let groups = spectrum_groups(matrix);
                self.check_fold_count(groups.len())?;
                (
                    self.assign_groups(groups, matrix.len(), &mut rng),
                    self.num_folds,
                )
            }
            PartitionPolicy::Holdout => {
                if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
                    return Err(ConfigError::OutOfRange {
                        field: "train_ratio",
                        value: self.train_ratio,
                        context: "must be strictly between 0 and 1",
                    }
                    .into());
                }
                (self.assign_holdout(matrix, &mut rng), 2)
            }
        };

        let folds = match self.policy {
            PartitionPolicy::Holdout => vec![Fold {
                train: members(&assigned_fold, 0),
                test: members(&assigned_fold, 1),
            }],
            _ => (0..num_groups)
                .map(|fold| Fold {
                    train: assigned_fold
                        .iter()
                        .enumerate()
                        .filter_map(|(i, &f)| if f != fold { Some(i) } else { None })
                        .collect(),
                    test: members(&assigned_fold, fold),
                })
                .collect(),
        };

        for (i, fold) in folds.iter().enumerate() {
            debug!(
                "Fold {}: {} train and {} test examples",
                i,
                fold.train.len(),
                fold.test.len()
            );
        }

        Ok(folds)
    }

    fn check_fold_count(&self, population: usize) -> Result<()> {
        if self.num_folds < 2 {
            return Err(InputError::InvalidFoldCount {
                folds: self.num_folds,
            }
            .into());
        }
        if self.num_folds > population {
            return Err(InputError::FoldsExceedPopulation {
                folds: self.num_folds,
                population,
            }
            .into());
        }
        Ok(())
    }

    fn assign_by_label(&self, matrix: &FeatureMatrix, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut assigned_fold = vec![0; matrix.len()];
        let (mut targets, mut decoys): (Vec<usize>, Vec<usize>) =
            (0..matrix.len()).partition(|&i| matrix.label(i).is_target());

        for group in [&mut targets, &mut decoys] {
            group.shuffle(rng);
            for (pos, &i) in group.iter().enumerate() {
                assigned_fold[i] = pos % self.num_folds;
            }
        }
        assigned_fold
    }

    fn assign_groups(
        &self,
        mut groups: Vec<Vec<usize>>,
        len: usize,
        rng: &mut ChaCha8Rng,
    ) -> Vec<usize> {
        let mut assigned_fold = vec![0; len];
        groups.shuffle(rng);
        for (pos, group) in groups.iter().enumerate() {
            for &i in group {
                assigned_fold[i] = pos % self.num_folds;
            }
        }
        assigned_fold
    }

    fn assign_holdout(&self, matrix: &FeatureMatrix, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut assigned_fold = vec![1; matrix.len()];
        let (mut targets, mut decoys): (Vec<usize>, Vec<usize>) =
            (0..matrix.len()).partition(|&i| matrix.label(i).is_target());

        for group in [&mut targets, &mut decoys] {
            group.shuffle(rng);
            let num_train = ((group.len() as f64) * self.train_ratio).round() as usize;
            for &i in group.iter().take(num_train) {
                assigned_fold[i] = 0;
            }
        }
        assigned_fold
    }
}

fn members(assigned_fold: &[usize], fold: usize) -> Vec<usize> {
    assigned_fold
        .iter()
        .enumerate()
        .filter_map(|(i, &f)| if f == fold { Some(i) } else { None })
        .collect()
}

/// Groups example indices by spectrum, in order of first appearance.
/// Examples without a spectrum identifier form their own group.
fn spectrum_groups(matrix: &FeatureMatrix) -> Vec<Vec<usize>> {
    let mut lookup: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for i in 0..matrix.len() {
        match matrix.info(i).spectrum.as_deref() {
            Some(spectrum) => {
                let group = *lookup.entry(spectrum).or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
                groups[group].push(i);
            }
            None => groups.push(vec![i]),
        }
    }
    groups
}
