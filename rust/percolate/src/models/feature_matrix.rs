use super::TargetDecoy;
use crate::errors::{
    InputError,
    Result,
};
use serde::Serialize;

/// Identity and linkage of a single PSM.
///
/// The engine never looks at these fields for scoring, they are only used to
/// group examples (spectrum stratification, redundancy removal) and to report
/// results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PsmInfo {
    pub id: String,
    pub label: TargetDecoy,
    pub spectrum: Option<String>,
    pub peptide: Option<String>,
    pub proteins: Vec<String>,
}

/// A single PSM as handed over by a data loader.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub info: PsmInfo,
    pub features: Vec<f64>,
    /// Auxiliary retention time features, empty when the loader has none.
    pub rt_features: Vec<f64>,
}

/// Dense, row-major store of every example's feature vector.
///
/// Rows hold the regular features followed by the retention time block (when
/// enabled). Weight vectors scored against a row are one element longer than
/// the row, the last element being the bias.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    feature_names: Vec<String>,
    num_rt_features: usize,
    values: Vec<f64>,
    info: Vec<PsmInfo>,
    num_targets: usize,
}

/// Score of a row as `weights[..n] . row + weights[n]`.
#[inline]
pub fn score_row(weights: &[f64], row: &[f64]) -> f64 {
    debug_assert_eq!(weights.len(), row.len() + 1);
    let bias = weights[row.len()];
    row.iter()
        .zip(weights.iter())
        .fold(bias, |acc, (x, w)| acc + x * w)
}

impl FeatureMatrix {
    /// Builds the matrix, validating that every example shares the schema.
    ///
    /// When `use_rt_features` is false the auxiliary block of every example is
    /// dropped.
    pub fn try_new(
        feature_names: Vec<String>,
        rt_feature_names: Vec<String>,
        examples: Vec<Example>,
        use_rt_features: bool,
    ) -> Result<Self> {
        if examples.is_empty() {
            return Err(InputError::ExpectedNonEmptyData {
                context: "feature matrix construction",
            }
            .into());
        }

        let num_features = examples[0].features.len();
        if num_features == 0 {
            return Err(InputError::ExpectedNonEmptyData {
                context: "examples have no features",
            }
            .into());
        }
        if feature_names.len() != num_features {
            return Err(InputError::FeatureNameCountMismatch {
                names: feature_names.len(),
                features: num_features,
            }
            .into());
        }

        let num_rt_features = if use_rt_features {
            rt_feature_names.len()
        } else {
            0
        };
        let stride = num_features + num_rt_features;

        let mut values = Vec::with_capacity(stride * examples.len());
        let mut info = Vec::with_capacity(examples.len());
        let mut num_targets = 0;

        for (row, example) in examples.into_iter().enumerate() {
            if example.features.len() != num_features {
                return Err(InputError::FeatureCountMismatch {
                    expected: num_features,
                    other: example.features.len(),
                    row,
                }
                .into());
            }
            if use_rt_features && example.rt_features.len() != num_rt_features {
                return Err(InputError::FeatureCountMismatch {
                    expected: num_rt_features,
                    other: example.rt_features.len(),
                    row,
                }
                .into());
            }

            let rt_block = if use_rt_features {
                example.rt_features.as_slice()
            } else {
                &[]
            };
            for (column, value) in example.features.iter().chain(rt_block).enumerate() {
                if !value.is_finite() {
                    return Err(InputError::NonFiniteFeature { row, column }.into());
                }
                values.push(*value);
            }

            if example.info.label.is_target() {
                num_targets += 1;
            }
            info.push(example.info);
        }

        if num_targets == 0 {
            return Err(InputError::MissingLabel { label: "target" }.into());
        }
        if num_targets == info.len() {
            return Err(InputError::MissingLabel { label: "decoy" }.into());
        }

        let mut names = feature_names;
        if use_rt_features {
            names.extend(rt_feature_names);
        }

        Ok(Self {
            feature_names: names,
            num_rt_features,
            values,
            info,
            num_targets,
        })
    }

    pub fn len(&self) -> usize {
        self.info.len()
    }

    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }

    /// Number of columns of each row (regular plus retention time features).
    pub fn num_columns(&self) -> usize {
        self.feature_names.len()
    }

    /// Length of a weight vector for this matrix.
    pub fn weight_len(&self) -> usize {
        self.num_columns() + 1
    }

    pub fn num_rt_features(&self) -> usize {
        self.num_rt_features
    }

    /// Column range of the retention time block.
    pub fn rt_columns(&self) -> std::ops::Range<usize> {
        (self.num_columns() - self.num_rt_features)..self.num_columns()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn row(&self, index: usize) -> &[f64] {
        let stride = self.num_columns();
        &self.values[index * stride..(index + 1) * stride]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.values.chunks_exact(self.num_columns())
    }

    pub fn label(&self, index: usize) -> TargetDecoy {
        self.info[index].label
    }

    pub fn info(&self, index: usize) -> &PsmInfo {
        &self.info[index]
    }

    pub fn num_targets(&self) -> usize {
        self.num_targets
    }

    pub fn num_decoys(&self) -> usize {
        self.len() - self.num_targets
    }

    /// Ratio of target to decoy population sizes.
    pub fn target_decoy_ratio(&self) -> f64 {
        self.num_targets as f64 / self.num_decoys() as f64
    }

    pub fn score(&self, index: usize, weights: &[f64]) -> f64 {
        score_row(weights, self.row(index))
    }

    pub fn check_weights(&self, weights: &[f64]) -> Result<()> {
        if weights.len() != self.weight_len() {
            return Err(InputError::WeightLengthMismatch {
                expected: self.weight_len(),
                other: weights.len(),
            }
            .into());
        }
        Ok(())
    }

    /// Applies `f` to every row, consuming the matrix.
    pub(crate) fn map_rows(mut self, f: impl Fn(&mut [f64])) -> Self {
        let stride = self.num_columns();
        self.values.chunks_exact_mut(stride).for_each(f);
        self
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;

    pub fn example(id: &str, label: TargetDecoy, features: Vec<f64>) -> Example {
        Example {
            info: PsmInfo {
                id: id.to_string(),
                label,
                spectrum: None,
                peptide: None,
                proteins: Vec::new(),
            },
            features,
            rt_features: Vec::new(),
        }
    }

    pub fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i + 1)).collect()
    }
}
