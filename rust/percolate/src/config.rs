use crate::errors::{
    ConfigError,
    InputError,
    Result,
};
use crate::normalizer::NormalizationKind;
use crate::partition::PartitionPolicy;
use crate::svm::SvmOptions;
use serde::{
    Deserialize,
    Serialize,
};

/// Every knob of a training run.
///
/// Deserializes from a partial JSON object, missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of cross validation folds.
    pub folds: usize,
    /// Number of outer (relabel + retrain) iterations.
    pub iterations: usize,
    /// FDR used to pick positive training examples. Zero means `test_fdr`.
    pub selection_fdr: f64,
    /// FDR used to rank grid cells and to report results.
    pub test_fdr: f64,
    /// Fixed cost for positive examples, grid searched when absent.
    pub cpos: Option<f64>,
    /// Fixed cost for negative examples, grid searched when absent.
    pub cneg: Option<f64>,
    /// Fraction of each label used for training by the holdout policy.
    pub train_ratio: f64,
    pub seed: u64,
    /// Keep only the best PSM per peptide for the peptide level report.
    pub unique_peptides: bool,
    /// Use the auxiliary retention time block as features.
    pub rt_features: bool,
    /// Keep trained weights even when they look implausible.
    pub override_direction_check: bool,
    pub partition: PartitionPolicy,
    pub normalization: NormalizationKind,
    /// Signed 1-based feature number to start from, negative when lower
    /// values are better.
    pub default_direction: Option<i32>,
    /// Starting weights in raw feature space, bias last.
    pub init_weights: Option<Vec<f64>>,
    /// Measure the test sets after every iteration.
    pub report_each_iteration: bool,
    /// Log wall clock checkpoints.
    pub clock: bool,
    pub solver: SvmOptions,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            folds: 3,
            iterations: 10,
            selection_fdr: 0.01,
            test_fdr: 0.01,
            cpos: None,
            cneg: None,
            train_ratio: 0.6,
            seed: 1,
            unique_peptides: true,
            rt_features: false,
            override_direction_check: false,
            partition: PartitionPolicy::ByLabel,
            normalization: NormalizationKind::Stdv,
            default_direction: None,
            init_weights: None,
            report_each_iteration: false,
            clock: false,
            solver: SvmOptions::default(),
        }
    }
}

fn out_of_range(field: &'static str, value: f64, context: &'static str) -> ConfigError {
    ConfigError::OutOfRange {
        field,
        value,
        context,
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.folds < 2 {
            return Err(InputError::InvalidFoldCount { folds: self.folds }.into());
        }
        if !(self.test_fdr > 0.0 && self.test_fdr <= 1.0) {
            return Err(out_of_range("test_fdr", self.test_fdr, "must be in (0, 1]").into());
        }
        if !(self.selection_fdr >= 0.0 && self.selection_fdr <= 1.0) {
            return Err(out_of_range(
                "selection_fdr",
                self.selection_fdr,
                "must be in [0, 1], 0 selects the test FDR",
            )
            .into());
        }
        for (field, cost) in [("cpos", self.cpos), ("cneg", self.cneg)] {
            if let Some(c) = cost {
                if !(c.is_finite() && c > 0.0) {
                    return Err(out_of_range(field, c, "costs must be positive").into());
                }
            }
        }
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(out_of_range("train_ratio", self.train_ratio, "must be in (0, 1)").into());
        }
        if !(self.solver.lambda.is_finite() && self.solver.lambda > 0.0) {
            return Err(out_of_range("solver.lambda", self.solver.lambda, "must be positive").into());
        }
        if !(self.solver.epsilon.is_finite() && self.solver.epsilon > 0.0) {
            return Err(
                out_of_range("solver.epsilon", self.solver.epsilon, "must be positive").into(),
            );
        }
        if self.default_direction == Some(0) {
            return Err(ConfigError::InvalidDefaultDirection {
                direction: 0,
                num_features: 0,
            }
            .into());
        }
        Ok(())
    }

    /// The FDR actually used for positive selection.
    pub fn effective_selection_fdr(&self) -> f64 {
        if self.selection_fdr > 0.0 {
            self.selection_fdr
        } else {
            self.test_fdr
        }
    }
}
