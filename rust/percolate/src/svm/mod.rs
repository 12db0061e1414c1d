//! L2-regularized linear SVM trained with the modified finite Newton method.
//!
//! Solves
//!
//! ```text
//! min_w 0.5 * lambda * w'w + 0.5 * sum_i C_i * max(0, 1 - y_i * w'x_i)^2
//! ```
//!
//! where `C_i` is `cpos` for positive and `cneg` for negative examples. The
//! bias is the last weight and is regularized like every other component.
//!
//! The training loop only talks to the [`LinearSolver`] trait, any other
//! solver with the same contract can be plugged in.

mod cgls;
mod l2_svm_mfn;
mod line_search;

pub use l2_svm_mfn::L2SvmMfn;

use crate::errors::{
    Result,
    SolverError,
};
use crate::models::score_row;
use crate::models::{
    FeatureMatrix,
    TargetDecoy,
};
use serde::{
    Deserialize,
    Serialize,
};

/// Labelled training subset of a feature matrix.
///
/// Rows are borrowed from the matrix, a constant bias input of 1 is implied
/// after the last feature.
#[derive(Debug, Clone)]
pub struct SvmProblem<'a> {
    matrix: &'a FeatureMatrix,
    examples: Vec<usize>,
    labels: Vec<f64>,
    num_positives: usize,
}

impl<'a> SvmProblem<'a> {
    pub fn new(matrix: &'a FeatureMatrix, positives: &[usize], negatives: &[usize]) -> Self {
        let mut examples = Vec::with_capacity(positives.len() + negatives.len());
        let mut labels = Vec::with_capacity(positives.len() + negatives.len());
        examples.extend_from_slice(positives);
        labels.extend(std::iter::repeat(TargetDecoy::Target.as_svm_label()).take(positives.len()));
        examples.extend_from_slice(negatives);
        labels.extend(std::iter::repeat(TargetDecoy::Decoy.as_svm_label()).take(negatives.len()));

        Self {
            matrix,
            examples,
            labels,
            num_positives: positives.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Length of the weight vector, features plus bias.
    pub fn dim(&self) -> usize {
        self.matrix.weight_len()
    }

    pub fn num_positives(&self) -> usize {
        self.num_positives
    }

    pub fn num_negatives(&self) -> usize {
        self.examples.len() - self.num_positives
    }

    /// Both classes are present.
    pub fn is_trainable(&self) -> bool {
        self.num_positives() > 0 && self.num_negatives() > 0
    }

    pub fn label(&self, i: usize) -> f64 {
        self.labels[i]
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn row(&self, i: usize) -> &[f64] {
        self.matrix.row(self.examples[i])
    }

    pub fn cost(&self, i: usize, cpos: f64, cneg: f64) -> f64 {
        if self.labels[i] > 0.0 { cpos } else { cneg }
    }

    pub fn output(&self, i: usize, weights: &[f64]) -> f64 {
        score_row(weights, self.row(i))
    }

    /// Adds `scale * x_i` (bias input included) to `acc`.
    pub(crate) fn add_scaled_row(&self, i: usize, scale: f64, acc: &mut [f64]) {
        let row = self.row(i);
        let n = row.len();
        acc[..n]
            .iter_mut()
            .zip(row)
            .for_each(|(a, x)| *a += scale * x);
        acc[n] += scale;
    }
}

/// How the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Convergence {
    Optimal,
    RelativeImprovement,
    IterationLimit,
}

#[derive(Debug, Clone)]
pub struct SolverOutput {
    /// Features then bias.
    pub weights: Vec<f64>,
    /// `w'x_i` for every example of the problem, in problem order.
    pub outputs: Vec<f64>,
    pub convergence: Convergence,
}

/// A linear classifier trainer with asymmetric misclassification costs.
///
/// Implementations must not keep mutable state between calls, folds train
/// concurrently against the same solver.
pub trait LinearSolver: Sync {
    fn train(&self, problem: &SvmProblem<'_>, cpos: f64, cneg: f64) -> Result<SolverOutput>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmOptions {
    pub lambda: f64,
    pub epsilon: f64,
    pub cg_max_iterations: usize,
    pub mfn_max_iterations: usize,
}

impl Default for SvmOptions {
    fn default() -> Self {
        Self {
            lambda: 1.0,
            epsilon: 1e-7,
            cg_max_iterations: 10_000,
            mfn_max_iterations: 50,
        }
    }
}

pub(crate) fn check_problem(problem: &SvmProblem<'_>, cpos: f64, cneg: f64) -> Result<()> {
    if problem.is_empty() {
        return Err(SolverError::EmptyProblem.into());
    }
    if !(cpos.is_finite() && cneg.is_finite() && cpos > 0.0 && cneg > 0.0) {
        return Err(SolverError::NonFiniteCost { cpos, cneg }.into());
    }
    if problem.labels.len() != problem.examples.len() {
        return Err(SolverError::DimensionMismatch {
            expected: problem.examples.len(),
            other: problem.labels.len(),
        }
        .into());
    }
    Ok(())
}
