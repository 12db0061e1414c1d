//! Semi-supervised cross validated training.
//!
//! Every fold starts from the same initial direction. Each outer iteration
//! relabels the fold's training set from its current scores (targets passing
//! the selection FDR are positives, all decoys negatives), grid searches the
//! costs and keeps the best weights. Folds are trained in parallel and joined
//! before the next iteration starts.

use super::grid::{
    CostCell,
    CostGrid,
    GridOutcome,
    grid_search,
};
use super::score_set::ScoreSet;
use crate::config::TrainingConfig;
use crate::errors::Result;
use crate::models::FeatureMatrix;
use crate::normalizer::Normalizer;
use crate::partition::Fold;
use crate::sanity::{
    DirectionCheck,
    DirectionVerdict,
    InitialDirection,
};
use crate::svm::{
    LinearSolver,
    SvmProblem,
};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Debug, Clone, Serialize)]
pub struct FoldIteration {
    pub fold: usize,
    pub cell: Option<CostCell>,
    pub num_positives: usize,
    pub num_negatives: usize,
    /// Training targets passing the test FDR with the winning weights.
    pub passing: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IterationReport {
    /// 1-based.
    pub iteration: usize,
    /// Passing training targets summed over folds, divided by the number of
    /// folds each example trains in.
    pub estimated_passing: usize,
    /// Test targets passing the test FDR, when per-iteration reporting is on.
    pub test_passing: Option<usize>,
    pub folds: Vec<FoldIteration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingOutcome {
    pub folds: Vec<Fold>,
    /// Final weights per fold, normalized feature space, bias last.
    pub weights: Vec<Vec<f64>>,
    pub initial: InitialDirection,
    pub iterations: Vec<IterationReport>,
    pub verdict: DirectionVerdict,
    /// The trained weights were replaced by the initial direction.
    pub fell_back: bool,
    /// Test targets passing the test FDR with the final weights.
    pub test_passing: usize,
}

struct FoldState<'a> {
    train: ScoreSet<'a>,
    weights: Vec<f64>,
}

pub struct Trainer<'a, S: LinearSolver, C: DirectionCheck> {
    matrix: &'a FeatureMatrix,
    config: &'a TrainingConfig,
    solver: S,
    check: C,
}

impl<'a, S: LinearSolver, C: DirectionCheck> Trainer<'a, S, C> {
    /// `matrix` is expected to be normalized already.
    pub fn new(matrix: &'a FeatureMatrix, config: &'a TrainingConfig, solver: S, check: C) -> Self {
        Self {
            matrix,
            config,
            solver,
            check,
        }
    }

    pub fn train(&self, folds: Vec<Fold>, normalizer: &Normalizer) -> Result<TrainingOutcome> {
        self.train_with(folds, normalizer, |_| {})
    }

    /// Like [`Trainer::train`], calling `on_iteration` after every outer
    /// iteration.
    pub fn train_with<F>(
        &self,
        folds: Vec<Fold>,
        normalizer: &Normalizer,
        mut on_iteration: F,
    ) -> Result<TrainingOutcome>
    where
        F: FnMut(&IterationReport),
    {
        let initial = self.check.initial_direction(self.matrix, normalizer)?;
        let grid = CostGrid::new(
            self.config.cpos,
            self.config.cneg,
            self.matrix.target_decoy_ratio(),
        );
        debug!("Searching {} cost combinations per fold", grid.len());

        let mut states: Vec<FoldState<'_>> = folds
            .iter()
            .map(|f| FoldState {
                train: ScoreSet::new(self.matrix, &f.train),
                weights: initial.weights.clone(),
            })
            .collect();
        let mut tests: Vec<ScoreSet<'_>> = folds
            .iter()
            .map(|f| ScoreSet::new(self.matrix, &f.test))
            .collect();

        let test_fdr = self.config.test_fdr;
        let train_multiplicity = folds.len().saturating_sub(1).max(1);
        let mut iterations = Vec::with_capacity(self.config.iterations);

        for iteration in 1..=self.config.iterations {
            let outcomes: Vec<GridOutcome> = states
                .par_iter_mut()
                .map(|state| self.step(state, &grid))
                .collect::<Result<Vec<_>>>()?;

            let estimated_passing =
                outcomes.iter().map(|o| o.passing).sum::<usize>() / train_multiplicity;
            let test_passing = if self.config.report_each_iteration {
                Some(
                    tests
                        .iter_mut()
                        .zip(states.iter())
                        .map(|(t, s)| t.calc_scores(&s.weights, test_fdr))
                        .sum::<usize>(),
                )
            } else {
                None
            };

            info!(
                "Iteration {}: {} target PSMs with q <= {} estimated by cross validation",
                iteration, estimated_passing, test_fdr
            );
            if let Some(n) = test_passing {
                info!(
                    "Iteration {}: {} target PSMs with q <= {} on the test sets",
                    iteration, n, test_fdr
                );
            }

            let report = IterationReport {
                iteration,
                estimated_passing,
                test_passing,
                folds: outcomes
                    .into_iter()
                    .enumerate()
                    .map(|(fold, o)| FoldIteration {
                        fold,
                        cell: o.cell,
                        num_positives: o.num_positives,
                        num_negatives: o.num_negatives,
                        passing: o.passing,
                    })
                    .collect(),
            };
            on_iteration(&report);
            iterations.push(report);
        }

        let mut weights: Vec<Vec<f64>> = states.into_iter().map(|s| s.weights).collect();
        let verdict = self
            .check
            .validate_direction(&mut tests, &weights, &initial.weights);

        let mut fell_back = false;
        if !verdict.is_plausible() {
            if self.config.override_direction_check {
                warn!(
                    "Direction check failed: {}. Keeping the trained weights as requested",
                    verdict
                );
            } else {
                warn!(
                    "Direction check failed: {}. Falling back to the initial direction",
                    verdict
                );
                weights = vec![initial.weights.clone(); weights.len()];
                fell_back = true;
            }
        }

        let test_passing: usize = tests
            .iter_mut()
            .zip(weights.iter())
            .map(|(t, w)| t.calc_scores(w, test_fdr))
            .sum();
        info!(
            "After all training done, {} target PSMs with q <= {} were found on the test sets",
            test_passing, test_fdr
        );

        Ok(TrainingOutcome {
            folds,
            weights,
            initial,
            iterations,
            verdict,
            fell_back,
            test_passing,
        })
    }

    fn step(&self, state: &mut FoldState<'a>, grid: &CostGrid) -> Result<GridOutcome> {
        let selection_fdr = self.config.effective_selection_fdr();
        state.train.calc_scores(&state.weights, selection_fdr);
        let positives = state.train.positives(selection_fdr);
        let negatives = state.train.negatives();
        debug!(
            "Training with {} positives and {} negatives",
            positives.len(),
            negatives.len()
        );

        let problem = SvmProblem::new(self.matrix, &positives, &negatives);
        let outcome = grid_search(
            &self.solver,
            grid,
            &problem,
            &mut state.train,
            self.config.test_fdr,
            &state.weights,
        )?;
        state.weights.clone_from(&outcome.weights);
        Ok(outcome)
    }
}
