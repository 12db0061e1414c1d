//! Hyperparameter search over the misclassification costs.

use super::score_set::ScoreSet;
use crate::errors::Result;
use crate::svm::{
    Convergence,
    LinearSolver,
    SvmProblem,
};
use serde::Serialize;
use tracing::{
    debug,
    warn,
};

const DEFAULT_CPOS: [f64; 3] = [10.0, 1.0, 0.1];
const DEFAULT_CFRAC: [f64; 3] = [1.0, 3.0, 10.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostCell {
    pub cpos: f64,
    pub cneg: f64,
}

/// Ordered list of (Cpos, Cneg) candidates, never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct CostGrid {
    cells: Vec<CostCell>,
}

impl CostGrid {
    /// Builds the grid, searching every cost that is not pinned.
    ///
    /// Cneg is searched as a multiple of Cpos, scaled by the ratio of
    /// targets to decoys in the data.
    pub fn new(cpos: Option<f64>, cneg: Option<f64>, target_decoy_ratio: f64) -> Self {
        let cposs: Vec<f64> = match cpos {
            Some(c) => vec![c],
            None => DEFAULT_CPOS.to_vec(),
        };
        let cells = cposs
            .iter()
            .flat_map(|&cpos| {
                let cnegs: Vec<f64> = match cneg {
                    Some(c) => vec![c],
                    None => DEFAULT_CFRAC
                        .iter()
                        .map(|f| cpos * f * target_decoy_ratio)
                        .collect(),
                };
                cnegs.into_iter().map(move |cneg| CostCell { cpos, cneg })
            })
            .collect();
        Self { cells }
    }

    pub fn from_cells(cells: Vec<CostCell>) -> Option<Self> {
        if cells.is_empty() {
            None
        } else {
            Some(Self { cells })
        }
    }

    pub fn cells(&self) -> &[CostCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GridOutcome {
    pub weights: Vec<f64>,
    /// Winning cell, `None` when no cell could be trained.
    pub cell: Option<CostCell>,
    /// Targets passing the evaluation FDR on the training set.
    pub passing: usize,
    pub num_positives: usize,
    pub num_negatives: usize,
    pub convergence: Option<Convergence>,
}

impl GridOutcome {
    pub fn is_degenerate(&self) -> bool {
        self.cell.is_none()
    }
}

/// Trains one model per grid cell and keeps the one with the most targets
/// passing `eval_fdr` on the training set. Ties keep the earliest cell.
///
/// A problem missing either class is never handed to the solver, the
/// previous weights are kept instead.
pub fn grid_search<S: LinearSolver + ?Sized>(
    solver: &S,
    grid: &CostGrid,
    problem: &SvmProblem<'_>,
    train: &mut ScoreSet<'_>,
    eval_fdr: f64,
    previous: &[f64],
) -> Result<GridOutcome> {
    let fallback = |train: &mut ScoreSet<'_>| GridOutcome {
        weights: previous.to_vec(),
        cell: None,
        passing: train.calc_scores(previous, eval_fdr),
        num_positives: problem.num_positives(),
        num_negatives: problem.num_negatives(),
        convergence: None,
    };

    if !problem.is_trainable() {
        warn!(
            "Skipping training round with {} positives and {} negatives, keeping previous weights",
            problem.num_positives(),
            problem.num_negatives()
        );
        return Ok(fallback(train));
    }

    let mut best: Option<GridOutcome> = None;
    for cell in grid.cells() {
        let out = solver.train(problem, cell.cpos, cell.cneg)?;
        if !out.weights.iter().all(|w| w.is_finite()) {
            warn!(
                "Solver returned non finite weights for cpos={} cneg={}, skipping",
                cell.cpos, cell.cneg
            );
            continue;
        }
        if out.convergence == Convergence::IterationLimit {
            debug!(
                "Solver hit its iteration limit for cpos={} cneg={}",
                cell.cpos, cell.cneg
            );
        }

        let passing = train.calc_scores(&out.weights, eval_fdr);
        debug!(
            "cpos={} cneg={}: {} targets at q <= {}",
            cell.cpos, cell.cneg, passing, eval_fdr
        );

        let better = match &best {
            None => true,
            Some(b) => passing > b.passing,
        };
        if better {
            best = Some(GridOutcome {
                weights: out.weights,
                cell: Some(*cell),
                passing,
                num_positives: problem.num_positives(),
                num_negatives: problem.num_negatives(),
                convergence: Some(out.convergence),
            });
        }
    }

    match best {
        Some(b) => Ok(b),
        None => Ok(fallback(train)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PercolateError;
    use crate::svm::{
        L2SvmMfn,
        SolverOutput,
    };
    use crate::svm::test_utils::separable;
    use approx::assert_relative_eq;
    use std::sync::Mutex;

    #[test]
    fn test_default_grid() {
        let grid = CostGrid::new(None, None, 2.0);
        assert_eq!(grid.len(), 9);
        assert_eq!(grid.cells()[0], CostCell { cpos: 10.0, cneg: 20.0 });
        assert_eq!(grid.cells()[1], CostCell { cpos: 10.0, cneg: 60.0 });
        assert_relative_eq!(grid.cells()[8].cpos, 0.1);
        assert_relative_eq!(grid.cells()[8].cneg, 2.0);
    }

    #[test]
    fn test_pinned_grid() {
        let grid = CostGrid::new(Some(0.5), None, 1.0);
        assert_eq!(grid.len(), 3);
        assert!(grid.cells().iter().all(|c| c.cpos == 0.5));

        let grid = CostGrid::new(Some(0.5), Some(4.0), 1.0);
        assert_eq!(grid.cells(), &[CostCell { cpos: 0.5, cneg: 4.0 }]);

        assert!(CostGrid::from_cells(vec![]).is_none());
    }

    /// Returns canned weights in call order.
    struct Scripted {
        weights: Mutex<Vec<Vec<f64>>>,
    }

    impl LinearSolver for Scripted {
        fn train(
            &self,
            problem: &SvmProblem<'_>,
            _cpos: f64,
            _cneg: f64,
        ) -> crate::errors::Result<SolverOutput> {
            let weights = self.weights.lock().unwrap().remove(0);
            Ok(SolverOutput {
                outputs: vec![0.0; problem.len()],
                weights,
                convergence: Convergence::Optimal,
            })
        }
    }

    #[test]
    fn test_first_seen_wins_ties() {
        let m = separable();
        let members: Vec<usize> = (0..m.len()).collect();
        let mut train = ScoreSet::new(&m, &members);
        let problem = SvmProblem::new(&m, &[0, 1, 2], &[3, 4, 5]);
        let grid = CostGrid::from_cells(vec![
            CostCell { cpos: 1.0, cneg: 1.0 },
            CostCell { cpos: 2.0, cneg: 2.0 },
            CostCell { cpos: 3.0, cneg: 3.0 },
        ])
        .unwrap();
        let solver = Scripted {
            weights: Mutex::new(vec![
                vec![-1.0, -1.0, 0.0],
                vec![1.0, 1.0, 0.0],
                vec![2.0, 2.0, 0.0],
            ]),
        };

        let out = grid_search(&solver, &grid, &problem, &mut train, 0.01, &[0.0; 3]).unwrap();
        assert_eq!(out.cell, Some(CostCell { cpos: 2.0, cneg: 2.0 }));
        assert_eq!(out.passing, 3);
        assert_eq!(out.weights, vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_degenerate_round_keeps_weights() {
        let m = separable();
        let members: Vec<usize> = (0..m.len()).collect();
        let mut train = ScoreSet::new(&m, &members);
        let problem = SvmProblem::new(&m, &[], &[3, 4, 5]);
        let grid = CostGrid::new(None, None, 1.0);
        let previous = vec![0.1, -0.2, 0.0];

        let out =
            grid_search(&L2SvmMfn::default(), &grid, &problem, &mut train, 0.01, &previous)
                .unwrap();
        assert!(out.is_degenerate());
        assert_eq!(out.weights, previous);
        assert_eq!(out.num_positives, 0);
    }

    #[test]
    fn test_solver_errors_propagate() {
        let m = separable();
        let members: Vec<usize> = (0..m.len()).collect();
        let mut train = ScoreSet::new(&m, &members);
        let problem = SvmProblem::new(&m, &[0], &[3]);
        let grid = CostGrid::from_cells(vec![CostCell {
            cpos: -1.0,
            cneg: 1.0,
        }])
        .unwrap();
        let res = grid_search(&L2SvmMfn::default(), &grid, &problem, &mut train, 0.01, &[0.0; 3]);
        assert!(matches!(res, Err(PercolateError::Solver(_))));
    }

    #[test]
    fn test_grid_determinism() {
        let m = separable();
        let members: Vec<usize> = (0..m.len()).collect();
        let problem = SvmProblem::new(&m, &[0, 1, 2], &[3, 4, 5]);
        let grid = CostGrid::new(None, None, 1.0);

        let run = || {
            let mut train = ScoreSet::new(&m, &members);
            grid_search(&L2SvmMfn::default(), &grid, &problem, &mut train, 0.01, &[0.0; 3])
                .unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.cell, b.cell);
        assert_eq!(a.weights, b.weights);
    }
}
