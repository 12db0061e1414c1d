use super::cgls::{
    Cgls,
    norm_squared,
};
use super::line_search::line_search;
use super::{
    Convergence,
    LinearSolver,
    SolverOutput,
    SvmOptions,
    SvmProblem,
    check_problem,
};
use crate::errors::Result;
use tracing::trace;

/// Loose tolerance used until the first optimality check passes.
const BIG_EPSILON: f64 = 0.01;
const RELATIVE_STOP_EPS: f64 = 1e-9;
/// Conjugate gradient budget while running with [`BIG_EPSILON`].
const SMALL_CG_MAX_ITERATIONS: usize = 10;

/// Modified finite Newton trainer for the L2-loss linear SVM.
#[derive(Debug, Clone, Default)]
pub struct L2SvmMfn {
    options: SvmOptions,
}

impl L2SvmMfn {
    pub fn new(options: SvmOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SvmOptions {
        &self.options
    }
}

impl LinearSolver for L2SvmMfn {
    fn train(&self, problem: &SvmProblem<'_>, cpos: f64, cneg: f64) -> Result<SolverOutput> {
        check_problem(problem, cpos, cneg)?;

        let lambda = self.options.lambda;
        let m = problem.len();
        let dim = problem.dim();

        let mut weights = vec![0.0; dim];
        let mut outputs = vec![0.0; m];
        let mut active = active_set(problem, &outputs);
        let mut f = objective(problem, lambda, &weights, &outputs, &active, cpos, cneg);

        let mut weights_bar = vec![0.0; dim];
        let mut outputs_bar = vec![0.0; m];

        let mut epsilon = BIG_EPSILON;
        let mut cg_max_iterations = SMALL_CG_MAX_ITERATIONS;

        for iter in 0..self.options.mfn_max_iterations {
            trace!(
                "L2-SVM-MFN iteration {}: {} active examples, objective {:.6}",
                iter + 1,
                active.len(),
                f
            );

            weights_bar.copy_from_slice(&weights);
            outputs_bar.copy_from_slice(&outputs);

            let cg_converged = Cgls::new(problem, lambda, epsilon, cg_max_iterations).solve(
                &active,
                &mut weights_bar,
                &mut outputs_bar,
                cpos,
                cneg,
            );

            // CGLS only refreshed the active outputs.
            let mut is_active = vec![false; m];
            active.iter().for_each(|&i| is_active[i] = true);
            for i in 0..m {
                if !is_active[i] {
                    outputs_bar[i] = problem.output(i, &weights_bar);
                }
            }

            let optimal = cg_converged
                && (0..m).all(|i| {
                    let margin = problem.label(i) * outputs_bar[i];
                    if is_active[i] {
                        margin <= 1.0 + epsilon
                    } else {
                        margin >= 1.0 - epsilon
                    }
                });

            if optimal {
                if epsilon == BIG_EPSILON {
                    epsilon = self.options.epsilon;
                    cg_max_iterations = self.options.cg_max_iterations;
                    trace!("Loose optimality reached, tightening to epsilon {}", epsilon);
                    continue;
                }
                trace!("L2-SVM-MFN optimal after {} iterations", iter + 1);
                return Ok(SolverOutput {
                    weights: weights_bar,
                    outputs: outputs_bar,
                    convergence: Convergence::Optimal,
                });
            }

            let step = line_search(
                problem,
                &weights,
                &weights_bar,
                lambda,
                &outputs,
                &outputs_bar,
                cpos,
                cneg,
            );

            weights
                .iter_mut()
                .zip(weights_bar.iter())
                .for_each(|(w, wb)| *w += step * (wb - *w));
            outputs
                .iter_mut()
                .zip(outputs_bar.iter())
                .for_each(|(o, ob)| *o += step * (ob - *o));

            let f_old = f;
            active = active_set(problem, &outputs);
            f = objective(problem, lambda, &weights, &outputs, &active, cpos, cneg);

            if (f - f_old).abs() < RELATIVE_STOP_EPS * f_old.abs() {
                trace!(
                    "L2-SVM-MFN stopped on relative improvement after {} iterations",
                    iter + 1
                );
                return Ok(SolverOutput {
                    weights,
                    outputs,
                    convergence: Convergence::RelativeImprovement,
                });
            }
        }

        trace!(
            "L2-SVM-MFN reached {} iterations without converging",
            self.options.mfn_max_iterations
        );
        Ok(SolverOutput {
            weights,
            outputs,
            convergence: Convergence::IterationLimit,
        })
    }
}

/// Examples with `y_i * o_i < 1`, the ones contributing to the loss.
fn active_set(problem: &SvmProblem<'_>, outputs: &[f64]) -> Vec<usize> {
    (0..problem.len())
        .filter(|&i| problem.label(i) * outputs[i] < 1.0)
        .collect()
}

fn objective(
    problem: &SvmProblem<'_>,
    lambda: f64,
    weights: &[f64],
    outputs: &[f64],
    active: &[usize],
    cpos: f64,
    cneg: f64,
) -> f64 {
    let loss: f64 = active
        .iter()
        .map(|&i| {
            let margin = 1.0 - problem.label(i) * outputs[i];
            problem.cost(i, cpos, cneg) * margin * margin
        })
        .sum();
    0.5 * (lambda * norm_squared(weights) + loss)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::feature_matrix::test_utils::{
        example,
        names,
    };
    use crate::models::{
        FeatureMatrix,
        TargetDecoy,
    };
    use crate::svm::test_utils::separable;
    use approx::assert_relative_eq;

    #[test]
    fn test_separable_data() {
        let m = separable();
        let problem = SvmProblem::new(&m, &[0, 1, 2], &[3, 4, 5]);
        let out = L2SvmMfn::default().train(&problem, 1.0, 1.0).unwrap();

        assert_eq!(out.weights.len(), 3);
        assert_eq!(out.outputs.len(), 6);
        for i in 0..problem.len() {
            assert!(problem.label(i) * out.outputs[i] > 0.0);
            assert_relative_eq!(out.outputs[i], problem.output(i, &out.weights), epsilon = 1e-9);
        }
        assert!(out.weights[0] > 0.0);
        assert!(out.weights[1] > 0.0);
        assert!(out.weights.iter().all(|w| w.is_finite()));
    }

    #[test]
    fn test_cost_asymmetry() {
        // Overlapping classes on one feature. A heavier negative cost pushes
        // the boundary towards the positives.
        let mut examples = Vec::new();
        for i in 0..20 {
            let x = i as f64 / 10.0;
            examples.push(example(&format!("t{}", i), TargetDecoy::Target, vec![x]));
            examples.push(example(&format!("d{}", i), TargetDecoy::Decoy, vec![x - 1.0]));
        }
        let m = FeatureMatrix::try_new(names(1), vec![], examples, false).unwrap();
        let positives: Vec<usize> = (0..m.len()).filter(|&i| m.label(i).is_target()).collect();
        let negatives: Vec<usize> = (0..m.len()).filter(|&i| m.label(i).is_decoy()).collect();
        let problem = SvmProblem::new(&m, &positives, &negatives);

        let solver = L2SvmMfn::default();
        let balanced = solver.train(&problem, 1.0, 1.0).unwrap();
        let strict = solver.train(&problem, 1.0, 10.0).unwrap();

        let boundary = |w: &[f64]| -w[1] / w[0];
        assert!(balanced.weights[0] > 0.0);
        assert!(strict.weights[0] > 0.0);
        assert!(boundary(&strict.weights) > boundary(&balanced.weights));
    }

    #[test]
    fn test_deterministic() {
        let m = separable();
        let problem = SvmProblem::new(&m, &[0, 1, 2], &[3, 4, 5]);
        let solver = L2SvmMfn::default();
        let a = solver.train(&problem, 10.0, 3.0).unwrap();
        let b = solver.train(&problem, 10.0, 3.0).unwrap();
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.convergence, b.convergence);
    }

    #[test]
    fn test_single_class_is_finite() {
        let m = separable();
        let problem = SvmProblem::new(&m, &[], &[3, 4, 5]);
        let out = L2SvmMfn::default().train(&problem, 1.0, 1.0).unwrap();
        assert!(out.weights.iter().all(|w| w.is_finite()));
        assert!(out.outputs.iter().sum::<f64>() < 0.0);
    }
}
