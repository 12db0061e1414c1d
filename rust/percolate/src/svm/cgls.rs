//! Conjugate gradient for the regularized weighted least squares subproblem
//! restricted to the active set:
//!
//! ```text
//! min_w 0.5 * lambda * w'w + 0.5 * sum_{i in active} C_i * (y_i - w'x_i)^2
//! ```

use super::SvmProblem;

pub(super) struct Cgls<'p, 'a> {
    problem: &'p SvmProblem<'a>,
    lambda: f64,
    epsilon: f64,
    max_iterations: usize,
}

impl<'p, 'a> Cgls<'p, 'a> {
    pub fn new(
        problem: &'p SvmProblem<'a>,
        lambda: f64,
        epsilon: f64,
        max_iterations: usize,
    ) -> Self {
        Self {
            problem,
            lambda,
            epsilon,
            max_iterations,
        }
    }

    /// Refines `weights` in place, starting from their current value.
    ///
    /// Only the outputs of active examples are updated. Returns true when the
    /// residual criterion was met within the iteration budget.
    pub fn solve(
        &self,
        active: &[usize],
        weights: &mut [f64],
        outputs: &mut [f64],
        cpos: f64,
        cneg: f64,
    ) -> bool {
        if active.is_empty() {
            return true;
        }

        let problem = self.problem;
        let dim = weights.len();
        let cost: Vec<f64> = active
            .iter()
            .map(|&i| problem.cost(i, cpos, cneg))
            .collect();

        let mut z: Vec<f64> = active
            .iter()
            .zip(cost.iter())
            .map(|(&i, c)| c * (problem.label(i) - outputs[i]))
            .collect();
        let mut q = vec![0.0; active.len()];
        let mut r = vec![0.0; dim];

        self.residual(active, &z, weights, &mut r);
        let mut p = r.clone();
        let mut omega1 = norm_squared(&r);
        let mut omega_p = omega1;
        let epsilon2 = self.epsilon * self.epsilon;

        if omega1 == 0.0 {
            return true;
        }

        for _ in 0..self.max_iterations {
            for (qk, &i) in q.iter_mut().zip(active) {
                *qk = problem.output(i, &p);
            }
            let omega_q: f64 = q
                .iter()
                .zip(cost.iter())
                .map(|(qk, c)| c * qk * qk)
                .sum();

            let denom = self.lambda * omega_p + omega_q;
            if denom <= 0.0 || !denom.is_finite() {
                return false;
            }
            let gamma = omega1 / denom;

            weights
                .iter_mut()
                .zip(p.iter())
                .for_each(|(w, pj)| *w += gamma * pj);
            for (k, &i) in active.iter().enumerate() {
                outputs[i] += gamma * q[k];
                z[k] -= gamma * cost[k] * q[k];
            }

            self.residual(active, &z, weights, &mut r);
            let omega1_new = norm_squared(&r);
            let omega_z = norm_squared(&z);
            if omega1_new < epsilon2 * omega_z {
                return true;
            }

            let beta = omega1_new / omega1;
            p.iter_mut()
                .zip(r.iter())
                .for_each(|(pj, rj)| *pj = rj + beta * *pj);
            omega1 = omega1_new;
            omega_p = norm_squared(&p);
        }

        false
    }

    /// `r = X_active' z - lambda * w`
    fn residual(&self, active: &[usize], z: &[f64], weights: &[f64], r: &mut [f64]) {
        r.fill(0.0);
        for (k, &i) in active.iter().enumerate() {
            self.problem.add_scaled_row(i, z[k], r);
        }
        r.iter_mut()
            .zip(weights)
            .for_each(|(rj, w)| *rj -= self.lambda * w);
    }
}

pub(super) fn norm_squared(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}
