//! Exact line search along `w + t * (w_bar - w)`, `t` in [0, 1].
//!
//! The objective is piecewise quadratic in `t`, its derivative is piecewise
//! linear with breakpoints where an example enters or leaves the margin.
//! Breakpoints are visited in order until the derivative changes sign.

use super::SvmProblem;

struct Breakpoint {
    t: f64,
    index: usize,
    /// -1 when the example leaves the active set, 1 when it joins.
    sign: f64,
}

#[allow(clippy::too_many_arguments)]
pub(super) fn line_search(
    problem: &SvmProblem<'_>,
    w: &[f64],
    w_bar: &[f64],
    lambda: f64,
    o: &[f64],
    o_bar: &[f64],
    cpos: f64,
    cneg: f64,
) -> f64 {
    let (omega_l, omega_r) = w
        .iter()
        .zip(w_bar)
        .fold((0.0, 0.0), |(l, r), (wi, wbi)| {
            let diff = wbi - wi;
            (l + wi * diff, r + wbi * diff)
        });

    // Derivative of the objective at t = 0 and t = 1 for the current active set.
    let mut left = lambda * omega_l;
    let mut right = lambda * omega_r;

    let mut breakpoints = Vec::new();
    for i in 0..problem.len() {
        let y = problem.label(i);
        let cost = problem.cost(i, cpos, cneg);
        let diff = y * (o_bar[i] - o[i]);

        if y * o[i] < 1.0 {
            let d2 = cost * (o_bar[i] - o[i]);
            left += (o[i] - y) * d2;
            right += (o_bar[i] - y) * d2;
            if diff > 0.0 {
                breakpoints.push(Breakpoint {
                    t: (1.0 - y * o[i]) / diff,
                    index: i,
                    sign: -1.0,
                });
            }
        } else if diff < 0.0 {
            breakpoints.push(Breakpoint {
                t: (1.0 - y * o[i]) / diff,
                index: i,
                sign: 1.0,
            });
        }
    }

    breakpoints.sort_by(|a, b| a.t.total_cmp(&b.t));

    for bp in &breakpoints {
        let slope = left + bp.t * (right - left);
        if slope >= 0.0 {
            break;
        }
        let i = bp.index;
        let y = problem.label(i);
        let diff = bp.sign * problem.cost(i, cpos, cneg) * (o_bar[i] - o[i]);
        left += diff * (o[i] - y);
        right += diff * (o_bar[i] - y);
    }

    let span = right - left;
    if span.abs() < f64::EPSILON || !span.is_finite() {
        return 0.0;
    }
    (-left / span).clamp(0.0, 1.0)
}
