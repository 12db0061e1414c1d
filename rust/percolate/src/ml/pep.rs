//! Posterior error probabilities and the fraction of incorrect targets.

use super::qvalues::LabelledScore;
use crate::models::TargetDecoy;
use rand::{
    Rng,
    SeedableRng,
};
use rand_chacha::ChaCha8Rng;

const PI0_LAMBDA_STEP: f64 = 0.05;
const PI0_LAMBDA_MAX: f64 = 0.9;
const PI0_BOOTSTRAP_SAMPLES: usize = 100;

/// Posterior error probability of every entry of a rank ordered list.
///
/// The local decoy fraction along the ranking is fitted by isotonic
/// regression (non-decreasing with rank, tied scores share a value) and
/// converted to a local decoy/target ratio. The result is capped at 1.
pub fn posterior_error_probabilities<T: LabelledScore>(ranked: &[T]) -> Vec<f64> {
    // Blocks of (decoy count, size), tied scores start in the same block.
    let mut blocks: Vec<(f64, f64, usize)> = Vec::new();
    let mut start = 0;
    while start < ranked.len() {
        let score = ranked[start].get_score();
        let mut end = start;
        let mut decoys = 0.0;
        while end < ranked.len() && ranked[end].get_score() == score {
            if ranked[end].get_label().is_decoy() {
                decoys += 1.0;
            }
            end += 1;
        }
        blocks.push((decoys, (end - start) as f64, end - start));
        start = end;

        // Pool adjacent violators.
        while blocks.len() >= 2 {
            let (d1, n1, c1) = blocks[blocks.len() - 1];
            let (d0, n0, c0) = blocks[blocks.len() - 2];
            if d0 / n0 <= d1 / n1 {
                break;
            }
            blocks.pop();
            let last = blocks.len() - 1;
            blocks[last] = (d0 + d1, n0 + n1, c0 + c1);
        }
    }

    let mut peps = Vec::with_capacity(ranked.len());
    for (decoys, size, count) in blocks {
        let fraction = decoys / size;
        let pep = if fraction >= 0.5 {
            1.0
        } else {
            fraction / (1.0 - fraction)
        };
        peps.extend(std::iter::repeat(pep).take(count));
    }
    peps
}

/// Storey's bootstrap estimate of the fraction of incorrect targets.
///
/// Target p-values are taken from the decoy score distribution. The
/// tuning parameter is picked by the lowest bootstrap mean squared error
/// against the smallest estimate on the lambda grid.
pub fn estimate_pi0<T: LabelledScore>(scores: &[T], seed: u64) -> f64 {
    let mut decoys: Vec<f64> = scores
        .iter()
        .filter(|x| x.get_label() == TargetDecoy::Decoy)
        .map(|x| x.get_score())
        .collect();
    if decoys.is_empty() {
        return 1.0;
    }
    decoys.sort_by(|a, b| a.total_cmp(b));

    let num_decoys = decoys.len() as f64;
    let p_values: Vec<f64> = scores
        .iter()
        .filter(|x| x.get_label() == TargetDecoy::Target)
        .map(|x| {
            let below = decoys.partition_point(|&d| d < x.get_score());
            let at_or_above = decoys.len() - below;
            (at_or_above as f64 + 1.0) / (num_decoys + 1.0)
        })
        .collect();
    if p_values.is_empty() {
        return 1.0;
    }

    let lambdas: Vec<f64> = (0..)
        .map(|i| i as f64 * PI0_LAMBDA_STEP)
        .take_while(|l| *l <= PI0_LAMBDA_MAX + 1e-9)
        .collect();

    let pi0s: Vec<f64> = lambdas.iter().map(|&l| pi0_at(&p_values, l)).collect();
    let min_pi0 = pi0s.iter().copied().fold(f64::INFINITY, f64::min);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut mse = vec![0.0; lambdas.len()];
    let mut sample = vec![0.0; p_values.len()];
    for _ in 0..PI0_BOOTSTRAP_SAMPLES {
        for s in sample.iter_mut() {
            *s = p_values[rng.gen_range(0..p_values.len())];
        }
        for (err, &l) in mse.iter_mut().zip(lambdas.iter()) {
            let diff = pi0_at(&sample, l) - min_pi0;
            *err += diff * diff;
        }
    }

    let best = mse
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    pi0s[best].clamp(0.0, 1.0)
}

fn pi0_at(p_values: &[f64], lambda: f64) -> f64 {
    let above = p_values.iter().filter(|&&p| p > lambda).count() as f64;
    above / ((1.0 - lambda) * p_values.len() as f64)
}
