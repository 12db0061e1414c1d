use crate::models::TargetDecoy;
use std::cmp::Ordering;

pub trait LabelledScore {
    fn get_score(&self) -> f64;
    fn get_label(&self) -> TargetDecoy;
    fn assign_qval(&mut self, q: f64);
    fn get_qval(&self) -> f64;
}

impl LabelledScore for (f64, TargetDecoy, f64) {
    fn get_score(&self) -> f64 {
        self.0
    }

    fn get_label(&self) -> TargetDecoy {
        self.1
    }

    fn assign_qval(&mut self, q: f64) {
        self.2 = q
    }

    fn get_qval(&self) -> f64 {
        self.2
    }
}

/// Descending by score, decoys ahead of targets on equal scores.
pub fn rank_order<T: LabelledScore>(a: &T, b: &T) -> Ordering {
    b.get_score()
        .total_cmp(&a.get_score())
        .then_with(|| b.get_label().is_decoy().cmp(&a.get_label().is_decoy()))
}

/// Sorts into rank order. The sort is stable, so equal entries keep their
/// input order.
pub fn sort_by_rank<T: LabelledScore>(scores: &mut [T]) {
    scores.sort_by(rank_order);
}

/// Assign q_values in place.
///
/// # Invariants
/// * `scores` must be in rank order (see [`sort_by_rank`])
///
/// Decoys are counted at their own position and receive the q-value of the
/// best target ranked at or below them, they never lower a target's q-value.
pub fn assign_qval<T: LabelledScore>(scores: &mut [T]) {
    // FDR Calculation:
    // * Walk best to worst, FDR = decoys / targets seen so far
    // * Cumulative minimum from the worst rank, over targets only
    let (Some(first_score), Some(last_score)) = (scores.first(), scores.last()) else {
        return;
    };
    debug_assert!(first_score.get_score() >= last_score.get_score());

    let mut decoy = 0;
    let mut target = 0;

    for score in scores.iter_mut() {
        match score.get_label() {
            TargetDecoy::Decoy => decoy += 1,
            TargetDecoy::Target => target += 1,
        }
        let fdr = if target == 0 {
            1.0
        } else {
            (decoy as f64 / target as f64).min(1.0)
        };
        score.assign_qval(fdr);
    }

    let mut q_min = 1.0f64;
    for score in scores.iter_mut().rev() {
        if score.get_label().is_target() {
            q_min = q_min.min(score.get_qval());
        }
        score.assign_qval(q_min);
    }
}

/// Number of targets with q-value at or below `fdr`.
pub fn count_passing<T: LabelledScore>(scores: &[T], fdr: f64) -> usize {
    scores
        .iter()
        .filter(|x| x.get_label().is_target() && x.get_qval() <= fdr)
        .count()
}

/// Q-values for unsorted scores, returned in input order.
pub fn q_values(scores: &[f64], labels: &[TargetDecoy]) -> Vec<f64> {
    let mut ranked: Vec<(usize, (f64, TargetDecoy, f64))> = scores
        .iter()
        .zip(labels.iter())
        .enumerate()
        .map(|(i, (&s, &l))| (i, (s, l, 1.0)))
        .collect();
    ranked.sort_by(|a, b| rank_order(&a.1, &b.1));

    let mut triples: Vec<(f64, TargetDecoy, f64)> = ranked.iter().map(|x| x.1).collect();
    assign_qval(&mut triples);

    let mut out = vec![1.0; scores.len()];
    for ((i, _), triple) in ranked.iter().zip(triples.iter()) {
        out[*i] = triple.2;
    }
    out
}
