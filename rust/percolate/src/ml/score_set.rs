use super::qvalues::{
    LabelledScore,
    assign_qval,
    count_passing,
    sort_by_rank,
};
use crate::models::{
    FeatureMatrix,
    TargetDecoy,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredExample {
    /// Row of the feature matrix.
    pub index: usize,
    pub label: TargetDecoy,
    pub score: f64,
    pub q_value: f64,
}

impl LabelledScore for ScoredExample {
    fn get_score(&self) -> f64 {
        self.score
    }

    fn get_label(&self) -> TargetDecoy {
        self.label
    }

    fn assign_qval(&mut self, q: f64) {
        self.q_value = q
    }

    fn get_qval(&self) -> f64 {
        self.q_value
    }
}

/// Ranked scores of a subset of the feature matrix (one side of a fold).
///
/// Scores are only valid for the weights of the last [`ScoreSet::calc_scores`]
/// call, they are recomputed every outer iteration.
#[derive(Debug, Clone)]
pub struct ScoreSet<'a> {
    matrix: &'a FeatureMatrix,
    ranked: Vec<ScoredExample>,
}

impl<'a> ScoreSet<'a> {
    pub fn new(matrix: &'a FeatureMatrix, members: &[usize]) -> Self {
        let ranked = members
            .iter()
            .map(|&index| ScoredExample {
                index,
                label: matrix.label(index),
                score: 0.0,
                q_value: 1.0,
            })
            .collect();
        Self { matrix, ranked }
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Recomputes every member's score with `weights`, without ranking.
    pub fn score(&mut self, weights: &[f64]) {
        for example in self.ranked.iter_mut() {
            example.score = self.matrix.score(example.index, weights);
        }
    }

    /// Ranks the members by their current scores and assigns q-values.
    pub fn compute_q_values(&mut self) {
        // Restore matrix order first so ties rank the same way whatever the
        // previous ranking was.
        self.ranked.sort_by_key(|x| x.index);
        sort_by_rank(&mut self.ranked);
        assign_qval(&mut self.ranked);
    }

    /// Scores, ranks and returns the number of targets passing `fdr`.
    pub fn calc_scores(&mut self, weights: &[f64], fdr: f64) -> usize {
        self.score(weights);
        self.compute_q_values();
        self.count_passing(fdr)
    }

    pub fn count_passing(&self, fdr: f64) -> usize {
        count_passing(&self.ranked, fdr)
    }

    /// Targets with q-value at or below `fdr`, as ascending matrix rows.
    pub fn positives(&self, fdr: f64) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .ranked
            .iter()
            .filter(|x| x.label.is_target() && x.q_value <= fdr)
            .map(|x| x.index)
            .collect();
        out.sort_unstable();
        out
    }

    /// Every decoy, as ascending matrix rows.
    pub fn negatives(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .ranked
            .iter()
            .filter(|x| x.label.is_decoy())
            .map(|x| x.index)
            .collect();
        out.sort_unstable();
        out
    }

    /// Members in rank order.
    pub fn ranked(&self) -> &[ScoredExample] {
        &self.ranked
    }

    pub fn into_ranked(self) -> Vec<ScoredExample> {
        self.ranked
    }

    /// Score of the worst ranked target still passing `fdr`.
    pub fn score_at_fdr(&self, fdr: f64) -> Option<f64> {
        self.ranked
            .iter()
            .filter(|x| x.label.is_target() && x.q_value <= fdr)
            .last()
            .map(|x| x.score)
    }

    /// Median decoy score (lower median for an even count).
    pub fn median_decoy_score(&self) -> Option<f64> {
        let decoys: Vec<f64> = self
            .ranked
            .iter()
            .filter(|x| x.label.is_decoy())
            .map(|x| x.score)
            .collect();
        if decoys.is_empty() {
            return None;
        }
        // Ranked descending, the median sits in the middle either way.
        Some(decoys[decoys.len() / 2])
    }

    /// Number of targets and decoys scoring strictly above zero.
    pub fn count_above_zero(&self) -> (usize, usize) {
        self.ranked
            .iter()
            .filter(|x| x.score > 0.0)
            .fold((0, 0), |(t, d), x| match x.label {
                TargetDecoy::Target => (t + 1, d),
                TargetDecoy::Decoy => (t, d + 1),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::feature_matrix::test_utils::{
        example,
        names,
    };
    use TargetDecoy::{
        Decoy,
        Target,
    };

    fn matrix() -> FeatureMatrix {
        let mut examples = Vec::new();
        for i in 0..20 {
            examples.push(example(&format!("t{}", i), Target, vec![i as f64 + 5.0]));
        }
        for i in 0..10 {
            examples.push(example(&format!("d{}", i), Decoy, vec![i as f64]));
        }
        FeatureMatrix::try_new(names(1), vec![], examples, false).unwrap()
    }

    #[test]
    fn test_calc_scores() {
        let m = matrix();
        let members: Vec<usize> = (0..m.len()).collect();
        let mut set = ScoreSet::new(&m, &members);

        // Decoys top out at 9, targets span 5..24: 15 targets above every decoy.
        let passing = set.calc_scores(&[1.0, 0.0], 0.0);
        assert_eq!(passing, 15);
        assert_eq!(set.positives(0.0).len(), 15);
        assert_eq!(set.negatives().len(), 10);
        assert_eq!(set.ranked()[0].index, 19);
        assert_eq!(set.score_at_fdr(0.0), Some(10.0));

        // Flipped direction puts decoys first.
        let passing = set.calc_scores(&[-1.0, 0.0], 0.01);
        assert_eq!(passing, 0);
        assert!(set.positives(0.01).is_empty());
        assert_eq!(set.score_at_fdr(0.01), None);
    }

    #[test]
    fn test_relabeling_idempotent() {
        let m = matrix();
        let members: Vec<usize> = (0..m.len()).collect();
        let mut set = ScoreSet::new(&m, &members);
        let weights = [0.5, -3.0];

        set.calc_scores(&weights, 0.1);
        let first = set.positives(0.1);
        set.calc_scores(&weights, 0.1);
        set.compute_q_values();
        assert_eq!(first, set.positives(0.1));
    }

    #[test]
    fn test_subset_and_summaries() {
        let m = matrix();
        let members = vec![0, 2, 4, 20, 21, 22];
        let mut set = ScoreSet::new(&m, &members);
        set.calc_scores(&[1.0, -6.0], 0.01);
        assert_eq!(set.len(), 6);
        // Decoys score -6, -5, -4
        assert_eq!(set.median_decoy_score(), Some(-5.0));
        // Targets score -1, 1, 3
        assert_eq!(set.count_above_zero(), (2, 0));
        assert!(set.ranked().iter().all(|x| members.contains(&x.index)));
    }
}
