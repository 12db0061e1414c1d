//! Merging of the held out folds and final statistics on the merged list.
//!
//! Every example is scored exactly once, by the weights of the fold that
//! held it out. Scores from different folds are brought to a common scale
//! before the global q-values and posterior error probabilities are computed.

use crate::errors::{
    InputError,
    Result,
};
use crate::ml::pep::{
    estimate_pi0,
    posterior_error_probabilities,
};
use crate::ml::qvalues::{
    LabelledScore,
    assign_qval,
    count_passing,
    sort_by_rank,
};
use crate::ml::{
    ScoreSet,
    ScoredExample,
};
use crate::models::{
    FeatureMatrix,
    TargetDecoy,
};
use crate::normalizer::Normalizer;
use crate::partition::Fold;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportLevel {
    Psm,
    Peptide,
}

impl ReportLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Psm => "PSM",
            Self::Peptide => "peptide",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibratedPsm {
    /// Row of the feature matrix.
    pub index: usize,
    pub label: TargetDecoy,
    pub score: f64,
    pub q_value: f64,
    pub pep: f64,
}

impl LabelledScore for CalibratedPsm {
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

impl From<ScoredExample> for CalibratedPsm {
    fn from(x: ScoredExample) -> Self {
        Self {
            index: x.index,
            label: x.label,
            score: x.score,
            q_value: 1.0,
            pep: 1.0,
        }
    }
}

/// Final, rank ordered list at one reporting level.
#[derive(Debug, Clone, Serialize)]
pub struct CalibratedResults {
    pub level: ReportLevel,
    pub psms: Vec<CalibratedPsm>,
    /// Estimated fraction of incorrect targets.
    pub pi0: f64,
    /// Targets with q-value at or below `fdr`.
    pub passing: usize,
    pub fdr: f64,
}

impl CalibratedResults {
    pub fn targets(&self) -> impl Iterator<Item = &CalibratedPsm> + '_ {
        self.psms.iter().filter(|x| x.label.is_target())
    }

    pub fn decoys(&self) -> impl Iterator<Item = &CalibratedPsm> + '_ {
        self.psms.iter().filter(|x| x.label.is_decoy())
    }
}

/// Linear map applied to one fold's test scores, `(s - cut) / spread`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FoldScaling {
    pub cut: f64,
    pub spread: f64,
}

impl FoldScaling {
    pub fn apply(&self, score: f64) -> f64 {
        (score - self.cut) / self.spread
    }

    /// The selection cut maps to 0 and the median decoy to -1.
    ///
    /// With no target passing, the fold's top score is used as the cut. A
    /// spread that is not strictly positive leaves the scale untouched.
    fn fit(test: &ScoreSet<'_>, fdr: f64) -> Self {
        let top = test.ranked().first().map_or(0.0, |x| x.score);
        let cut = test.score_at_fdr(fdr).unwrap_or(top);
        let median = test.median_decoy_score().unwrap_or(cut - 1.0);
        let spread = cut - median;
        let spread = if spread.is_finite() && spread > 0.0 {
            spread
        } else {
            1.0
        };
        Self { cut, spread }
    }
}

/// Scores every fold's test set with that fold's weights and concatenates
/// them, in matrix order.
///
/// The output does not depend on the order of `folds`, only on which fold
/// holds each example out.
pub fn merge_test_folds(
    matrix: &FeatureMatrix,
    folds: &[Fold],
    weights: &[Vec<f64>],
    selection_fdr: f64,
) -> Result<(Vec<ScoredExample>, Vec<FoldScaling>)> {
    if folds.len() != weights.len() {
        return Err(InputError::FoldWeightCountMismatch {
            folds: folds.len(),
            weights: weights.len(),
        }
        .into());
    }

    let mut merged = Vec::with_capacity(matrix.len());
    let mut scalings = Vec::with_capacity(folds.len());
    for (i, (fold, w)) in folds.iter().zip(weights.iter()).enumerate() {
        matrix.check_weights(w)?;
        let mut test = ScoreSet::new(matrix, &fold.test);
        test.calc_scores(w, selection_fdr);
        let scaling = FoldScaling::fit(&test, selection_fdr);
        debug!(
            "Fold {}: {} test examples, cut {:.4}, spread {:.4}",
            i,
            test.len(),
            scaling.cut,
            scaling.spread
        );
        merged.extend(test.into_ranked().into_iter().map(|mut x| {
            x.score = scaling.apply(x.score);
            x
        }));
        scalings.push(scaling);
    }

    merged.sort_by_key(|x| x.index);
    if merged.windows(2).any(|w| w[0].index == w[1].index) {
        warn!("Test sets overlap, some examples were scored more than once");
    }
    Ok((merged, scalings))
}

/// Keeps the best scoring example per (label, peptide). Examples without a
/// peptide are all kept. Ties keep the lowest matrix row.
pub fn best_per_peptide(matrix: &FeatureMatrix, scored: &[ScoredExample]) -> Vec<ScoredExample> {
    let mut best: HashMap<(TargetDecoy, &str), usize> = HashMap::new();
    let mut keep: Vec<Option<ScoredExample>> = Vec::with_capacity(scored.len());

    for x in scored {
        let Some(peptide) = matrix.info(x.index).peptide.as_deref() else {
            keep.push(Some(*x));
            continue;
        };
        match best.get(&(x.label, peptide)) {
            Some(&slot) => {
                let current = keep[slot].as_ref().map_or(f64::NEG_INFINITY, |c| c.score);
                let current_index = keep[slot].as_ref().map_or(usize::MAX, |c| c.index);
                if x.score > current || (x.score == current && x.index < current_index) {
                    keep[slot] = Some(*x);
                }
                keep.push(None);
            }
            None => {
                best.insert((x.label, peptide), keep.len());
                keep.push(Some(*x));
            }
        }
    }

    let mut out: Vec<ScoredExample> = keep.into_iter().flatten().collect();
    out.sort_by_key(|x| x.index);
    out
}

/// Ranks, assigns q-values, pi0 and posterior error probabilities.
pub fn calibrate(
    level: ReportLevel,
    scored: &[ScoredExample],
    fdr: f64,
    seed: u64,
) -> CalibratedResults {
    let mut psms: Vec<CalibratedPsm> = scored.iter().copied().map(CalibratedPsm::from).collect();
    psms.sort_by_key(|x| x.index);
    sort_by_rank(&mut psms);
    assign_qval(&mut psms);

    let passing = count_passing(&psms, fdr);
    let pi0 = estimate_pi0(&psms, seed);
    let peps = posterior_error_probabilities(&psms);
    psms.iter_mut().zip(peps).for_each(|(x, pep)| x.pep = pep);

    info!(
        "Found {} target {}s with q <= {} (pi0 = {:.4})",
        passing,
        level.as_str(),
        fdr,
        pi0
    );

    CalibratedResults {
        level,
        psms,
        pi0,
        passing,
        fdr,
    }
}

/// Mean raw value of every retention time feature over the passing targets.
///
/// Empty when the matrix carries no retention time block or nothing passes.
pub fn rt_feature_means(
    matrix: &FeatureMatrix,
    normalizer: &Normalizer,
    results: &CalibratedResults,
) -> Vec<(String, f64)> {
    let columns = matrix.rt_columns();
    if columns.is_empty() {
        return Vec::new();
    }

    let mut sums = vec![0.0; columns.len()];
    let mut count = 0usize;
    let mut row = vec![0.0; matrix.num_columns()];
    for x in results
        .targets()
        .filter(|x| x.q_value <= results.fdr)
    {
        row.copy_from_slice(matrix.row(x.index));
        normalizer.unnormalize_row(&mut row);
        sums.iter_mut()
            .zip(&row[columns.clone()])
            .for_each(|(s, v)| *s += v);
        count += 1;
    }
    if count == 0 {
        return Vec::new();
    }

    matrix.feature_names()[columns]
        .iter()
        .cloned()
        .zip(sums.into_iter().map(|s| s / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PercolateError;
    use crate::models::feature_matrix::test_utils::{
        example,
        names,
    };
    use crate::models::Example;
    use crate::normalizer::NormalizationKind;
    use approx::assert_relative_eq;
    use rand::{
        Rng,
        SeedableRng,
    };
    use rand_chacha::ChaCha8Rng;

    fn matrix(n: usize) -> FeatureMatrix {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let examples = (0..n)
            .map(|i| {
                let (label, shift) = if i % 2 == 0 {
                    (TargetDecoy::Target, 1.5)
                } else {
                    (TargetDecoy::Decoy, 0.0)
                };
                example(
                    &format!("psm{}", i),
                    label,
                    vec![rng.gen_range(0.0..2.0) + shift, rng.gen_range(0.0..1.0)],
                )
            })
            .collect();
        FeatureMatrix::try_new(names(2), vec![], examples, false).unwrap()
    }

    fn folds_of(sizes: &[usize]) -> Vec<Fold> {
        let total: usize = sizes.iter().sum();
        let mut start = 0;
        sizes
            .iter()
            .map(|&size| {
                let test: Vec<usize> = (start..start + size).collect();
                let train = (0..total).filter(|i| !test.contains(i)).collect();
                start += size;
                Fold { train, test }
            })
            .collect()
    }

    #[test]
    fn test_merge_covers_population_once() {
        let m = matrix(100);
        let folds = folds_of(&[30, 30, 40]);
        let weights = vec![
            vec![1.0, 0.2, 0.0],
            vec![2.0, 0.0, -1.0],
            vec![0.5, 0.1, 0.3],
        ];
        let (merged, scalings) = merge_test_folds(&m, &folds, &weights, 0.05).unwrap();
        assert_eq!(merged.len(), 100);
        assert_eq!(scalings.len(), 3);
        for (i, x) in merged.iter().enumerate() {
            assert_eq!(x.index, i);
        }

        let results = calibrate(ReportLevel::Psm, &merged, 0.05, 1);
        assert_eq!(results.psms.len(), 100);
        assert!(
            results
                .psms
                .iter()
                .all(|x| (0.0..=1.0).contains(&x.q_value) && (0.0..=1.0).contains(&x.pep))
        );
        for w in results.psms.windows(2) {
            assert!(w[0].score >= w[1].score);
            assert!(w[0].q_value <= w[1].q_value);
        }
    }

    #[test]
    fn test_merge_independent_of_fold_order() {
        let m = matrix(60);
        let mut folds = folds_of(&[20, 20, 20]);
        let mut weights = vec![
            vec![1.0, 0.0, 0.0],
            vec![1.0, 1.0, 0.0],
            vec![0.0, 1.0, 0.0],
        ];
        let (a, _) = merge_test_folds(&m, &folds, &weights, 0.1).unwrap();
        folds.reverse();
        weights.reverse();
        let (b, _) = merge_test_folds(&m, &folds, &weights, 0.1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_merge_rejects_mismatched_weights() {
        let m = matrix(10);
        let folds = folds_of(&[5, 5]);
        let res = merge_test_folds(&m, &folds, &[vec![1.0, 0.0, 0.0]], 0.01);
        assert!(matches!(
            res,
            Err(PercolateError::Input(InputError::FoldWeightCountMismatch {
                folds: 2,
                weights: 1
            }))
        ));
    }

    #[test]
    fn test_fold_scaling() {
        // Targets 4, 3, decoys 1, 0, -1: cut at 3, median decoy 0.
        let examples = vec![
            example("t1", TargetDecoy::Target, vec![4.0]),
            example("t2", TargetDecoy::Target, vec![3.0]),
            example("d1", TargetDecoy::Decoy, vec![1.0]),
            example("d2", TargetDecoy::Decoy, vec![0.0]),
            example("d3", TargetDecoy::Decoy, vec![-1.0]),
        ];
        let m = FeatureMatrix::try_new(names(1), vec![], examples, false).unwrap();
        let mut test = ScoreSet::new(&m, &[0, 1, 2, 3, 4]);
        test.calc_scores(&[1.0, 0.0], 0.01);
        let scaling = FoldScaling::fit(&test, 0.01);
        assert_relative_eq!(scaling.cut, 3.0);
        assert_relative_eq!(scaling.spread, 3.0);
        assert_relative_eq!(scaling.apply(3.0), 0.0);
        assert_relative_eq!(scaling.apply(0.0), -1.0);
    }

    fn with_peptide(id: &str, label: TargetDecoy, x: f64, peptide: Option<&str>) -> Example {
        let mut e = example(id, label, vec![x]);
        e.info.peptide = peptide.map(String::from);
        e
    }

    #[test]
    fn test_best_per_peptide() {
        let examples = vec![
            with_peptide("a1", TargetDecoy::Target, 1.0, Some("PEPA")),
            with_peptide("a2", TargetDecoy::Target, 3.0, Some("PEPA")),
            with_peptide("b1", TargetDecoy::Target, 2.0, Some("PEPB")),
            with_peptide("n1", TargetDecoy::Target, 0.5, None),
            with_peptide("n2", TargetDecoy::Target, 0.5, None),
            // Same sequence on the decoy side is a different entry.
            with_peptide("d1", TargetDecoy::Decoy, 0.1, Some("PEPA")),
            with_peptide("d2", TargetDecoy::Decoy, 0.1, Some("PEPA")),
        ];
        let m = FeatureMatrix::try_new(names(1), vec![], examples, false).unwrap();
        let mut set = ScoreSet::new(&m, &[0, 1, 2, 3, 4, 5, 6]);
        set.calc_scores(&[1.0, 0.0], 0.01);
        let scored = set.into_ranked();

        let unique = best_per_peptide(&m, &scored);
        let kept: Vec<usize> = unique.iter().map(|x| x.index).collect();
        assert_eq!(kept, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_calibrate_counts() {
        let scored: Vec<ScoredExample> = [
            (5.0, TargetDecoy::Target),
            (4.0, TargetDecoy::Target),
            (3.0, TargetDecoy::Target),
            (2.0, TargetDecoy::Decoy),
            (1.0, TargetDecoy::Target),
        ]
        .iter()
        .enumerate()
        .map(|(index, &(score, label))| ScoredExample {
            index,
            label,
            score,
            q_value: 1.0,
        })
        .collect();
        let results = calibrate(ReportLevel::Psm, &scored, 0.01, 1);
        assert_eq!(results.passing, 3);
        assert_eq!(results.targets().count(), 4);
        assert_eq!(results.decoys().count(), 1);
        assert_relative_eq!(results.psms[4].q_value, 0.25);
        assert!((0.0..=1.0).contains(&results.pi0));
    }

    #[test]
    fn test_rt_feature_means() {
        let examples: Vec<Example> = (0..10)
            .map(|i| {
                let label = if i < 5 {
                    TargetDecoy::Target
                } else {
                    TargetDecoy::Decoy
                };
                let mut e = example(&format!("p{}", i), label, vec![10.0 - i as f64]);
                e.rt_features = vec![i as f64];
                e
            })
            .collect();
        let raw =
            FeatureMatrix::try_new(names(1), vec!["rt_diff".into()], examples, true).unwrap();
        let norm = Normalizer::fit(&raw, NormalizationKind::Stdv);
        let m = norm.normalize(raw);
        let all: Vec<usize> = (0..m.len()).collect();
        let mut set = ScoreSet::new(&m, &all);
        set.calc_scores(&[1.0, 0.0, 0.0], 0.01);
        let results = calibrate(ReportLevel::Psm, set.ranked(), 0.01, 1);
        assert_eq!(results.passing, 5);

        let means = rt_feature_means(&m, &norm, &results);
        assert_eq!(means.len(), 1);
        assert_eq!(means[0].0, "rt_diff");
        assert_relative_eq!(means[0].1, 2.0, epsilon = 1e-9);
    }
}
