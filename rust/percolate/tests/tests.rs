use approx::assert_relative_eq;
use percolate::calibrate::{
    ReportLevel,
    calibrate,
    merge_test_folds,
};
use percolate::errors::{
    InputError,
    PercolateError,
};
use percolate::ml::grid::{
    CostGrid,
    grid_search,
};
use percolate::ml::qvalues::q_values;
use percolate::ml::{
    ScoreSet,
    Trainer,
};
use percolate::normalizer::{
    NormalizationKind,
    Normalizer,
};
use percolate::partition::{
    Fold,
    PartitionPolicy,
    Partitioner,
};
use percolate::sanity::SanityCheck;
use percolate::svm::{
    L2SvmMfn,
    SvmProblem,
};
use percolate::{
    Example,
    FeatureMatrix,
    PinData,
    PsmInfo,
    TargetDecoy,
    TrainingConfig,
};
use rand::{
    Rng,
    SeedableRng,
};
use rand_chacha::ChaCha8Rng;

fn psm(id: String, label: TargetDecoy, features: Vec<f64>) -> Example {
    Example {
        info: PsmInfo {
            id,
            label,
            spectrum: None,
            peptide: None,
            proteins: Vec::new(),
        },
        features,
        rt_features: Vec::new(),
    }
}

/// 100 targets above zero and 100 decoys below zero on the first feature,
/// the second feature is noise.
fn separable_examples() -> Vec<Example> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut examples = Vec::new();
    for i in 0..100 {
        examples.push(psm(
            format!("target_{}", i),
            TargetDecoy::Target,
            vec![rng.gen_range(0.1..2.0), rng.gen_range(-1.0..1.0)],
        ));
        examples.push(psm(
            format!("decoy_{}", i),
            TargetDecoy::Decoy,
            vec![rng.gen_range(-2.0..-0.1), rng.gen_range(-1.0..1.0)],
        ));
    }
    examples
}

fn names() -> Vec<String> {
    vec!["separator".to_string(), "noise".to_string()]
}

#[test]
fn test_perfect_separator_one_iteration() {
    let raw = FeatureMatrix::try_new(names(), vec![], separable_examples(), false).unwrap();
    let norm = Normalizer::fit(&raw, NormalizationKind::Stdv);
    let matrix = norm.normalize(raw);
    let config = TrainingConfig {
        iterations: 1,
        ..Default::default()
    };
    let folds = Partitioner::new(config.folds, config.seed, config.partition)
        .split(&matrix)
        .unwrap();
    let check = SanityCheck::new(config.effective_selection_fdr(), config.test_fdr);
    let outcome = Trainer::new(&matrix, &config, L2SvmMfn::new(config.solver), check)
        .train(folds, &norm)
        .unwrap();

    let all: Vec<usize> = (0..matrix.len()).collect();
    for weights in &outcome.weights {
        assert!(weights[0] > 0.0, "weights = {:?}", weights);
        let mut set = ScoreSet::new(&matrix, &all);
        set.calc_scores(weights, 0.01);
        assert!(set.positives(0.01).len() >= 95);
    }
}

#[test]
fn test_no_signal_falls_back() {
    let examples: Vec<Example> = (0..200)
        .map(|i| {
            let label = if i % 2 == 0 {
                TargetDecoy::Target
            } else {
                TargetDecoy::Decoy
            };
            psm(format!("psm_{}", i), label, vec![1.0, 3.0])
        })
        .collect();

    let scores = vec![0.0; examples.len()];
    let labels: Vec<TargetDecoy> = examples.iter().map(|e| e.info.label).collect();
    for (q, label) in q_values(&scores, &labels).iter().zip(labels.iter()) {
        if label.is_target() {
            assert_relative_eq!(*q, 1.0);
        }
    }

    let data = PinData {
        feature_names: names(),
        rt_feature_names: vec![],
        examples,
        default_weights: None,
    };
    let config = TrainingConfig {
        iterations: 2,
        ..Default::default()
    };
    let out = percolate::run(data, &config).unwrap();
    assert!(out.training.fell_back);
    assert!(!out.training.verdict.is_plausible());
    assert_eq!(out.psms.passing, 0);
    assert_eq!(out.psms.psms.len(), 200);
    assert!(out.psms.targets().all(|x| x.q_value > 0.99));
}

fn tied_data() -> PinData {
    let examples: Vec<Example> = (0..200)
        .map(|i| {
            let label = if i % 2 == 0 {
                TargetDecoy::Target
            } else {
                TargetDecoy::Decoy
            };
            psm(format!("psm_{}", i), label, vec![1.0, 3.0])
        })
        .collect();
    PinData {
        feature_names: names(),
        rt_feature_names: vec![],
        examples,
        default_weights: None,
    }
}

#[test]
fn test_override_direction_check() {
    let config = TrainingConfig {
        iterations: 2,
        override_direction_check: true,
        ..Default::default()
    };
    let out = percolate::run(tied_data(), &config).unwrap();
    assert!(!out.training.verdict.is_plausible());
    assert!(!out.training.fell_back);
    assert_eq!(out.psms.psms.len(), 200);
}

#[test]
fn test_holdout_run() {
    let data = PinData {
        feature_names: names(),
        rt_feature_names: vec![],
        examples: separable_examples(),
        default_weights: None,
    };
    let config = TrainingConfig {
        iterations: 2,
        partition: PartitionPolicy::Holdout,
        ..Default::default()
    };
    let out = percolate::run(data, &config).unwrap();
    assert_eq!(out.training.folds.len(), 1);
    assert_eq!(out.weights.len(), 1);

    // Only the held out examples are reported.
    let fold = &out.training.folds[0];
    assert_eq!(fold.train.len() + fold.test.len(), 200);
    assert_eq!(out.psms.psms.len(), fold.test.len());
    assert!(out.psms.psms.iter().all(|x| fold.test.contains(&x.index)));
    assert!(out.psms.passing > 0);
}

#[test]
fn test_single_fold_rejected() {
    let raw = FeatureMatrix::try_new(names(), vec![], separable_examples(), false).unwrap();
    let res = Partitioner::new(1, 1, PartitionPolicy::ByLabel).split(&raw);
    assert!(matches!(
        res,
        Err(PercolateError::Input(InputError::InvalidFoldCount { folds: 1 }))
    ));

    let config = TrainingConfig {
        folds: 1,
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_merge_three_folds() {
    let raw = FeatureMatrix::try_new(names(), vec![], separable_examples(), false).unwrap();
    let matrix = Normalizer::fit(&raw, NormalizationKind::Stdv).normalize(raw);

    // Test sets of 30, 30 and 40 examples out of the first 100 rows.
    let bounds = [(0, 30), (30, 60), (60, 100)];
    let folds: Vec<Fold> = bounds
        .iter()
        .map(|&(start, end)| Fold {
            train: (0..100).filter(|i| *i < start || *i >= end).collect(),
            test: (start..end).collect(),
        })
        .collect();
    let weights = vec![
        vec![1.0, 0.0, 0.0],
        vec![0.8, 0.3, 0.1],
        vec![1.2, -0.2, -0.1],
    ];

    let (merged, _) = merge_test_folds(&matrix, &folds, &weights, 0.01).unwrap();
    assert_eq!(merged.len(), 100);
    let results = calibrate(ReportLevel::Psm, &merged, 0.01, 1);
    assert_eq!(results.psms.len(), 100);
    assert!(results.psms.iter().all(|x| (0.0..=1.0).contains(&x.q_value)));
    for w in results.psms.windows(2) {
        assert!(w[0].q_value <= w[1].q_value);
    }
}

#[test]
fn test_partition_invariants() {
    let raw = FeatureMatrix::try_new(names(), vec![], separable_examples(), false).unwrap();
    for folds in 2..=5 {
        let split = Partitioner::new(folds, 3, PartitionPolicy::ByLabel)
            .split(&raw)
            .unwrap();
        assert_eq!(split.len(), folds);

        let mut tested: Vec<usize> = split.iter().flat_map(|f| f.test.clone()).collect();
        tested.sort_unstable();
        assert_eq!(tested, (0..raw.len()).collect::<Vec<_>>());
        for fold in &split {
            assert!(fold.train.iter().all(|i| !fold.test.contains(i)));
            assert_eq!(fold.train.len() + fold.test.len(), raw.len());
        }
    }
}

#[test]
fn test_relabeling_is_idempotent() {
    let raw = FeatureMatrix::try_new(names(), vec![], separable_examples(), false).unwrap();
    let members: Vec<usize> = (0..raw.len()).collect();
    let weights = [0.7, 0.4, 0.0];
    let mut set = ScoreSet::new(&raw, &members);
    set.calc_scores(&weights, 0.05);
    let first = set.positives(0.05);
    set.calc_scores(&weights, 0.05);
    assert_eq!(set.positives(0.05), first);
}

#[test]
fn test_normalization_round_trip() {
    let raw = FeatureMatrix::try_new(names(), vec![], separable_examples(), false).unwrap();
    for kind in [NormalizationKind::Stdv, NormalizationKind::Unit] {
        let norm = Normalizer::fit(&raw, kind);
        let back = norm.unnormalize(norm.normalize(raw.clone()));
        for (a, b) in raw.rows().zip(back.rows()) {
            for (x, y) in a.iter().zip(b.iter()) {
                assert_relative_eq!(*x, *y, epsilon = 1e-9);
            }
        }
    }
}

#[test]
fn test_grid_search_determinism() {
    let raw = FeatureMatrix::try_new(names(), vec![], separable_examples(), false).unwrap();
    let matrix = Normalizer::fit(&raw, NormalizationKind::Stdv).normalize(raw);
    let members: Vec<usize> = (0..matrix.len()).collect();
    let grid = CostGrid::new(None, None, matrix.target_decoy_ratio());

    let run = || {
        let mut train = ScoreSet::new(&matrix, &members);
        train.calc_scores(&[1.0, 0.0, 0.0], 0.01);
        let positives = train.positives(0.01);
        let negatives = train.negatives();
        let problem = SvmProblem::new(&matrix, &positives, &negatives);
        grid_search(
            &L2SvmMfn::default(),
            &grid,
            &problem,
            &mut train,
            0.01,
            &[1.0, 0.0, 0.0],
        )
        .unwrap()
    };
    let a = run();
    let b = run();
    assert_eq!(a.cell, b.cell);
    assert_eq!(a.weights, b.weights);
    assert!(a.cell.is_some());
}
