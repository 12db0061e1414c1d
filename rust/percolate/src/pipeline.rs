//! End to end run: normalize, partition, train, merge and calibrate.

use crate::calibrate::{
    CalibratedResults,
    FoldScaling,
    ReportLevel,
    best_per_peptide,
    calibrate,
    merge_test_folds,
    rt_feature_means,
};
use crate::config::TrainingConfig;
use crate::data_sources::PinData;
use crate::errors::Result;
use crate::ml::{
    IterationReport,
    Trainer,
    TrainingOutcome,
};
use crate::models::FeatureMatrix;
use crate::normalizer::Normalizer;
use crate::output::WeightReport;
use crate::partition::Partitioner;
use crate::sanity::SanityCheck;
use crate::svm::L2SvmMfn;
use crate::timings::Timings;
use tracing::{
    info,
    warn,
};

#[derive(Debug)]
pub struct RunOutput {
    /// Normalized feature matrix the run was trained on.
    pub matrix: FeatureMatrix,
    pub normalizer: Normalizer,
    pub training: TrainingOutcome,
    pub scalings: Vec<FoldScaling>,
    pub psms: CalibratedResults,
    /// Best PSM per peptide, when redundancy removal is enabled.
    pub peptides: Option<CalibratedResults>,
    pub weights: Vec<WeightReport>,
    /// Mean raw retention time features over the passing PSMs.
    pub rt_means: Vec<(String, f64)>,
    pub timings: Timings,
}

pub fn run(data: PinData, config: &TrainingConfig) -> Result<RunOutput> {
    run_with_progress(data, config, |_| {})
}

/// Like [`run`], calling `on_iteration` after every outer training iteration.
pub fn run_with_progress<F>(
    data: PinData,
    config: &TrainingConfig,
    on_iteration: F,
) -> Result<RunOutput>
where
    F: FnMut(&IterationReport),
{
    config.validate()?;
    let mut timings = Timings::new(config.clock);

    let PinData {
        feature_names,
        rt_feature_names,
        examples,
        default_weights,
    } = data;
    if !config.rt_features && !rt_feature_names.is_empty() {
        info!(
            "Ignoring {} retention time features, they are disabled",
            rt_feature_names.len()
        );
    }
    let raw = FeatureMatrix::try_new(feature_names, rt_feature_names, examples, config.rt_features)?;
    info!(
        "Training on {} targets and {} decoys with {} features",
        raw.num_targets(),
        raw.num_decoys(),
        raw.num_columns()
    );

    let (normalizer, matrix) = timings.time("normalize", || {
        let normalizer = Normalizer::fit(&raw, config.normalization);
        let matrix = normalizer.normalize(raw);
        (normalizer, matrix)
    });

    let folds = timings.time("partition", || {
        Partitioner::new(config.folds, config.seed, config.partition)
            .with_train_ratio(config.train_ratio)
            .split(&matrix)
    })?;

    // Input direction rows only cover the regular features.
    let input_weights = default_weights.map(|mut w| {
        w.resize(matrix.num_columns(), 0.0);
        w.push(0.0);
        w
    });
    let check = SanityCheck::new(config.effective_selection_fdr(), config.test_fdr)
        .with_init_weights(config.init_weights.clone())
        .with_default_direction(config.default_direction)
        .with_input_weights(input_weights);

    let training = timings.time("train", || {
        Trainer::new(&matrix, config, L2SvmMfn::new(config.solver), check).train_with(
            folds,
            &normalizer,
            on_iteration,
        )
    })?;
    if training.fell_back {
        warn!("Results are reported with the initial direction");
    }

    let (merged, scalings) = timings.time("merge", || {
        merge_test_folds(
            &matrix,
            &training.folds,
            &training.weights,
            config.effective_selection_fdr(),
        )
    })?;

    let psms = timings.time("calibrate", || {
        calibrate(ReportLevel::Psm, &merged, config.test_fdr, config.seed)
    });
    let peptides = if config.unique_peptides {
        Some(timings.time("calibrate", || {
            let unique = best_per_peptide(&matrix, &merged);
            calibrate(ReportLevel::Peptide, &unique, config.test_fdr, config.seed)
        }))
    } else {
        None
    };

    let weights = training
        .weights
        .iter()
        .enumerate()
        .map(|(fold, w)| WeightReport::new(fold, &matrix, &normalizer, w))
        .collect();
    let rt_means = rt_feature_means(&matrix, &normalizer, &psms);
    for (name, mean) in &rt_means {
        info!("Mean {} of passing PSMs: {:.4}", name, mean);
    }

    Ok(RunOutput {
        matrix,
        normalizer,
        training,
        scalings,
        psms,
        peptides,
        weights,
        rt_means,
        timings,
    })
}
