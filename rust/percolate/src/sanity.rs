//! Starting direction for training and the plausibility check of the
//! trained weights.

use crate::errors::{
    ConfigError,
    Result,
};
use crate::ml::ScoreSet;
use crate::ml::qvalues::q_values;
use crate::models::{
    FeatureMatrix,
    TargetDecoy,
};
use crate::normalizer::Normalizer;
use serde::Serialize;
use tracing::{
    debug,
    info,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DirectionSource {
    /// Weights supplied by the user.
    UserWeights,
    /// A single feature picked by the user.
    DefaultFeature { feature: usize, lower_is_better: bool },
    /// The `DefaultDirection` row of the input.
    InputWeights,
    /// The single feature separating targets from decoys best.
    BestFeature {
        feature: usize,
        lower_is_better: bool,
        passing: usize,
    },
}

/// Starting weights in normalized feature space, bias last.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitialDirection {
    pub weights: Vec<f64>,
    pub source: DirectionSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DirectionVerdict {
    Plausible { trained: usize, initial: usize },
    /// No target passes the test FDR on any test set.
    NoIdentifications,
    FewerThanInitial { trained: usize, initial: usize },
    /// More decoys than targets score above zero.
    Inverted { targets: usize, decoys: usize },
}

impl DirectionVerdict {
    pub fn is_plausible(&self) -> bool {
        matches!(self, Self::Plausible { .. })
    }
}

impl std::fmt::Display for DirectionVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plausible { trained, initial } => write!(
                f,
                "{} targets pass on the test sets ({} with the initial direction)",
                trained, initial
            ),
            Self::NoIdentifications => {
                write!(f, "no target scores better than the decoys on the test sets")
            }
            Self::FewerThanInitial { trained, initial } => write!(
                f,
                "fewer identifications after training ({}) than with the initial direction ({})",
                trained, initial
            ),
            Self::Inverted { targets, decoys } => write!(
                f,
                "weights look inverted, {} decoys and {} targets score above zero",
                decoys, targets
            ),
        }
    }
}

/// Initializes and validates the training direction.
pub trait DirectionCheck: Sync {
    fn initial_direction(
        &self,
        matrix: &FeatureMatrix,
        normalizer: &Normalizer,
    ) -> Result<InitialDirection>;

    /// Judges the trained per-fold weights on the per-fold test sets.
    fn validate_direction(
        &self,
        tests: &mut [ScoreSet<'_>],
        weights: &[Vec<f64>],
        initial: &[f64],
    ) -> DirectionVerdict;
}

#[derive(Debug, Clone)]
pub struct SanityCheck {
    init_weights: Option<Vec<f64>>,
    default_direction: Option<i32>,
    input_weights: Option<Vec<f64>>,
    selection_fdr: f64,
    test_fdr: f64,
}

impl SanityCheck {
    pub fn new(selection_fdr: f64, test_fdr: f64) -> Self {
        Self {
            init_weights: None,
            default_direction: None,
            input_weights: None,
            selection_fdr,
            test_fdr,
        }
    }

    pub fn with_init_weights(mut self, weights: Option<Vec<f64>>) -> Self {
        self.init_weights = weights;
        self
    }

    pub fn with_default_direction(mut self, direction: Option<i32>) -> Self {
        self.default_direction = direction;
        self
    }

    /// Raw weights read from the input file. Used only when neither user
    /// weights nor a default feature are configured.
    pub fn with_input_weights(mut self, weights: Option<Vec<f64>>) -> Self {
        self.input_weights = weights;
        self
    }

    fn best_feature(&self, matrix: &FeatureMatrix) -> InitialDirection {
        let labels: Vec<TargetDecoy> = (0..matrix.len()).map(|i| matrix.label(i)).collect();
        let mut best: Option<(usize, bool, usize)> = None;

        for feature in 0..matrix.num_columns() {
            for lower_is_better in [false, true] {
                let sign = if lower_is_better { -1.0 } else { 1.0 };
                let scores: Vec<f64> = matrix.rows().map(|row| sign * row[feature]).collect();
                let passing = q_values(&scores, &labels)
                    .iter()
                    .zip(labels.iter())
                    .filter(|(q, l)| l.is_target() && **q <= self.selection_fdr)
                    .count();
                debug!(
                    "Feature {} ({}) gives {} targets at q <= {}",
                    matrix.feature_names()[feature],
                    if lower_is_better { "lower is better" } else { "higher is better" },
                    passing,
                    self.selection_fdr
                );
                if best.map_or(true, |(_, _, b)| passing > b) {
                    best = Some((feature, lower_is_better, passing));
                }
            }
        }

        // There is always at least one column.
        let (feature, lower_is_better, passing) = best.unwrap_or((0, false, 0));
        InitialDirection {
            weights: unit_direction(matrix.weight_len(), feature, lower_is_better),
            source: DirectionSource::BestFeature {
                feature,
                lower_is_better,
                passing,
            },
        }
    }
}

fn unit_direction(len: usize, feature: usize, lower_is_better: bool) -> Vec<f64> {
    let mut weights = vec![0.0; len];
    weights[feature] = if lower_is_better { -1.0 } else { 1.0 };
    weights
}

impl DirectionCheck for SanityCheck {
    fn initial_direction(
        &self,
        matrix: &FeatureMatrix,
        normalizer: &Normalizer,
    ) -> Result<InitialDirection> {
        if let Some(raw) = &self.init_weights {
            matrix.check_weights(raw)?;
            info!("Starting from user supplied weights");
            return Ok(InitialDirection {
                weights: normalizer.normalize_weights(raw),
                source: DirectionSource::UserWeights,
            });
        }

        if let Some(direction) = self.default_direction {
            let feature = direction.unsigned_abs() as usize;
            if feature == 0 || feature > matrix.num_columns() {
                return Err(ConfigError::InvalidDefaultDirection {
                    direction,
                    num_features: matrix.num_columns(),
                }
                .into());
            }
            let lower_is_better = direction < 0;
            info!(
                "Starting from feature {} ({})",
                matrix.feature_names()[feature - 1],
                if lower_is_better { "lower is better" } else { "higher is better" }
            );
            return Ok(InitialDirection {
                weights: unit_direction(matrix.weight_len(), feature - 1, lower_is_better),
                source: DirectionSource::DefaultFeature {
                    feature: feature - 1,
                    lower_is_better,
                },
            });
        }

        if let Some(raw) = &self.input_weights {
            matrix.check_weights(raw)?;
            info!("Starting from the default direction of the input");
            return Ok(InitialDirection {
                weights: normalizer.normalize_weights(raw),
                source: DirectionSource::InputWeights,
            });
        }

        let init = self.best_feature(matrix);
        if let DirectionSource::BestFeature {
            feature,
            lower_is_better,
            passing,
        } = &init.source
        {
            info!(
                "Selected feature {} as initial direction ({}), {} targets at q <= {}",
                matrix.feature_names()[*feature],
                if *lower_is_better { "lower is better" } else { "higher is better" },
                passing,
                self.selection_fdr
            );
        }
        Ok(init)
    }

    fn validate_direction(
        &self,
        tests: &mut [ScoreSet<'_>],
        weights: &[Vec<f64>],
        initial: &[f64],
    ) -> DirectionVerdict {
        let mut initial_passing = 0;
        let mut trained = 0;
        let mut targets_above = 0;
        let mut decoys_above = 0;

        for (test, w) in tests.iter_mut().zip(weights.iter()) {
            initial_passing += test.calc_scores(initial, self.test_fdr);
            trained += test.calc_scores(w, self.test_fdr);
            let (t, d) = test.count_above_zero();
            targets_above += t;
            decoys_above += d;
        }

        if trained == 0 {
            DirectionVerdict::NoIdentifications
        } else if trained < initial_passing {
            DirectionVerdict::FewerThanInitial {
                trained,
                initial: initial_passing,
            }
        } else if decoys_above > targets_above {
            DirectionVerdict::Inverted {
                targets: targets_above,
                decoys: decoys_above,
            }
        } else {
            DirectionVerdict::Plausible {
                trained,
                initial: initial_passing,
            }
        }
    }
}
