pub mod feature_matrix;
pub mod label;

pub use feature_matrix::{
    Example,
    FeatureMatrix,
    PsmInfo,
    score_row,
};
pub use label::TargetDecoy;
