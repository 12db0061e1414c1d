pub mod calibrate;
pub mod config;
pub mod data_sources;
pub mod errors;
pub mod ml;
pub mod models;
pub mod normalizer;
pub mod output;
pub mod partition;
pub mod pipeline;
pub mod sanity;
pub mod svm;
pub mod timings;

pub use config::TrainingConfig;
pub use data_sources::PinData;
pub use errors::{
    PercolateError,
    Result,
};
pub use models::{
    Example,
    FeatureMatrix,
    PsmInfo,
    TargetDecoy,
};
pub use pipeline::{
    RunOutput,
    run,
    run_with_progress,
};
