pub mod cv;
pub mod grid;
pub mod pep;
pub mod qvalues;
pub mod score_set;

pub use cv::{
    IterationReport,
    Trainer,
    TrainingOutcome,
};
pub use grid::{
    CostCell,
    CostGrid,
};
pub use qvalues::LabelledScore;
pub use score_set::{
    ScoreSet,
    ScoredExample,
};
