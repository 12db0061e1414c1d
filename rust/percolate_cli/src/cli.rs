use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Tab delimited PSM input (will over-write the config file)
    pub input: Option<PathBuf>,

    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Also write the decoy results
    #[arg(long)]
    pub decoy_results: bool,

    /// Number of cross validation folds
    #[arg(long)]
    pub folds: Option<usize>,

    /// Number of outer training iterations
    #[arg(short, long)]
    pub iterations: Option<usize>,

    /// FDR used to select positive training examples, 0 uses the test FDR
    #[arg(short = 'F', long)]
    pub selection_fdr: Option<f64>,

    /// FDR used to evaluate and report results
    #[arg(short, long)]
    pub test_fdr: Option<f64>,

    /// Fixed cost of misclassified targets, searched when not given
    #[arg(short = 'p', long)]
    pub cpos: Option<f64>,

    /// Fixed cost of misclassified decoys, searched when not given
    #[arg(short = 'n', long)]
    pub cneg: Option<f64>,

    /// Seed of the fold assignment and the pi0 bootstrap
    #[arg(short = 'S', long)]
    pub seed: Option<u64>,

    /// Only report PSM level results
    #[arg(long)]
    pub no_unique_peptides: bool,

    /// Use the rt_ prefixed features
    #[arg(long)]
    pub rt_features: bool,

    /// Keep the trained weights even when they look implausible
    #[arg(short = 'O', long)]
    pub override_direction_check: bool,

    /// Signed 1-based feature number to start training from
    #[arg(long, allow_hyphen_values = true)]
    pub default_direction: Option<i32>,

    /// Count passing test targets after every iteration
    #[arg(long)]
    pub report_each_iteration: bool,

    /// Log the time taken by each stage
    #[arg(long)]
    pub clock: bool,

    /// Verbosity from 0 (silent) to 5 (trace), overrides RUST_LOG
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=5))]
    pub verbose: Option<u8>,
}
