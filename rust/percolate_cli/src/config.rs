use percolate::TrainingConfig;
use serde::{
    Deserialize,
    Serialize,
};
use std::path::{
    Path,
    PathBuf,
};

use crate::cli::Cli;
use crate::errors::CliError;

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct Config {
    pub input: Option<PathBuf>,
    #[serde(default)]
    pub training: TrainingConfig,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
    #[serde(default)]
    pub decoy_results: bool,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, CliError> {
        let file = std::fs::File::open(path).map_err(|e| CliError::Io {
            source: e.to_string(),
            path: Some(path.to_string_lossy().to_string()),
        })?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| CliError::ParseError { msg: e.to_string() })
    }

    /// Command line values take precedence over the config file.
    pub fn with_cli_args(mut self, args: &Cli) -> Self {
        if let Some(input) = &args.input {
            self.input = Some(input.clone());
        }
        if let Some(directory) = &args.output_dir {
            let decoy_results = self.output.as_ref().is_some_and(|o| o.decoy_results);
            self.output = Some(OutputConfig {
                directory: directory.clone(),
                decoy_results,
            });
        }
        if args.decoy_results {
            if let Some(output) = self.output.as_mut() {
                output.decoy_results = true;
            }
        }

        let training = &mut self.training;
        if let Some(x) = args.folds {
            training.folds = x;
        }
        if let Some(x) = args.iterations {
            training.iterations = x;
        }
        if let Some(x) = args.selection_fdr {
            training.selection_fdr = x;
        }
        if let Some(x) = args.test_fdr {
            training.test_fdr = x;
        }
        if args.cpos.is_some() {
            training.cpos = args.cpos;
        }
        if args.cneg.is_some() {
            training.cneg = args.cneg;
        }
        if let Some(x) = args.seed {
            training.seed = x;
        }
        if args.default_direction.is_some() {
            training.default_direction = args.default_direction;
        }
        training.unique_peptides &= !args.no_unique_peptides;
        training.rt_features |= args.rt_features;
        training.override_direction_check |= args.override_direction_check;
        training.report_each_iteration |= args.report_each_iteration;
        training.clock |= args.clock;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_overrides_config() {
        let config: Config = serde_json::from_str(
            r#"{
                "input": "a.tsv",
                "training": {"iterations": 4, "seed": 7},
                "output": {"directory": "out", "decoy_results": true}
            }"#,
        )
        .unwrap();
        assert_eq!(config.training.folds, 3);

        let args = Cli::parse_from([
            "percolate",
            "b.tsv",
            "-i",
            "2",
            "--cpos",
            "0.5",
            "--default-direction",
            "-3",
            "--no-unique-peptides",
        ]);
        let config = config.with_cli_args(&args);
        assert_eq!(config.input, Some(PathBuf::from("b.tsv")));
        assert_eq!(config.training.iterations, 2);
        assert_eq!(config.training.seed, 7);
        assert_eq!(config.training.cpos, Some(0.5));
        assert_eq!(config.training.default_direction, Some(-3));
        assert!(!config.training.unique_peptides);
        assert!(config.output.unwrap().decoy_results);
    }
}
