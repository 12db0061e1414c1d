mod cli;
mod config;
mod errors;
mod processing;

use clap::Parser;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::Config;

fn verbosity_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::OFF,
        1 => LevelFilter::ERROR,
        2 => LevelFilter::WARN,
        3 => LevelFilter::INFO,
        4 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn main() -> std::result::Result<(), errors::CliError> {
    // Parse command line arguments
    let args = Cli::parse();

    // Initialize logging, an explicit verbosity wins over RUST_LOG
    let filter = match args.verbose {
        Some(v) => EnvFilter::default().add_directive(verbosity_filter(v).into()),
        None => EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy(),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load the configuration, command line arguments over-write it
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let config = config.with_cli_args(&args);

    let Some(input) = config.input.clone() else {
        return Err(errors::CliError::Config {
            source: "No input provided, please provide one in either the config file or as the first argument".to_string(),
        });
    };
    let Some(output_config) = config.output.clone() else {
        return Err(errors::CliError::Config {
            source: "No output directory provided, please provide one in either the config file or with the --output-dir flag".to_string(),
        });
    };
    info!("Parsed configuration: {:#?}", config);

    std::fs::create_dir_all(&output_config.directory).map_err(|e| errors::CliError::Io {
        source: e.to_string(),
        path: Some(output_config.directory.to_string_lossy().to_string()),
    })?;

    processing::process_pin(&input, &config.training, &output_config)
}
