use super::config::OutputConfig;
use crate::errors::CliError;
use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use percolate::calibrate::CalibratedResults;
use percolate::data_sources::read_pin_file;
use percolate::output::{
    ResultRows,
    write_results_file,
    write_weights_file,
};
use percolate::{
    RunOutput,
    TrainingConfig,
    run_with_progress,
};
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize)]
struct LevelSummary {
    level: &'static str,
    passing: usize,
    fdr: f64,
    pi0: f64,
    total: usize,
}

impl From<&CalibratedResults> for LevelSummary {
    fn from(x: &CalibratedResults) -> Self {
        Self {
            level: x.level.as_str(),
            passing: x.passing,
            fdr: x.fdr,
            pi0: x.pi0,
            total: x.psms.len(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    config: &'a TrainingConfig,
    levels: Vec<LevelSummary>,
    initial: &'a percolate::sanity::InitialDirection,
    verdict: &'a percolate::sanity::DirectionVerdict,
    fell_back: bool,
    iterations: &'a [percolate::ml::IterationReport],
    scalings: &'a [percolate::calibrate::FoldScaling],
    rt_means: &'a [(String, f64)],
    timings: &'a percolate::timings::Timings,
}

pub fn process_pin(
    path: &Path,
    training: &TrainingConfig,
    output: &OutputConfig,
) -> std::result::Result<(), CliError> {
    let data = read_pin_file(path)?;

    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
    )
    .map_err(|e| CliError::Config {
        source: e.to_string(),
    })?;
    let pb = ProgressBar::new(training.iterations as u64).with_style(style);
    let out = run_with_progress(data, training, |report| {
        pb.set_message(format!("~{} passing", report.estimated_passing));
        pb.inc(1);
    })?;
    pb.finish_and_clear();

    write_outputs(&out, training, output)
}

fn write_outputs(
    out: &RunOutput,
    training: &TrainingConfig,
    output: &OutputConfig,
) -> std::result::Result<(), CliError> {
    let dir = &output.directory;
    let mut levels = vec![(&out.psms, "psms")];
    if let Some(peptides) = &out.peptides {
        levels.push((peptides, "peptides"));
    }

    for (results, name) in &levels {
        write_results_file(
            dir.join(format!("{}.tsv", name)),
            &out.matrix,
            results,
            ResultRows::Targets,
        )?;
        if output.decoy_results {
            write_results_file(
                dir.join(format!("decoy_{}.tsv", name)),
                &out.matrix,
                results,
                ResultRows::Decoys,
            )?;
        }
    }
    write_weights_file(dir.join("weights.tsv"), &out.weights)?;

    let summary = RunSummary {
        config: training,
        levels: levels.iter().map(|(r, _)| LevelSummary::from(*r)).collect(),
        initial: &out.training.initial,
        verdict: &out.training.verdict,
        fell_back: out.training.fell_back,
        iterations: &out.training.iterations,
        scalings: &out.scalings,
        rt_means: &out.rt_means,
        timings: &out.timings,
    };
    let summary_path = dir.join("summary.json");
    let file = std::fs::File::create(&summary_path).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: Some(summary_path.to_string_lossy().to_string()),
    })?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &summary).map_err(|e| {
        CliError::Io {
            source: e.to_string(),
            path: Some(summary_path.to_string_lossy().to_string()),
        }
    })?;

    for level in &summary.levels {
        info!(
            "{} {} level identifications at q <= {}",
            level.passing, level.level, level.fdr
        );
    }
    info!("Wrote results to {}", dir.display());
    Ok(())
}
