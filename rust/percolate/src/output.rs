//! Tab delimited result and weight files.

use crate::calibrate::CalibratedResults;
use crate::errors::{
    Result,
    WriteError,
};
use crate::models::FeatureMatrix;
use crate::normalizer::Normalizer;
use csv::WriterBuilder;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

const RESULT_HEADER: [&str; 6] = [
    "PSMId",
    "score",
    "q-value",
    "posterior_error_prob",
    "peptide",
    "proteinIds",
];
const BIAS_NAME: &str = "m0";

/// Final weights of one fold, in normalized and raw feature space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightReport {
    pub fold: usize,
    /// Feature names followed by the bias.
    pub names: Vec<String>,
    pub normalized: Vec<f64>,
    pub raw: Vec<f64>,
}

impl WeightReport {
    pub fn new(fold: usize, matrix: &FeatureMatrix, normalizer: &Normalizer, weights: &[f64]) -> Self {
        let mut names = matrix.feature_names().to_vec();
        names.push(BIAS_NAME.to_string());
        Self {
            fold,
            names,
            normalized: weights.to_vec(),
            raw: normalizer.unnormalize_weights(weights),
        }
    }
}

/// Which side of the target/decoy split goes into a result file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultRows {
    Targets,
    Decoys,
}

/// One row per PSM in rank order, proteins as trailing fields.
pub fn write_results<W: Write>(
    writer: W,
    matrix: &FeatureMatrix,
    results: &CalibratedResults,
    rows: ResultRows,
) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_writer(writer);
    wtr.write_record(RESULT_HEADER).map_err(WriteError::from)?;

    let keep = |x: &&crate::calibrate::CalibratedPsm| match rows {
        ResultRows::Targets => x.label.is_target(),
        ResultRows::Decoys => x.label.is_decoy(),
    };
    for psm in results.psms.iter().filter(keep) {
        let info = matrix.info(psm.index);
        let mut record = vec![
            info.id.clone(),
            format!("{:.6}", psm.score),
            format!("{:.6e}", psm.q_value),
            format!("{:.6e}", psm.pep),
            info.peptide.clone().unwrap_or_default(),
        ];
        record.extend(info.proteins.iter().cloned());
        wtr.write_record(&record).map_err(WriteError::from)?;
    }
    wtr.flush().map_err(WriteError::from)?;
    Ok(())
}

/// Two rows per fold: normalized weights, then raw weights.
pub fn write_weights<W: Write>(writer: W, reports: &[WeightReport]) -> Result<()> {
    let mut wtr = WriterBuilder::new().delimiter(b'\t').from_writer(writer);
    let Some(first) = reports.first() else {
        return Ok(());
    };
    wtr.write_record(&first.names).map_err(WriteError::from)?;
    for report in reports {
        for weights in [&report.normalized, &report.raw] {
            let record: Vec<String> = weights.iter().map(|w| format!("{:.6}", w)).collect();
            wtr.write_record(&record).map_err(WriteError::from)?;
        }
    }
    wtr.flush().map_err(WriteError::from)?;
    Ok(())
}

fn create(path: &Path) -> Result<std::io::BufWriter<std::fs::File>> {
    let file = std::fs::File::create(path).map_err(|e| WriteError::Io {
        source: e,
        path: Some(path.to_path_buf()),
    })?;
    Ok(std::io::BufWriter::new(file))
}

pub fn write_results_file<P: AsRef<Path>>(
    path: P,
    matrix: &FeatureMatrix,
    results: &CalibratedResults,
    rows: ResultRows,
) -> Result<()> {
    let path = path.as_ref();
    write_results(create(path)?, matrix, results, rows)?;
    info!(
        "Wrote {} {} results to {}",
        results.level.as_str(),
        match rows {
            ResultRows::Targets => "target",
            ResultRows::Decoys => "decoy",
        },
        path.display()
    );
    Ok(())
}

pub fn write_weights_file<P: AsRef<Path>>(path: P, reports: &[WeightReport]) -> Result<()> {
    let path = path.as_ref();
    write_weights(create(path)?, reports)?;
    info!("Wrote weights of {} folds to {}", reports.len(), path.display());
    Ok(())
}
