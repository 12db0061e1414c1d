//! Tab delimited PSM input.
//!
//! The header names the columns: an identifier (`PSMId` or `SpecId`), a
//! `Label` of 1 (target) or -1 (decoy), optionally `ScanNr` and `ExpMass`,
//! then the features, then `Peptide` and `Proteins`. Every field after
//! `Peptide` is a protein, so rows may be longer than the header.
//!
//! Feature columns whose name starts with `rt_` form the retention time block.
//! A first data row with the identifier `DefaultDirection` holds initial
//! feature weights instead of a PSM.

use crate::errors::{
    PercolateError,
    ReadError,
    Result,
};
use crate::models::{
    Example,
    PsmInfo,
    TargetDecoy,
};
use std::io::Read;
use std::path::Path;
use tracing::{
    debug,
    info,
};

const ID_COLUMNS: [&str; 2] = ["psmid", "specid"];
const LABEL_COLUMN: &str = "label";
const SCAN_COLUMN: &str = "scannr";
const EXP_MASS_COLUMN: &str = "expmass";
const PEPTIDE_COLUMN: &str = "peptide";
const PROTEINS_COLUMN: &str = "proteins";
const DEFAULT_DIRECTION_ID: &str = "defaultdirection";
pub const RT_FEATURE_PREFIX: &str = "rt_";

#[derive(Debug, Clone)]
pub struct PinData {
    pub feature_names: Vec<String>,
    pub rt_feature_names: Vec<String>,
    pub examples: Vec<Example>,
    /// Weights from a `DefaultDirection` row, one per regular feature.
    pub default_weights: Option<Vec<f64>>,
}

impl PinData {
    pub fn num_targets(&self) -> usize {
        self.examples
            .iter()
            .filter(|e| e.info.label.is_target())
            .count()
    }

    pub fn num_decoys(&self) -> usize {
        self.examples.len() - self.num_targets()
    }
}

enum Column {
    Feature(usize),
    RtFeature(usize),
}

struct Layout {
    id: usize,
    label: usize,
    scan: Option<usize>,
    exp_mass: Option<usize>,
    peptide: Option<usize>,
    /// First protein field, proteins run to the end of the row.
    proteins: Option<usize>,
    columns: Vec<(usize, String, Column)>,
    num_features: usize,
    num_rt_features: usize,
}

impl Layout {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };

        let id = ID_COLUMNS
            .iter()
            .find_map(|c| find(c))
            .ok_or(ReadError::MissingColumn { column: "PSMId" })?;
        let label = find(LABEL_COLUMN).ok_or(ReadError::MissingColumn { column: "Label" })?;
        let scan = find(SCAN_COLUMN);
        let exp_mass = find(EXP_MASS_COLUMN);
        let peptide = find(PEPTIDE_COLUMN);
        let proteins = find(PROTEINS_COLUMN);

        let special = [Some(id), Some(label), scan, exp_mass];
        let features_end = peptide.or(proteins).unwrap_or(headers.len());

        let mut columns = Vec::new();
        let mut num_features = 0;
        let mut num_rt_features = 0;
        for (i, name) in headers.iter().enumerate().take(features_end) {
            if special.contains(&Some(i)) {
                continue;
            }
            let name = name.trim().to_string();
            let column = if name.to_ascii_lowercase().starts_with(RT_FEATURE_PREFIX) {
                num_rt_features += 1;
                Column::RtFeature(num_rt_features - 1)
            } else {
                num_features += 1;
                Column::Feature(num_features - 1)
            };
            columns.push((i, name, column));
        }

        Ok(Self {
            id,
            label,
            scan,
            exp_mass,
            peptide,
            proteins,
            columns,
            num_features,
            num_rt_features,
        })
    }

    fn feature_names(&self) -> (Vec<String>, Vec<String>) {
        let mut features = Vec::with_capacity(self.num_features);
        let mut rt = Vec::with_capacity(self.num_rt_features);
        for (_, name, column) in &self.columns {
            match column {
                Column::Feature(_) => features.push(name.clone()),
                Column::RtFeature(_) => rt.push(name.clone()),
            }
        }
        (features, rt)
    }

    fn parse_number(&self, record: &csv::StringRecord, i: usize, name: &str, row: usize) -> Result<f64> {
        let raw = record.get(i).unwrap_or("").trim();
        raw.parse::<f64>().map_err(|_| {
            ReadError::InvalidNumber {
                row,
                column: name.to_string(),
                value: raw.to_string(),
            }
            .into()
        })
    }

    fn parse_default_direction(&self, record: &csv::StringRecord, row: usize) -> Result<Vec<f64>> {
        let mut weights = vec![0.0; self.num_features];
        for (i, name, column) in &self.columns {
            if let Column::Feature(j) = column {
                let raw = record.get(*i).unwrap_or("").trim();
                // Blank entries carry no opinion.
                if !raw.is_empty() {
                    weights[*j] = self.parse_number(record, *i, name, row)?;
                }
            }
        }
        Ok(weights)
    }

    fn parse_example(&self, record: &csv::StringRecord, row: usize) -> Result<Example> {
        let field = |i: usize| record.get(i).unwrap_or("").trim();

        let label_raw = field(self.label);
        let label = TargetDecoy::from_pin_label(label_raw).ok_or_else(|| ReadError::InvalidLabel {
            row,
            value: label_raw.to_string(),
        })?;

        let mut features = vec![0.0; self.num_features];
        let mut rt_features = vec![0.0; self.num_rt_features];
        for (i, name, column) in &self.columns {
            let value = self.parse_number(record, *i, name, row)?;
            match column {
                Column::Feature(j) => features[*j] = value,
                Column::RtFeature(j) => rt_features[*j] = value,
            }
        }

        let spectrum = match (self.scan, self.exp_mass) {
            (Some(s), Some(m)) => Some(format!("{}_{}", field(s), field(m))),
            (Some(s), None) => Some(field(s).to_string()),
            (None, _) => None,
        };
        let peptide = self
            .peptide
            .map(|i| field(i).to_string())
            .filter(|p| !p.is_empty());
        let proteins = match self.proteins {
            Some(start) => record
                .iter()
                .skip(start)
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect(),
            None => Vec::new(),
        };

        Ok(Example {
            info: PsmInfo {
                id: field(self.id).to_string(),
                label,
                spectrum,
                peptide,
                proteins,
            },
            features,
            rt_features,
        })
    }
}

/// Reads tab delimited PSMs from any reader.
pub fn read_pin<R: Read>(reader: R) -> Result<PinData> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(reader);

    let headers = rdr.headers().map_err(ReadError::from)?.clone();
    let layout = Layout::from_headers(&headers)?;
    let (feature_names, rt_feature_names) = layout.feature_names();
    debug!(
        "Input has {} features and {} retention time features",
        feature_names.len(),
        rt_feature_names.len()
    );

    let mut examples = Vec::new();
    let mut default_weights = None;
    for (i, record) in rdr.records().enumerate() {
        let record = record.map_err(ReadError::from)?;
        let row = record.position().map_or(i + 2, |p| p.line() as usize);
        let id = record.get(layout.id).unwrap_or("").trim();
        if id.is_empty() && record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if i == 0 && id.eq_ignore_ascii_case(DEFAULT_DIRECTION_ID) {
            default_weights = Some(layout.parse_default_direction(&record, row)?);
            continue;
        }
        examples.push(layout.parse_example(&record, row)?);
    }

    Ok(PinData {
        feature_names,
        rt_feature_names,
        examples,
        default_weights,
    })
}

pub fn read_pin_file<T: AsRef<Path>>(path: T) -> Result<PinData> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| ReadError::Io {
        source: e,
        path: Some(path.to_path_buf()),
    })?;
    let data = read_pin(std::io::BufReader::new(file)).map_err(|e| match e {
        PercolateError::Read(ReadError::Csv { source, path: None }) => {
            PercolateError::from(ReadError::Csv {
                source,
                path: Some(path.to_path_buf()),
            })
        }
        other => other,
    })?;
    info!(
        "Read {} target and {} decoy PSMs from {}",
        data.num_targets(),
        data.num_decoys(),
        path.display()
    );
    Ok(data)
}
