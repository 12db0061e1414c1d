//! Per-feature scaling of the pooled feature matrix.
//!
//! The linear solver is sensitive to feature scale, so all rows are brought
//! to a comparable range before training. The transform is kept around to map
//! trained weights back to raw feature space for reporting.

use crate::models::FeatureMatrix;
use serde::{
    Deserialize,
    Serialize,
};

/// Spreads below this are treated as constant features.
const MIN_SPREAD: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationKind {
    /// Subtract the mean, divide by the standard deviation.
    #[default]
    Stdv,
    /// Subtract the minimum, divide by the range.
    Unit,
}

/// Affine transform `x' = (x - sub) / div`, one pair per column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Normalizer {
    kind: NormalizationKind,
    sub: Vec<f64>,
    div: Vec<f64>,
}

impl Normalizer {
    /// Computes offsets and scales from every row of the matrix.
    pub fn fit(matrix: &FeatureMatrix, kind: NormalizationKind) -> Self {
        let ncols = matrix.num_columns();
        let (sub, div) = match kind {
            NormalizationKind::Stdv => {
                let n = matrix.len() as f64;
                let mut mean = vec![0.0; ncols];
                for row in matrix.rows() {
                    mean.iter_mut().zip(row).for_each(|(m, x)| *m += x);
                }
                mean.iter_mut().for_each(|m| *m /= n);

                let mut var = vec![0.0; ncols];
                for row in matrix.rows() {
                    var.iter_mut()
                        .zip(row.iter().zip(mean.iter()))
                        .for_each(|(v, (x, m))| *v += (x - m) * (x - m));
                }
                let stdev: Vec<f64> = var.into_iter().map(|v| (v / n).sqrt()).collect();
                (mean, stdev)
            }
            NormalizationKind::Unit => {
                let mut min = vec![f64::INFINITY; ncols];
                let mut max = vec![f64::NEG_INFINITY; ncols];
                for row in matrix.rows() {
                    for (j, x) in row.iter().enumerate() {
                        min[j] = min[j].min(*x);
                        max[j] = max[j].max(*x);
                    }
                }
                let range: Vec<f64> = min.iter().zip(max.iter()).map(|(lo, hi)| hi - lo).collect();
                (min, range)
            }
        };

        let div = div
            .into_iter()
            .map(|d: f64| {
                if d.is_finite() && d > MIN_SPREAD {
                    d
                } else {
                    1.0
                }
            })
            .collect();

        Self { kind, sub, div }
    }

    pub fn normalize_row(&self, row: &mut [f64]) {
        row.iter_mut()
            .zip(self.sub.iter().zip(self.div.iter()))
            .for_each(|(x, (s, d))| *x = (*x - s) / d);
    }

    pub fn unnormalize_row(&self, row: &mut [f64]) {
        row.iter_mut()
            .zip(self.sub.iter().zip(self.div.iter()))
            .for_each(|(x, (s, d))| *x = *x * d + s);
    }

    pub fn normalize(&self, matrix: FeatureMatrix) -> FeatureMatrix {
        matrix.map_rows(|row| self.normalize_row(row))
    }

    pub fn unnormalize(&self, matrix: FeatureMatrix) -> FeatureMatrix {
        matrix.map_rows(|row| self.unnormalize_row(row))
    }

    /// Maps a weight vector trained on normalized rows (bias last) to one that
    /// yields the same scores on raw rows.
    pub fn unnormalize_weights(&self, weights: &[f64]) -> Vec<f64> {
        let n = self.sub.len();
        let mut raw = Vec::with_capacity(n + 1);
        let mut bias = weights[n];
        for j in 0..n {
            raw.push(weights[j] / self.div[j]);
            bias -= weights[j] * self.sub[j] / self.div[j];
        }
        raw.push(bias);
        raw
    }

    /// Inverse of [`Normalizer::unnormalize_weights`].
    pub fn normalize_weights(&self, raw: &[f64]) -> Vec<f64> {
        let n = self.sub.len();
        let mut weights = Vec::with_capacity(n + 1);
        let mut bias = raw[n];
        for j in 0..n {
            weights.push(raw[j] * self.div[j]);
            bias += raw[j] * self.sub[j];
        }
        weights.push(bias);
        weights
    }
}
