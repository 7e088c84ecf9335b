//! Feature encoding and ordinary least squares.

use std::collections::BTreeSet;

use serde::Serialize;

use super::HistoryRecord;
use crate::error::{Error, Result};

/// Added to the diagonal of the normal equations (not the intercept) so
/// collinear one-hot columns stay solvable.
const RIDGE: f64 = 1e-8;

/// Pivots smaller than this make the system singular.
const PIVOT_EPSILON: f64 = 1e-12;

/// Predictors treated as categories rather than numbers.
const CATEGORICAL: [&str; 2] = ["field", "variety"];

/// Whether a predictor name denotes a categorical column.
#[must_use]
pub fn is_categorical(predictor: &str) -> bool {
    CATEGORICAL.contains(&predictor)
}

/// How one predictor becomes model columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Encoding {
    /// One indicator column per level except the first (the baseline).
    Categorical {
        /// Predictor name.
        column: String,
        /// Baseline level, encoded as all zeros.
        baseline: Option<String>,
        /// Levels with their own indicator column.
        levels: Vec<String>,
    },
    /// Standardized numeric column.
    Numeric {
        /// Predictor name.
        column: String,
        /// Training mean; also replaces missing values.
        mean: f64,
        /// Training standard deviation (1 when constant).
        std: f64,
    },
}

impl Encoding {
    fn width(&self) -> usize {
        match self {
            Self::Categorical { levels, .. } => levels.len(),
            Self::Numeric { .. } => 1,
        }
    }

    fn encode_into(&self, record: &HistoryRecord, row: &mut Vec<f64>) {
        match self {
            Self::Categorical { column, levels, .. } => {
                let value = record.category(column);
                row.extend(levels.iter().map(|level| {
                    if value == Some(level.as_str()) {
                        1.0
                    } else {
                        0.0
                    }
                }));
            }
            Self::Numeric { column, mean, std } => {
                let value = record.value(column).unwrap_or(*mean);
                row.push((value - mean) / std);
            }
        }
    }
}

/// Fitted mapping from history records to model rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureEncoder {
    encodings: Vec<Encoding>,
}

impl FeatureEncoder {
    /// Learn levels and scaling from the training records.
    #[must_use]
    pub fn fit(records: &[&HistoryRecord], predictors: &[String]) -> Self {
        let encodings = predictors
            .iter()
            .map(|predictor| {
                if is_categorical(predictor) {
                    let mut levels: BTreeSet<&str> = records
                        .iter()
                        .filter_map(|r| r.category(predictor))
                        .collect();
                    let baseline = levels.pop_first().map(str::to_string);
                    Encoding::Categorical {
                        column: predictor.clone(),
                        baseline,
                        levels: levels.into_iter().map(str::to_string).collect(),
                    }
                } else {
                    let values: Vec<f64> =
                        records.iter().filter_map(|r| r.value(predictor)).collect();
                    let (mean, std) = mean_std(&values);
                    Encoding::Numeric {
                        column: predictor.clone(),
                        mean,
                        std: if std > 0.0 { std } else { 1.0 },
                    }
                }
            })
            .collect();
        Self { encodings }
    }

    /// Number of model columns, excluding the intercept.
    #[must_use]
    pub fn width(&self) -> usize {
        self.encodings.iter().map(Encoding::width).sum()
    }

    /// Per-predictor encodings.
    #[must_use]
    pub fn encodings(&self) -> &[Encoding] {
        &self.encodings
    }

    /// Index of the owning predictor for every model column.
    #[must_use]
    pub fn column_owners(&self) -> Vec<usize> {
        self.encodings
            .iter()
            .enumerate()
            .flat_map(|(i, e)| std::iter::repeat(i).take(e.width()))
            .collect()
    }

    /// Encode one record.
    #[must_use]
    pub fn encode(&self, record: &HistoryRecord) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.width());
        for encoding in &self.encodings {
            encoding.encode_into(record, &mut row);
        }
        row
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 1.0);
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Linear model `y = intercept + coefficients · x`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearRegression {
    /// Intercept.
    pub intercept: f64,
    /// One coefficient per encoded column.
    pub coefficients: Vec<f64>,
}

impl LinearRegression {
    /// Fit by least squares through the normal equations.
    ///
    /// # Errors
    ///
    /// Returns an error without rows, on ragged rows, or if the system is
    /// singular.
    pub fn fit(rows: &[Vec<f64>], targets: &[f64]) -> Result<Self> {
        if rows.is_empty() || rows.len() != targets.len() {
            return Err(Error::insufficient_data(format!(
                "{} rows for {} targets",
                rows.len(),
                targets.len()
            )));
        }
        let width = rows[0].len();
        if rows.iter().any(|r| r.len() != width) {
            return Err(Error::internal("feature rows have different widths"));
        }

        // Normal equations over [1, x...]
        let dim = width + 1;
        let mut xtx = vec![vec![0.0; dim]; dim];
        let mut xty = vec![0.0; dim];
        let mut augmented = Vec::with_capacity(dim);
        for (row, y) in rows.iter().zip(targets) {
            augmented.clear();
            augmented.push(1.0);
            augmented.extend_from_slice(row);
            for i in 0..dim {
                xty[i] += augmented[i] * y;
                for j in 0..dim {
                    xtx[i][j] += augmented[i] * augmented[j];
                }
            }
        }
        for (i, row) in xtx.iter_mut().enumerate().skip(1) {
            row[i] += RIDGE;
        }

        let solution = solve(xtx, xty)?;
        Ok(Self {
            intercept: solution[0],
            coefficients: solution[1..].to_vec(),
        })
    }

    /// Predict one encoded row.
    #[must_use]
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|x, y| a[*x][col].abs().total_cmp(&a[*y][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return Err(Error::SingularModel {
                message: format!("no pivot for column {col}"),
            });
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}
