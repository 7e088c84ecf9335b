//! Cross-validation splits and error metrics.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Seed for every shuffled split, so evaluations are reproducible.
pub const SHUFFLE_SEED: u64 = 42;

/// How an estimate model is validated before training on all data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CvMethod {
    /// One shuffled train/test split.
    SimpleSplit,
    /// Shuffled k-fold.
    Kfold,
    /// One fold per sample.
    LeaveOneOut,
    /// Folds that never split a group (e.g. a season) across train and test.
    #[default]
    GroupKfold,
    /// Expanding window over samples ordered by year.
    TimeSeries,
}

impl std::fmt::Display for CvMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SimpleSplit => "simple_split",
            Self::Kfold => "kfold",
            Self::LeaveOneOut => "leave_one_out",
            Self::GroupKfold => "group_kfold",
            Self::TimeSeries => "time_series",
        };
        f.write_str(name)
    }
}

impl CvMethod {
    /// Folds used when `n_splits` is not configured.
    #[must_use]
    pub fn default_splits(self) -> i32 {
        match self {
            Self::GroupKfold => 3,
            _ => 5,
        }
    }
}

fn default_test_size() -> f64 {
    0.2
}

fn default_group_column() -> String {
    "year".to_string()
}

/// Parameters of the validation method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvParams {
    /// Number of folds; unset means the method's default. For
    /// `group_kfold` a negative value means "number of groups minus one".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_splits: Option<i32>,
    /// Test fraction for `simple_split`.
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    /// Column whose values form the groups of `group_kfold`.
    #[serde(default = "default_group_column")]
    pub group_column: String,
}

impl CvParams {
    /// Configured fold count, or the default of `method`.
    #[must_use]
    pub fn splits(&self, method: CvMethod) -> i32 {
        self.n_splits.unwrap_or_else(|| method.default_splits())
    }
}

impl Default for CvParams {
    fn default() -> Self {
        Self {
            n_splits: None,
            test_size: default_test_size(),
            group_column: default_group_column(),
        }
    }
}

/// Sample indices of one train/test split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// Indices used for fitting.
    pub train: Vec<usize>,
    /// Indices used for scoring.
    pub test: Vec<usize>,
}

impl Split {
    fn from_test(n: usize, test: Vec<usize>) -> Self {
        let train = (0..n).filter(|i| !test.contains(i)).collect();
        Self { train, test }
    }
}

fn shuffled(n: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(SHUFFLE_SEED);
    indices.shuffle(&mut rng);
    indices
}

fn fold_count(n_splits: i32) -> Result<usize> {
    usize::try_from(n_splits)
        .ok()
        .filter(|k| *k >= 2)
        .ok_or_else(|| Error::config(format!("n_splits must be at least 2, got {n_splits}")))
}

/// One shuffled split holding out `ceil(test_size * n)` samples.
///
/// # Errors
///
/// Returns an error if either side of the split would be empty.
pub fn simple_split(n: usize, test_size: f64) -> Result<Split> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(Error::config(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(Error::insufficient_data(format!(
            "cannot split {n} samples with test_size {test_size}"
        )));
    }

    let indices = shuffled(n);
    let mut test = indices[..n_test].to_vec();
    let mut train = indices[n_test..].to_vec();
    test.sort_unstable();
    train.sort_unstable();
    Ok(Split { train, test })
}

/// Shuffled k-fold; the first `n % k` folds get one extra sample.
///
/// # Errors
///
/// Returns an error if `n_splits < 2` or exceeds the number of samples.
pub fn kfold(n: usize, n_splits: i32) -> Result<Vec<Split>> {
    let k = fold_count(n_splits)?;
    if k > n {
        return Err(Error::insufficient_data(format!(
            "cannot make {k} folds from {n} samples"
        )));
    }

    let indices = shuffled(n);
    let mut splits = Vec::with_capacity(k);
    let mut offset = 0;
    for fold in 0..k {
        let size = n / k + usize::from(fold < n % k);
        let mut test = indices[offset..offset + size].to_vec();
        test.sort_unstable();
        splits.push(Split::from_test(n, test));
        offset += size;
    }
    Ok(splits)
}

/// One fold per sample.
///
/// # Errors
///
/// Returns an error with fewer than two samples.
pub fn leave_one_out(n: usize) -> Result<Vec<Split>> {
    if n < 2 {
        return Err(Error::insufficient_data(format!(
            "leave-one-out needs at least 2 samples, got {n}"
        )));
    }
    Ok((0..n).map(|i| Split::from_test(n, vec![i])).collect())
}

/// Group k-fold: whole groups go to the currently smallest fold, largest
/// group first. Folds follow sample order within each fold.
///
/// # Errors
///
/// Returns an error if fewer than two folds result or there are more folds
/// than groups.
pub fn group_kfold(groups: &[String], n_splits: i32) -> Result<Vec<Split>> {
    let mut sizes: BTreeMap<&str, usize> = BTreeMap::new();
    for group in groups {
        *sizes.entry(group.as_str()).or_default() += 1;
    }

    let requested = if n_splits < 0 {
        i32::try_from(sizes.len()).unwrap_or(i32::MAX) - 1
    } else {
        n_splits
    };
    let k = fold_count(requested)?;
    if k > sizes.len() {
        return Err(Error::insufficient_data(format!(
            "cannot make {k} folds from {} groups",
            sizes.len()
        )));
    }

    let mut by_size: Vec<(&str, usize)> = sizes.into_iter().collect();
    by_size.sort_by(|a, b| b.1.cmp(&a.1));

    let mut fold_sizes = vec![0usize; k];
    let mut fold_of: BTreeMap<&str, usize> = BTreeMap::new();
    for (group, size) in by_size {
        let lightest = (0..k).min_by_key(|f| fold_sizes[*f]).unwrap_or(0);
        fold_sizes[lightest] += size;
        fold_of.insert(group, lightest);
    }

    let n = groups.len();
    Ok((0..k)
        .map(|fold| {
            let test = (0..n)
                .filter(|i| fold_of.get(groups[*i].as_str()) == Some(&fold))
                .collect();
            Split::from_test(n, test)
        })
        .collect())
}

/// Expanding-window split over samples already in time order: each fold
/// tests the next block and trains on everything before it.
///
/// # Errors
///
/// Returns an error if `n_splits < 2` or there are too few samples.
pub fn time_series(n: usize, n_splits: i32) -> Result<Vec<Split>> {
    let k = fold_count(n_splits)?;
    if k + 1 > n {
        return Err(Error::insufficient_data(format!(
            "cannot make {k} time-series splits from {n} samples"
        )));
    }

    let test_size = n / (k + 1);
    let first = n - k * test_size;
    Ok((0..k)
        .map(|fold| {
            let start = first + fold * test_size;
            Split {
                train: (0..start).collect(),
                test: (start..start + test_size).collect(),
            }
        })
        .collect())
}

/// Error metrics of one set of predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    /// Coefficient of determination; `None` when the actual values are constant.
    pub r2: Option<f64>,
    /// Mean squared error.
    pub mse: f64,
    /// Mean absolute error.
    pub mae: f64,
}

impl Metrics {
    /// Score predictions against actual values.
    #[must_use]
    pub fn score(actual: &[f64], predicted: &[f64]) -> Self {
        let n = actual.len().min(predicted.len());
        if n == 0 {
            return Self {
                r2: None,
                mse: 0.0,
                mae: 0.0,
            };
        }
        #[allow(clippy::cast_precision_loss)]
        let count = n as f64;

        let mean = actual[..n].iter().sum::<f64>() / count;
        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        let mut abs = 0.0;
        for (y, p) in actual.iter().zip(predicted) {
            let err = y - p;
            ss_res += err * err;
            ss_tot += (y - mean) * (y - mean);
            abs += err.abs();
        }

        Self {
            r2: (ss_tot > 0.0).then(|| 1.0 - ss_res / ss_tot),
            mse: ss_res / count,
            mae: abs / count,
        }
    }
}

/// Mean and population standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spread {
    /// Mean.
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
}

impl Spread {
    /// Spread of `values`, `None` when empty.
    #[must_use]
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        Some(Self {
            mean,
            std: var.sqrt(),
        })
    }
}

/// Summary over the folds of a cross-validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FoldSummary {
    /// R² over the folds where it is defined.
    pub r2: Option<Spread>,
    /// Mean squared error.
    pub mse: Spread,
    /// Mean absolute error.
    pub mae: Spread,
}

impl FoldSummary {
    /// Summarize per-fold metrics. `None` without folds.
    #[must_use]
    pub fn of(folds: &[Metrics]) -> Option<Self> {
        let r2: Vec<f64> = folds.iter().filter_map(|m| m.r2).collect();
        let mse: Vec<f64> = folds.iter().map(|m| m.mse).collect();
        let mae: Vec<f64> = folds.iter().map(|m| m.mae).collect();
        Some(Self {
            r2: Spread::of(&r2),
            mse: Spread::of(&mse)?,
            mae: Spread::of(&mae)?,
        })
    }
}
