//! Labor-hour estimation from harvest history.
//!
//! Past seasons are recorded as [`HistoryRecord`]s: one row per field,
//! variety and year with numeric columns such as `count_ernte` (trees or
//! crates) and `hours_ernte` (labor hours spent). An [`Estimator`] fits a
//! linear model or a random forest of a task's hours on its configured
//! predictors, reports how well it cross-validates, and predicts hours for
//! the fields of a season.

mod forest;
mod regression;
mod validation;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ModelConfig;
use crate::datadir;
use crate::error::{Error, Result};

pub use forest::{RandomForest, RegressionTree, N_TREES};
pub use regression::{is_categorical, Encoding, FeatureEncoder, LinearRegression};
pub use validation::{
    group_kfold, kfold, leave_one_out, simple_split, time_series, CvMethod, CvParams, FoldSummary,
    Metrics, Split, Spread, SHUFFLE_SEED,
};

/// Estimated hours keyed by `(field, variety)`.
pub type Estimates = BTreeMap<(String, String), f64>;

/// Kind of model fitted for a task.
///
/// The predictor class names of older configuration files are accepted as
/// aliases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Ordinary least squares on one-hot and standardized predictors.
    #[default]
    #[serde(
        alias = "LinearRegressionPredictor",
        alias = "src.model.linear_regression.LinearRegressionPredictor"
    )]
    LinearRegression,
    /// Bagged regression trees; reports feature importance.
    #[serde(
        alias = "RandomForestPredictor",
        alias = "src.model.random_forest.RandomForestPredictor"
    )]
    RandomForest,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::LinearRegression => "linear_regression",
            Self::RandomForest => "random_forest",
        })
    }
}

/// Share of a predictor in a forest's error reduction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    /// Predictor column.
    pub predictor: String,
    /// Share in `[0, 1]`; the shares of a model sum to 1.
    pub importance: f64,
}

/// One field's record for one past season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Field name.
    pub field: String,
    /// Variety grown.
    pub variety: String,
    /// Season.
    pub year: i32,
    /// Numeric columns; `null` marks a missing value.
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<f64>>,
}

impl HistoryRecord {
    /// Create a record without values.
    #[must_use]
    pub fn new(field: impl Into<String>, variety: impl Into<String>, year: i32) -> Self {
        Self {
            field: field.into(),
            variety: variety.into(),
            year,
            values: BTreeMap::new(),
        }
    }

    /// Add a numeric column.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: f64) -> Self {
        self.values.insert(column.into(), Some(value));
        self
    }

    /// Numeric value of a column; `year` is numeric too.
    #[must_use]
    pub fn value(&self, column: &str) -> Option<f64> {
        match column {
            "year" => Some(f64::from(self.year)),
            _ => self.values.get(column).copied().flatten(),
        }
    }

    /// Category of `field` or `variety`.
    #[must_use]
    pub fn category(&self, column: &str) -> Option<&str> {
        match column {
            "field" => Some(&self.field),
            "variety" => Some(&self.variety),
            _ => None,
        }
    }

    /// Group key of a column, used by group k-fold.
    #[must_use]
    pub fn group_key(&self, column: &str) -> Option<String> {
        self.category(column)
            .map(str::to_string)
            .or_else(|| self.value(column).map(|v| v.to_string()))
    }

    /// Whether every predictor is present.
    fn has_predictors(&self, predictors: &[String]) -> bool {
        predictors.iter().all(|p| {
            if is_categorical(p) {
                self.category(p).is_some_and(|c| !c.is_empty())
            } else {
                self.value(p).is_some_and(f64::is_finite)
            }
        })
    }
}

/// Load harvest history. A missing file yields no records.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_history(path: impl AsRef<Path>) -> Result<Vec<HistoryRecord>> {
    let path = path.as_ref();
    let records: Vec<HistoryRecord> = datadir::read_list(path)?.unwrap_or_default();
    debug!("Loaded {} history records from {}", records.len(), path.display());
    Ok(records)
}

/// Seasons present in the history, ascending.
#[must_use]
pub fn history_years(records: &[HistoryRecord]) -> Vec<i32> {
    let mut years: Vec<i32> = records.iter().map(|r| r.year).collect();
    years.sort_unstable();
    years.dedup();
    years
}

/// Validation scores of a model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scores {
    /// One train/test split.
    Split {
        /// Scores on the training part.
        train: Metrics,
        /// Scores on the held-out part.
        test: Metrics,
    },
    /// Cross-validation folds.
    Folds {
        /// Per-fold scores.
        folds: Vec<Metrics>,
        /// Mean and spread over the folds.
        summary: FoldSummary,
    },
}

/// Outcome of validating a model before the final fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Kind of model.
    pub model: ModelKind,
    /// Validation method used.
    pub method: CvMethod,
    /// Clean rows used.
    pub samples: usize,
    /// Rows dropped for a missing target or predictor.
    pub dropped: usize,
    /// Distinct group values, for group k-fold.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    /// The scores.
    pub scores: Scores,
    /// Predictor importances of the final model, most important first.
    /// Only forests report them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub feature_importance: Vec<FeatureImportance>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
enum Regressor {
    Linear(LinearRegression),
    Forest(RandomForest),
}

/// Fitted encoder and regressor.
#[derive(Debug, Clone, PartialEq, Serialize)]
struct FittedModel {
    encoder: FeatureEncoder,
    regressor: Regressor,
}

impl FittedModel {
    fn fit(records: &[&HistoryRecord], config: &ModelConfig) -> Result<Self> {
        let encoder = FeatureEncoder::fit(records, &config.predictors);
        let rows: Vec<Vec<f64>> = records.iter().map(|r| encoder.encode(r)).collect();
        let targets: Vec<f64> = records
            .iter()
            .filter_map(|r| r.value(&config.target))
            .collect();
        let regressor = match config.model {
            ModelKind::LinearRegression => {
                Regressor::Linear(LinearRegression::fit(&rows, &targets)?)
            }
            ModelKind::RandomForest => Regressor::Forest(RandomForest::fit(&rows, &targets)?),
        };
        Ok(Self { encoder, regressor })
    }

    fn predict(&self, record: &HistoryRecord) -> f64 {
        let row = self.encoder.encode(record);
        match &self.regressor {
            Regressor::Linear(model) => model.predict(&row),
            Regressor::Forest(model) => model.predict(&row),
        }
    }

    /// Forest importances summed per predictor, most important first.
    fn importances(&self, predictors: &[String]) -> Vec<FeatureImportance> {
        let Regressor::Forest(forest) = &self.regressor else {
            return Vec::new();
        };
        let mut totals = vec![0.0; predictors.len()];
        let owners = self.encoder.column_owners();
        for (owner, value) in owners.into_iter().zip(&forest.importances) {
            totals[owner] += value;
        }
        let mut ranked: Vec<FeatureImportance> = predictors
            .iter()
            .zip(totals)
            .map(|(predictor, importance)| FeatureImportance {
                predictor: predictor.clone(),
                importance,
            })
            .collect();
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        ranked
    }

    fn score(&self, records: &[&HistoryRecord], target: &str) -> Metrics {
        let actual: Vec<f64> = records.iter().filter_map(|r| r.value(target)).collect();
        let predicted: Vec<f64> = records.iter().map(|r| self.predict(r)).collect();
        Metrics::score(&actual, &predicted)
    }
}

/// A trained labor-hour model for one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimator {
    kind: ModelKind,
    target: String,
    predictors: Vec<String>,
    model: FittedModel,
}

impl Estimator {
    /// Validate and train a model on the history.
    ///
    /// Rows missing the target or a predictor are dropped first. The final
    /// model is fitted on all remaining rows.
    ///
    /// # Errors
    ///
    /// Returns an error if too few rows remain for the validation method or
    /// the regression cannot be solved.
    pub fn train(
        records: &[HistoryRecord],
        config: &ModelConfig,
    ) -> Result<(Self, ValidationReport)> {
        let mut clean: Vec<&HistoryRecord> = records
            .iter()
            .filter(|r| r.value(&config.target).is_some_and(f64::is_finite))
            .filter(|r| r.has_predictors(&config.predictors))
            .collect();
        let dropped = records.len() - clean.len();
        if clean.len() < 2 {
            return Err(Error::insufficient_data(format!(
                "{} usable history rows for target '{}'",
                clean.len(),
                config.target
            )));
        }
        if config.cv_method == CvMethod::TimeSeries {
            clean.sort_by_key(|r| r.year);
        }
        info!(
            "Training {} for '{}' on {} rows ({} dropped) with {}",
            config.model,
            config.target,
            clean.len(),
            dropped,
            config.cv_method
        );

        let n_splits = config.cv_params.splits(config.cv_method);
        let mut groups = Vec::new();
        let scores = match config.cv_method {
            CvMethod::SimpleSplit => {
                let split = simple_split(clean.len(), config.cv_params.test_size)?;
                let train = pick(&clean, &split.train);
                let test = pick(&clean, &split.test);
                let model = FittedModel::fit(&train, config)?;
                Scores::Split {
                    train: model.score(&train, &config.target),
                    test: model.score(&test, &config.target),
                }
            }
            method => {
                let splits = match method {
                    CvMethod::Kfold => kfold(clean.len(), n_splits)?,
                    CvMethod::LeaveOneOut => leave_one_out(clean.len())?,
                    CvMethod::TimeSeries => time_series(clean.len(), n_splits)?,
                    _ => {
                        let column = &config.cv_params.group_column;
                        let keys = clean
                            .iter()
                            .map(|r| {
                                r.group_key(column).ok_or_else(|| {
                                    Error::config(format!(
                                        "group column '{column}' missing in history"
                                    ))
                                })
                            })
                            .collect::<Result<Vec<String>>>()?;
                        groups = keys.clone();
                        groups.sort();
                        groups.dedup();
                        group_kfold(&keys, n_splits)?
                    }
                };
                cross_validate(&clean, &splits, config)?
            }
        };

        let model = FittedModel::fit(&clean, config)?;
        let report = ValidationReport {
            model: config.model,
            method: config.cv_method,
            samples: clean.len(),
            dropped,
            groups,
            scores,
            feature_importance: model.importances(&config.predictors),
        };
        let estimator = Self {
            kind: config.model,
            target: config.target.clone(),
            predictors: config.predictors.clone(),
            model,
        };
        Ok((estimator, report))
    }

    /// Target column the model predicts.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Predictor columns.
    #[must_use]
    pub fn predictors(&self) -> &[String] {
        &self.predictors
    }

    /// Kind of the fitted model.
    #[must_use]
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Coefficients of a linear model; `None` for a forest.
    #[must_use]
    pub fn linear(&self) -> Option<&LinearRegression> {
        match &self.model.regressor {
            Regressor::Linear(model) => Some(model),
            Regressor::Forest(_) => None,
        }
    }

    /// Encodings of the predictors.
    #[must_use]
    pub fn encodings(&self) -> &[Encoding] {
        self.model.encoder.encodings()
    }

    /// Predict hours for one record. Negative predictions clamp to zero.
    #[must_use]
    pub fn predict(&self, record: &HistoryRecord) -> f64 {
        self.model.predict(record).max(0.0)
    }

    /// Estimates for every record of `year` whose predictors are present.
    #[must_use]
    pub fn predict_year(&self, records: &[HistoryRecord], year: i32) -> Estimates {
        records
            .iter()
            .filter(|r| r.year == year && r.has_predictors(&self.predictors))
            .map(|r| ((r.field.clone(), r.variety.clone()), self.predict(r)))
            .collect()
    }
}

fn pick<'a>(records: &[&'a HistoryRecord], indices: &[usize]) -> Vec<&'a HistoryRecord> {
    indices.iter().map(|i| records[*i]).collect()
}

fn cross_validate(
    records: &[&HistoryRecord],
    splits: &[Split],
    config: &ModelConfig,
) -> Result<Scores> {
    let mut folds = Vec::with_capacity(splits.len());
    for (i, split) in splits.iter().enumerate() {
        let train = pick(records, &split.train);
        let test = pick(records, &split.test);
        let model = FittedModel::fit(&train, config)?;
        let metrics = model.score(&test, &config.target);
        debug!("Fold {}: {:?}", i + 1, metrics);
        folds.push(metrics);
    }
    let summary = FoldSummary::of(&folds)
        .ok_or_else(|| Error::insufficient_data("cross-validation produced no folds"))?;
    Ok(Scores::Folds { folds, summary })
}
