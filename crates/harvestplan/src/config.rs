//! Configuration management for harvestplan.
//!
//! This module provides configuration loading and validation using figment,
//! supporting a YAML (or TOML) config file, environment variables, and defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};
use figment::{
    providers::{Env, Format, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::datadir::DataDir;
use crate::error::{Error, Result};
use crate::estimate::{CvMethod, CvParams, ModelKind};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Directory name used under the platform config and data directories.
const APP_DIR_NAME: &str = "harvestplan";

/// Default plan archive file name.
const DATABASE_FILE_NAME: &str = "plans.db";

/// Environment variable prefix.
const ENV_PREFIX: &str = "HARVESTPLAN_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `HARVESTPLAN_`, `__` separates nesting)
/// 2. The config file (`config/config.yaml` or the user config directory)
/// 3. Default values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The season being planned.
    pub year: i32,
    /// Directory holding the per-year data files.
    pub data_dir: PathBuf,
    /// Default labor task to plan (key into `models`).
    pub task: String,
    /// First working day per variety group.
    #[serde(with = "crate::dates::map")]
    pub start_date: BTreeMap<String, NaiveDate>,
    /// Variety to variety group mapping. Unmapped varieties form their own group.
    pub variety_groups: BTreeMap<String, String>,
    /// Scheduler settings.
    pub schedule: ScheduleConfig,
    /// Explicit data file locations.
    pub files: FilesConfig,
    /// Hour estimate models, keyed by task name.
    pub models: BTreeMap<String, ModelConfig>,
    /// Plan archive settings.
    pub storage: StorageConfig,
}

/// Scheduler-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Time of day at which work starts.
    pub day_start: NaiveTime,
    /// Last day on which work may be scheduled.
    /// Defaults to December 31 of each group's start year.
    pub horizon: Option<NaiveDate>,
    /// Explicit ordering of field harvest rounds.
    pub harvest_round_order: Vec<RoundRef>,
}

/// A reference to one harvest round of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRef {
    /// Field name.
    pub field: String,
    /// Harvest round, 1-based.
    pub round: u32,
}

/// Explicit data file paths, overriding the per-year names in `data_dir`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Field collection file.
    pub fields: Option<PathBuf>,
    /// Workforce file.
    pub workforce: Option<PathBuf>,
    /// Harvest history file.
    pub history: Option<PathBuf>,
}

/// Hour estimate model for one labor task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Kind of model to fit.
    #[serde(default, alias = "class")]
    pub model: ModelKind,
    /// History column holding the observed hours.
    pub target: String,
    /// History columns used as predictors.
    pub predictors: Vec<String>,
    /// Cross-validation method used for evaluation.
    #[serde(default)]
    pub cv_method: CvMethod,
    /// Cross-validation parameters.
    #[serde(default)]
    pub cv_params: CvParams,
}

/// Plan archive configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the archive database.
    /// Defaults to `~/.local/share/harvestplan/plans.db`
    pub database_path: Option<PathBuf>,
    /// Maximum number of archived plans to retain. 0 means unlimited.
    pub max_plans: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            year: 2025,
            data_dir: PathBuf::from("config"),
            task: "ernte".to_string(),
            start_date: BTreeMap::new(),
            variety_groups: BTreeMap::new(),
            schedule: ScheduleConfig::default(),
            files: FilesConfig::default(),
            models: default_models(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            day_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            horizon: None,
            harvest_round_order: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_plans: 200,
        }
    }
}

/// Default estimate models: harvest ("ernte") and thinning ("zupfen").
fn default_models() -> BTreeMap<String, ModelConfig> {
    let mut models = BTreeMap::new();
    for task in ["ernte", "zupfen"] {
        models.insert(
            task.to_string(),
            ModelConfig {
                model: ModelKind::LinearRegression,
                target: format!("hours_{task}"),
                predictors: vec!["variety".to_string(), format!("count_{task}")],
                cv_method: CvMethod::GroupKfold,
                cv_params: CvParams {
                    n_splits: Some(-1),
                    ..CvParams::default()
                },
            },
        );
    }
    models
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// Files ending in `.toml` are read as TOML, anything else as YAML.
    /// A missing file is not an error; defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        figment = if is_toml(&config_file) {
            figment.merge(Toml::file(&config_file))
        } else {
            figment.merge(Yaml::file(&config_file))
        };
        let figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    ///
    /// Prefers `config/config.yaml` in the working directory (the mounted
    /// volume layout), falling back to the user configuration directory.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        let local = PathBuf::from("config").join(CONFIG_FILE_NAME);
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path for the plan archive.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(APP_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if !(2000..=2100).contains(&self.year) {
            return Err(Error::config(format!(
                "year must be between 2000 and 2100, got {}",
                self.year
            )));
        }

        if self.task.trim().is_empty() {
            return Err(Error::config("task must not be empty"));
        }

        for (group, date) in &self.start_date {
            if group.trim().is_empty() {
                return Err(Error::config(format!(
                    "start_date has an entry with an empty group name ({date})"
                )));
            }
        }

        for entry in &self.schedule.harvest_round_order {
            if entry.round == 0 {
                return Err(Error::config(format!(
                    "harvest_round_order entry for '{}' has round 0; rounds start at 1",
                    entry.field
                )));
            }
        }

        for (task, model) in &self.models {
            model.validate(task)?;
        }

        Ok(())
    }

    /// Get the data directory helper.
    #[must_use]
    pub fn data_dir(&self) -> DataDir {
        DataDir::new(&self.data_dir)
    }

    /// Path of the field collection for the given year.
    #[must_use]
    pub fn fields_path(&self, year: i32) -> PathBuf {
        self.files
            .fields
            .clone()
            .unwrap_or_else(|| self.data_dir().fields_path(year))
    }

    /// Path of the workforce file for the given year.
    #[must_use]
    pub fn workforce_path(&self, year: i32) -> PathBuf {
        self.files
            .workforce
            .clone()
            .unwrap_or_else(|| self.data_dir().workforce_path(year))
    }

    /// Path of the harvest history file.
    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.files
            .history
            .clone()
            .unwrap_or_else(|| self.data_dir().history_path())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Variety group of a variety.
    #[must_use]
    pub fn group_for<'a>(&'a self, variety: &'a str) -> &'a str {
        self.variety_groups
            .get(variety)
            .map_or(variety, String::as_str)
    }

    /// Model configuration for a task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task has no model configured.
    pub fn model(&self, task: &str) -> Result<&ModelConfig> {
        self.models.get(task).ok_or_else(|| Error::ModelNotConfigured {
            task: task.to_string(),
        })
    }
}

impl ModelConfig {
    /// Validate a model configuration.
    ///
    /// # Errors
    ///
    /// Returns an error naming the task if a setting is out of range.
    pub fn validate(&self, task: &str) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(Error::config(format!("model '{task}' has no target column")));
        }
        if self.predictors.is_empty() {
            return Err(Error::config(format!("model '{task}' has no predictors")));
        }
        if self.predictors.iter().any(|p| p == &self.target) {
            return Err(Error::config(format!(
                "model '{task}' uses its target '{}' as a predictor",
                self.target
            )));
        }

        let params = &self.cv_params;
        let n_splits = params.splits(self.cv_method);
        match self.cv_method {
            CvMethod::SimpleSplit => {
                if !(params.test_size > 0.0 && params.test_size < 1.0) {
                    return Err(Error::config(format!(
                        "model '{task}': test_size must be in (0, 1), got {}",
                        params.test_size
                    )));
                }
            }
            CvMethod::Kfold | CvMethod::TimeSeries => {
                if n_splits < 2 {
                    return Err(Error::config(format!(
                        "model '{task}': n_splits must be at least 2, got {n_splits}"
                    )));
                }
            }
            CvMethod::GroupKfold => {
                if n_splits == 0 || n_splits == 1 {
                    return Err(Error::config(format!(
                        "model '{task}': n_splits must be at least 2 or negative, got {n_splits}"
                    )));
                }
                if params.group_column.trim().is_empty() {
                    return Err(Error::config(format!(
                        "model '{task}': group_column must not be empty"
                    )));
                }
            }
            CvMethod::LeaveOneOut => {}
        }
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}
