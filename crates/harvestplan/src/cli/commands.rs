//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::{NaiveDate, Weekday};
use clap::{Args, Subcommand, ValueEnum};

use crate::estimate::{CvMethod, ModelKind};

/// Plan command arguments.
#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Season to plan (defaults to the configured year)
    #[arg(short, long)]
    pub year: Option<i32>,

    /// Task to plan (defaults to the configured task)
    #[arg(short, long)]
    pub task: Option<String>,

    /// Override a group's start date, e.g. `--start früh=2025-09-01`
    #[arg(short, long = "start", value_name = "GROUP=DATE", value_parser = parse_start)]
    pub starts: Vec<(String, NaiveDate)>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Archive the plan
    #[arg(long)]
    pub save: bool,

    /// Label stored with an archived plan
    #[arg(long, requires = "save")]
    pub label: Option<String>,
}

/// Workforce commands.
#[derive(Debug, Subcommand)]
pub enum WorkforceCommand {
    /// List the workers of a season
    List {
        /// Season (defaults to the configured year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Add a worker
    Add {
        /// Season (defaults to the configured year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Worker name
        name: String,

        /// First working day
        #[arg(long, value_parser = parse_date)]
        start: NaiveDate,

        /// Last working day
        #[arg(long, value_parser = parse_date)]
        end: NaiveDate,

        /// Hours per working day
        #[arg(long)]
        hours: f64,

        /// Working weekdays, comma separated (default Monday to Saturday)
        #[arg(long, value_delimiter = ',', value_parser = parse_weekday)]
        days: Vec<Weekday>,

        /// Agreed payment
        #[arg(long)]
        payment: Option<f64>,
    },

    /// Change a worker; only the given values change
    Update {
        /// Season (defaults to the configured year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Current worker name
        name: String,

        /// New name
        #[arg(long)]
        rename: Option<String>,

        /// First working day
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,

        /// Last working day
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,

        /// Hours per working day
        #[arg(long)]
        hours: Option<f64>,

        /// Working weekdays, comma separated
        #[arg(long, value_delimiter = ',', value_parser = parse_weekday)]
        days: Vec<Weekday>,

        /// Agreed payment
        #[arg(long)]
        payment: Option<f64>,
    },

    /// Remove a worker
    Remove {
        /// Season (defaults to the configured year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Worker name
        name: String,
    },

    /// Show daily labor capacity
    Capacity {
        /// Season (defaults to the configured year)
        #[arg(short, long)]
        year: Option<i32>,

        /// First day to show
        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,

        /// Number of days to show
        #[arg(long, default_value = "7")]
        days: u32,
    },
}

/// Field collection commands.
#[derive(Debug, Subcommand)]
pub enum FieldsCommand {
    /// List the fields of a season
    List {
        /// Season (defaults to the configured year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Add a field
    Add {
        /// Season (defaults to the configured year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Field name
        field: String,

        /// Variety grown on the field
        variety: String,

        /// Number of harvest rounds
        #[arg(long, default_value = "1")]
        rounds: u32,

        /// Scheduling position
        #[arg(long)]
        order: Option<u32>,

        /// Labor hours per round, instead of the model estimate
        #[arg(long)]
        hours: Option<f64>,
    },

    /// Change a field; only the given values change
    Update {
        /// Season (defaults to the configured year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Current field name
        field: String,

        /// Current variety
        variety: String,

        /// New field name
        #[arg(long)]
        rename: Option<String>,

        /// New variety
        #[arg(long)]
        new_variety: Option<String>,

        /// Number of harvest rounds
        #[arg(long)]
        rounds: Option<u32>,

        /// Scheduling position
        #[arg(long)]
        order: Option<u32>,

        /// Labor hours per round
        #[arg(long, conflicts_with = "estimate")]
        hours: Option<f64>,

        /// Drop explicit hours and use the model estimate
        #[arg(long)]
        estimate: bool,
    },

    /// Remove a field
    Remove {
        /// Season (defaults to the configured year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Field name
        field: String,

        /// Variety
        variety: String,
    },
}

/// Estimate model commands.
#[derive(Debug, Subcommand)]
pub enum ModelCommand {
    /// Cross-validate and fit the model of a task
    Evaluate {
        /// Task (defaults to the configured task)
        #[arg(short, long)]
        task: Option<String>,

        /// Override the configured validation method
        #[arg(long, value_enum)]
        cv_method: Option<CvMethodArg>,

        /// Override the configured model kind
        #[arg(short, long, value_enum)]
        model: Option<ModelKindArg>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Estimate hours for every field of a season
    Predict {
        /// Season (defaults to the configured year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Task (defaults to the configured task)
        #[arg(short, long)]
        task: Option<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Plan archive commands.
#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// List archived plans
    List {
        /// Only plans of this season
        #[arg(short, long)]
        year: Option<i32>,

        /// Only plans of this task (with --year)
        #[arg(short, long, requires = "year")]
        task: Option<String>,

        /// Maximum number of plans
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show an archived plan
    Show {
        /// Plan ID
        id: i64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete an archived plan
    Delete {
        /// Plan ID
        id: i64,
    },

    /// Keep only the newest plans
    Prune {
        /// Number of plans to keep
        #[arg(short, long)]
        keep: usize,
    },

    /// Show archive statistics
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Validation method argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CvMethodArg {
    /// One shuffled train/test split
    SimpleSplit,
    /// Shuffled k-fold
    Kfold,
    /// Leave one out
    LeaveOneOut,
    /// Folds by group column
    GroupKfold,
    /// Expanding window by year
    TimeSeries,
}

impl From<CvMethodArg> for CvMethod {
    fn from(arg: CvMethodArg) -> Self {
        match arg {
            CvMethodArg::SimpleSplit => Self::SimpleSplit,
            CvMethodArg::Kfold => Self::Kfold,
            CvMethodArg::LeaveOneOut => Self::LeaveOneOut,
            CvMethodArg::GroupKfold => Self::GroupKfold,
            CvMethodArg::TimeSeries => Self::TimeSeries,
        }
    }
}

/// Model kind argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKindArg {
    /// Linear regression
    Linear,
    /// Random forest
    Forest,
}

impl From<ModelKindArg> for ModelKind {
    fn from(arg: ModelKindArg) -> Self {
        match arg {
            ModelKindArg::Linear => Self::LinearRegression,
            ModelKindArg::Forest => Self::RandomForest,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

/// Parse an ISO date (`YYYY-MM-DD`).
///
/// # Errors
///
/// Returns a message if the text is not a valid date.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{s}' (expected YYYY-MM-DD): {e}"))
}

fn parse_weekday(s: &str) -> Result<Weekday, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("invalid weekday '{s}'"))
}

fn parse_start(s: &str) -> Result<(String, NaiveDate), String> {
    let (group, date) = s
        .split_once('=')
        .ok_or_else(|| format!("expected GROUP=DATE, got '{s}'"))?;
    let group = group.trim();
    if group.is_empty() {
        return Err(format!("missing group in '{s}'"));
    }
    Ok((group.to_string(), parse_date(date)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cv_method_arg_conversion() {
        assert_eq!(CvMethod::from(CvMethodArg::Kfold), CvMethod::Kfold);
        assert_eq!(
            CvMethod::from(CvMethodArg::LeaveOneOut),
            CvMethod::LeaveOneOut
        );
        assert_eq!(
            CvMethod::from(CvMethodArg::GroupKfold),
            CvMethod::GroupKfold
        );
    }

    #[test]
    fn test_model_kind_arg_conversion() {
        assert_eq!(ModelKind::from(ModelKindArg::Linear), ModelKind::LinearRegression);
        assert_eq!(ModelKind::from(ModelKindArg::Forest), ModelKind::RandomForest);
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2025-09-01"),
            Ok(NaiveDate::from_ymd_opt(2025, 9, 1).unwrap())
        );
        assert!(parse_date("01.09.2025").is_err());
        assert!(parse_date("2025-02-30").is_err());
    }

    #[test]
    fn test_parse_weekday() {
        assert_eq!(parse_weekday("Mon"), Ok(Weekday::Mon));
        assert_eq!(parse_weekday("saturday"), Ok(Weekday::Sat));
        assert!(parse_weekday("Funday").is_err());
    }

    #[test]
    fn test_parse_start() {
        let (group, date) = parse_start("früh=2025-09-01").unwrap();
        assert_eq!(group, "früh");
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());

        // group names may contain spaces
        assert_eq!(parse_start("Late Group=2025-10-01").unwrap().0, "Late Group");

        assert!(parse_start("früh").is_err());
        assert!(parse_start("=2025-09-01").is_err());
        assert!(parse_start("früh=soon").is_err());
    }

    #[test]
    fn test_command_debug() {
        let cmd = HistoryCommand::Prune { keep: 5 };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Prune"));
        assert!(debug_str.contains("keep"));
    }
}
