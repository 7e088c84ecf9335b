//! Command-line interface for harvestplan.
//!
//! This module provides the CLI structure of the `harvestplan` binary and
//! the renderers its commands print with.

mod commands;
pub mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    parse_date, ConfigCommand, CvMethodArg, FieldsCommand, HistoryCommand, ModelCommand,
    ModelKindArg, OutputFormat, PlanCommand, WorkforceCommand,
};

use crate::config::Config;

/// harvestplan - Plan the harvest of a season
///
/// Distributes the labor hours of every field over the available workforce,
/// group by group, and estimates missing hours from past seasons.
#[derive(Debug, Parser)]
#[command(name = "harvestplan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the harvest schedule of a season
    Plan(PlanCommand),

    /// Manage the workers of a season
    #[command(subcommand)]
    Workforce(WorkforceCommand),

    /// Manage the fields of a season
    #[command(subcommand)]
    Fields(FieldsCommand),

    /// Evaluate and apply the hour estimation model
    #[command(subcommand)]
    Model(ModelCommand),

    /// Browse archived plans
    #[command(subcommand)]
    History(HistoryCommand),

    /// List seasons with data files
    Years,

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.verbose, self.quiet)
    }

    /// Configuration file in effect: `-c` if given, else the default location.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(Config::default_config_path)
    }
}
