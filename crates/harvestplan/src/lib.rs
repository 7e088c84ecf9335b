//! `harvestplan` - Harvest labor planning
//!
//! This library schedules the labor hours of a season's fields over the
//! available workforce, variety group by variety group, and estimates
//! missing hours with a regression model trained on past harvests.
//! Schedules can be archived in a local `SQLite` database.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod datadir;
pub mod dates;
pub mod error;
pub mod estimate;
pub mod fields;
pub mod logging;
pub mod planner;
pub mod storage;
pub mod workforce;

pub use config::Config;
pub use error::{Error, Result};
pub use estimate::{Estimator, HistoryRecord};
pub use fields::{Field, FieldCollection};
pub use logging::{init_logging, Verbosity};
pub use planner::{Planner, Schedule};
pub use storage::{SavedPlan, Storage, StorageStats};
pub use workforce::{Capacity, Worker, Workforce};
