//! Harvest planning: from fields, workforce and estimates to a schedule.
//!
//! [`expand`] turns the field collection into per-round work items and
//! [`scheduler`] lays them out over the workforce's daily capacity.
//! [`Planner`] ties both to the configuration.

pub mod expand;
pub mod schedule;
pub mod scheduler;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::estimate::{self, Estimates, Estimator};
use crate::fields::FieldCollection;
use crate::workforce::{Capacity, Workforce};

pub use expand::{expand_fields, Expansion};
pub use schedule::{GroupSpan, PlanWarning, Schedule, ScheduledField};
pub use scheduler::{round_to_nearest_hour, GroupScheduler, WorkItem};

/// Builds schedules from the configuration.
#[derive(Debug, Clone)]
pub struct Planner<'a> {
    config: &'a Config,
    start_dates: BTreeMap<String, NaiveDate>,
}

impl<'a> Planner<'a> {
    /// Create a planner using the configured group start dates.
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            start_dates: config.start_date.clone(),
        }
    }

    /// Override the start date of a group.
    #[must_use]
    pub fn with_start(mut self, group: impl Into<String>, date: NaiveDate) -> Self {
        self.start_dates.insert(group.into(), date);
        self
    }

    fn scheduler(&self) -> GroupScheduler {
        GroupScheduler::new(self.start_dates.clone())
            .with_day_start(self.config.schedule.day_start)
            .with_horizon(self.config.schedule.horizon)
    }

    /// Plan the given fields against a capacity.
    ///
    /// Warnings from expansion (fields without hours) precede the
    /// scheduler's own.
    ///
    /// # Errors
    ///
    /// Returns an error if any hours are negative or not finite.
    pub fn plan<C: Capacity + ?Sized>(
        &self,
        fields: &FieldCollection,
        capacity: &C,
        estimates: &Estimates,
    ) -> Result<Schedule> {
        let expansion = expand_fields(fields, self.config, estimates)?;
        let mut schedule = self.scheduler().schedule(&expansion.items, capacity)?;

        let mut warnings = expansion.warnings;
        warnings.append(&mut schedule.warnings);
        schedule.warnings = warnings;

        info!(
            "Planned {} rounds ({:.1} h), {} warnings",
            schedule.entries.len(),
            schedule.total_hours(),
            schedule.warnings.len()
        );
        Ok(schedule)
    }

    /// Load the season's files and plan them.
    ///
    /// Estimates are only computed when some field lacks explicit hours and
    /// history exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a data file is invalid, the task has no model, or
    /// training fails.
    pub fn plan_season(&self, year: i32, task: &str) -> Result<Schedule> {
        let fields = FieldCollection::load(self.config.fields_path(year))?;
        let workforce = Workforce::load(self.config.workforce_path(year))?;
        if workforce.is_empty() {
            warn!("No workers for {}", year);
        }

        let estimates = if needs_estimates(&fields) {
            self.estimates(year, task)?
        } else {
            Estimates::new()
        };
        self.plan(&fields, &workforce, &estimates)
    }

    /// Train the task's model and estimate hours for `year`.
    ///
    /// # Errors
    ///
    /// Returns an error if the task has no model or training fails.
    pub fn estimates(&self, year: i32, task: &str) -> Result<Estimates> {
        let model = self.config.model(task)?;
        let records = estimate::load_history(self.config.history_path())?;
        if records.is_empty() {
            warn!("No harvest history; fields without hours will be skipped");
            return Ok(Estimates::new());
        }

        let (estimator, _) = Estimator::train(&records, model)?;
        Ok(estimator.predict_year(&records, year))
    }
}

fn needs_estimates(fields: &FieldCollection) -> bool {
    fields
        .iter()
        .any(|f| f.harvest_rounds > 0 && f.hours.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::HistoryRecord;
    use crate::fields::Field;
    use crate::workforce::Worker;
    use chrono::NaiveDateTime;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn at(m: u32, d: u32, h: u32) -> NaiveDateTime {
        date(m, d).and_hms_opt(h, 0, 0).unwrap()
    }

    fn config(dir: &std::path::Path) -> Config {
        let mut config = Config {
            data_dir: dir.to_path_buf(),
            ..Config::default()
        };
        config.start_date.insert("früh".to_string(), date(9, 1));
        config.start_date.insert("Topaz".to_string(), date(9, 15));
        config
            .variety_groups
            .insert("Gala".to_string(), "früh".to_string());
        config
            .variety_groups
            .insert("Elstar".to_string(), "früh".to_string());
        config
    }

    fn workforce() -> Workforce {
        // 2025-09-01 is a Monday; two workers, eight hours, Monday to Saturday
        Workforce::from_workers([
            Worker::new("Gabriel", date(9, 1), date(10, 31), 8.0),
            Worker::new("Sophia", date(9, 1), date(10, 31), 8.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_plan_with_workforce() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let fields = FieldCollection::from_fields([
            Field::new("Wiese 1", "Gala").with_hours(16.0).with_order(1),
            Field::new("Wiese 2", "Topaz").with_hours(8.0),
            Field::new("Wiese 3", "Elstar").with_hours(40.0).with_order(2),
        ])
        .unwrap();

        let schedule = Planner::new(&config)
            .plan(&fields, &workforce(), &Estimates::new())
            .unwrap();

        assert!(schedule.warnings.is_empty());
        assert_eq!(schedule.entries.len(), 3);
        // Wiese 1: one full day for two workers
        assert_eq!(schedule.entries[0].end, at(9, 1, 16));
        // Wiese 3: 40 h over 16 h/day; Sunday 09-07 is not reached
        assert_eq!(schedule.entries[1].start, at(9, 1, 16));
        assert_eq!(schedule.entries[1].end, at(9, 4, 12));
        // Topaz waits for its own start date
        assert_eq!(schedule.entries[2].group, "Topaz");
        assert_eq!(schedule.entries[2].start, at(9, 15, 8));
        assert_eq!(schedule.entries[2].end, at(9, 15, 12));
    }

    #[test]
    fn test_plan_skips_sunday() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config(tmp.path());
        // Saturday
        config.start_date.insert("früh".to_string(), date(9, 6));
        let fields =
            FieldCollection::from_fields([Field::new("Wiese 1", "Gala").with_hours(24.0)]).unwrap();

        let schedule = Planner::new(&config)
            .plan(&fields, &workforce(), &Estimates::new())
            .unwrap();
        assert_eq!(schedule.entries[0].end, at(9, 8, 12));
    }

    #[test]
    fn test_start_override_and_warning_order() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let fields = FieldCollection::from_fields([
            Field::new("Wiese 1", "Gala").with_hours(8.0),
            Field::new("Wiese 4", "Boskoop").with_hours(8.0),
            Field::new("Wiese 5", "Gala"),
        ])
        .unwrap();

        let schedule = Planner::new(&config)
            .with_start("früh", date(9, 2))
            .plan(&fields, &workforce(), &Estimates::new())
            .unwrap();

        assert_eq!(schedule.entries[0].start, at(9, 2, 8));
        assert!(matches!(
            schedule.warnings[0],
            PlanWarning::NoEstimate { .. }
        ));
        assert!(matches!(
            schedule.warnings[1],
            PlanWarning::MissingStartDate { .. }
        ));
    }

    #[test]
    fn test_plan_season_from_files() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());

        FieldCollection::from_fields([
            Field::new("A", "Gala").with_hours(16.0),
            Field::new("B", "Gala"),
        ])
        .unwrap()
        .save(config.fields_path(2025))
        .unwrap();
        workforce().save(config.workforce_path(2025)).unwrap();

        let mut history = Vec::new();
        for (year, count) in [(2022, 10.0), (2023, 20.0), (2024, 30.0), (2025, 5.0)] {
            let mut record = HistoryRecord::new("B", "Gala", year).with("count_ernte", count);
            if year < 2025 {
                record = record.with("hours_ernte", 2.0 * count);
            }
            history.push(record);
        }
        crate::datadir::write_list(&config.history_path(), &history).unwrap();

        let schedule = Planner::new(&config).plan_season(2025, "ernte").unwrap();
        assert_eq!(schedule.entries.len(), 2);
        assert!((schedule.entries[1].hours - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_plan_season_without_history() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        FieldCollection::from_fields([Field::new("B", "Gala")])
            .unwrap()
            .save(config.fields_path(2025))
            .unwrap();

        let schedule = Planner::new(&config).plan_season(2025, "ernte").unwrap();
        assert!(schedule.entries.is_empty());
        assert_eq!(schedule.warnings.len(), 1);
    }

    #[test]
    fn test_unknown_task() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        FieldCollection::from_fields([Field::new("B", "Gala")])
            .unwrap()
            .save(config.fields_path(2025))
            .unwrap();

        let err = Planner::new(&config).plan_season(2025, "pflanzen").unwrap_err();
        assert!(matches!(err, crate::Error::ModelNotConfigured { .. }));
    }
}
