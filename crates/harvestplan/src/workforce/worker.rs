//! Individual seasonal workers.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Days worked when a worker entry does not list any.
pub const DEFAULT_WORK_DAYS: [Weekday; 6] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

fn default_work_days() -> Vec<Weekday> {
    DEFAULT_WORK_DAYS.to_vec()
}

/// A worker hired for part of the season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    /// Unique name within the workforce.
    pub name: String,
    /// First day of employment.
    #[serde(with = "crate::dates")]
    pub start_date: NaiveDate,
    /// Last day of employment (inclusive).
    #[serde(with = "crate::dates")]
    pub end_date: NaiveDate,
    /// Hours worked on each working day.
    pub work_hours: f64,
    /// Weekdays on which the worker is available.
    #[serde(default = "default_work_days", with = "weekday_names")]
    pub work_days: Vec<Weekday>,
    /// Agreed payment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<f64>,
}

impl Worker {
    /// Create a worker available Monday through Saturday.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        work_hours: f64,
    ) -> Self {
        Self {
            name: name.into(),
            start_date,
            end_date,
            work_hours,
            work_days: default_work_days(),
            payment: None,
        }
    }

    /// Set the working weekdays.
    #[must_use]
    pub fn with_days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.work_days = days.into_iter().collect();
        self
    }

    /// Set the payment.
    #[must_use]
    pub fn with_payment(mut self, payment: f64) -> Self {
        self.payment = Some(payment);
        self
    }

    /// Check the worker definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, the employment period is
    /// reversed, the daily hours are outside `(0, 24]`, or the payment is
    /// negative.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_worker(&self.name, "name must not be empty"));
        }
        if self.start_date > self.end_date {
            return Err(Error::invalid_worker(
                &self.name,
                format!(
                    "start date {} is after end date {}",
                    self.start_date, self.end_date
                ),
            ));
        }
        if !(self.work_hours > 0.0 && self.work_hours <= 24.0) {
            return Err(Error::invalid_worker(
                &self.name,
                format!("work hours must be in (0, 24], got {}", self.work_hours),
            ));
        }
        if let Some(payment) = self.payment {
            if !payment.is_finite() || payment < 0.0 {
                return Err(Error::invalid_worker(
                    &self.name,
                    format!("payment must not be negative, got {payment}"),
                ));
            }
        }
        Ok(())
    }

    /// Whether the worker works on `date`.
    #[must_use]
    pub fn is_available(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date && self.work_days.contains(&date.weekday())
    }

    /// Hours the worker contributes on `date`.
    #[must_use]
    pub fn daily_work_hours(&self, date: NaiveDate) -> f64 {
        if self.is_available(date) {
            self.work_hours
        } else {
            0.0
        }
    }
}

/// Full English weekday names on disk; any form chrono parses on input.
mod weekday_names {
    use chrono::Weekday;
    use serde::{de, Deserialize, Deserializer, Serializer};

    fn full_name(day: Weekday) -> &'static str {
        match day {
            Weekday::Mon => "Monday",
            Weekday::Tue => "Tuesday",
            Weekday::Wed => "Wednesday",
            Weekday::Thu => "Thursday",
            Weekday::Fri => "Friday",
            Weekday::Sat => "Saturday",
            Weekday::Sun => "Sunday",
        }
    }

    pub fn serialize<S: Serializer>(days: &[Weekday], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(days.iter().map(|d| full_name(*d)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Weekday>, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        let mut days = Vec::with_capacity(names.len());
        for name in names {
            let day: Weekday = name
                .trim()
                .parse()
                .map_err(|_| de::Error::custom(format!("unknown weekday '{name}'")))?;
            if !days.contains(&day) {
                days.push(day);
            }
        }
        Ok(days)
    }
}
