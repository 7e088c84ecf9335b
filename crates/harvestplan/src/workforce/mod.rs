//! Seasonal workforce and its daily labor capacity.
//!
//! The scheduler only sees the workforce through the [`Capacity`] trait:
//! how many labor hours are available on a date, and how many workers share
//! them.

mod worker;

use std::path::Path;

use chrono::NaiveDate;
use tracing::debug;

use crate::datadir;
use crate::error::{Error, Result};

pub use worker::{Worker, DEFAULT_WORK_DAYS};

/// Daily labor capacity as seen by the scheduler.
pub trait Capacity {
    /// Total labor hours available on `date`.
    fn daily_hours(&self, date: NaiveDate) -> f64;

    /// Number of workers sharing those hours on `date`.
    fn daily_workers(&self, date: NaiveDate) -> usize;
}

/// The workers employed in one season.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workforce {
    workers: Vec<Worker>,
}

impl Workforce {
    /// Create an empty workforce.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a workforce, enforcing unique names.
    ///
    /// # Errors
    ///
    /// Returns an error on the first invalid or duplicate worker.
    pub fn from_workers(workers: impl IntoIterator<Item = Worker>) -> Result<Self> {
        let mut workforce = Self::new();
        for worker in workers {
            workforce.add(worker)?;
        }
        Ok(workforce)
    }

    /// Add a worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker is invalid or the name is taken.
    pub fn add(&mut self, worker: Worker) -> Result<()> {
        worker.validate()?;
        if self.get(&worker.name).is_some() {
            return Err(Error::DuplicateWorker { name: worker.name });
        }
        self.workers.push(worker);
        Ok(())
    }

    /// Look up a worker by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Worker> {
        self.workers.iter().find(|w| w.name == name)
    }

    /// Replace the worker called `name`, keeping its position.
    ///
    /// # Errors
    ///
    /// Returns an error if no such worker exists, the replacement is invalid,
    /// or the replacement is renamed onto another existing worker.
    pub fn update(&mut self, name: &str, worker: Worker) -> Result<()> {
        worker.validate()?;
        let idx = self.position(name)?;
        let collides = self
            .workers
            .iter()
            .enumerate()
            .any(|(i, w)| i != idx && w.name == worker.name);
        if collides {
            return Err(Error::DuplicateWorker { name: worker.name });
        }
        self.workers[idx] = worker;
        Ok(())
    }

    /// Remove a worker and return it.
    ///
    /// # Errors
    ///
    /// Returns an error if no such worker exists.
    pub fn remove(&mut self, name: &str) -> Result<Worker> {
        let idx = self.position(name)?;
        Ok(self.workers.remove(idx))
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.workers
            .iter()
            .position(|w| w.name == name)
            .ok_or_else(|| Error::WorkerNotFound {
                name: name.to_string(),
            })
    }

    /// Iterate workers in file order.
    pub fn iter(&self) -> std::slice::Iter<'_, Worker> {
        self.workers.iter()
    }

    /// Number of workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the workforce is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Sum of the hours of all workers available on `date`.
    #[must_use]
    pub fn daily_work_hours(&self, date: NaiveDate) -> f64 {
        self.workers.iter().map(|w| w.daily_work_hours(date)).sum()
    }

    /// Number of workers available on `date`.
    #[must_use]
    pub fn daily_worker_count(&self, date: NaiveDate) -> usize {
        self.workers.iter().filter(|w| w.is_available(date)).count()
    }

    /// Sum of the agreed payments.
    #[must_use]
    pub fn total_payment(&self) -> f64 {
        self.workers.iter().filter_map(|w| w.payment).sum()
    }

    /// Load a workforce from a YAML file.
    ///
    /// A missing or empty file yields an empty workforce.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or contains invalid or
    /// duplicate workers.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let workers: Vec<Worker> = datadir::read_list(path)?.unwrap_or_default();
        let workforce = Self::from_workers(workers)?;
        debug!("Loaded {} workers from {}", workforce.len(), path.display());
        Ok(workforce)
    }

    /// Save the workforce as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        datadir::write_list(path.as_ref(), &self.workers)
    }
}

impl Capacity for Workforce {
    fn daily_hours(&self, date: NaiveDate) -> f64 {
        self.daily_work_hours(date)
    }

    fn daily_workers(&self, date: NaiveDate) -> usize {
        self.daily_worker_count(date)
    }
}

impl<'a> IntoIterator for &'a Workforce {
    type Item = &'a Worker;
    type IntoIter = std::slice::Iter<'a, Worker>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
