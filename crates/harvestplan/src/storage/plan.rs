//! Archived plans.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::planner::Schedule;

/// A schedule saved to the plan archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPlan {
    /// Identifier assigned by the archive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// When the plan was saved.
    pub created_at: DateTime<Utc>,

    /// Season the plan covers.
    pub year: i32,

    /// Task planned (e.g. `ernte`).
    pub task: String,

    /// Free-form note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// BLAKE3 hash of year, task and schedule, for deduplication.
    pub fingerprint: String,

    /// The schedule itself.
    pub schedule: Schedule,
}

impl SavedPlan {
    /// Wrap a schedule for archiving, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the schedule cannot be serialized.
    pub fn new(year: i32, task: impl Into<String>, schedule: Schedule) -> Result<Self> {
        let task = task.into();
        let fingerprint = Self::compute_fingerprint(year, &task, &schedule)?;
        Ok(Self {
            id: None,
            created_at: Utc::now(),
            year,
            task,
            label: None,
            fingerprint,
            schedule,
        })
    }

    /// Attach a label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Compute the fingerprint of a plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the schedule cannot be serialized.
    pub fn compute_fingerprint(year: i32, task: &str, schedule: &Schedule) -> Result<String> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(year.to_string().as_bytes());
        hasher.update(b"\n");
        hasher.update(task.as_bytes());
        hasher.update(b"\n");
        hasher.update(serde_json::to_string(schedule)?.as_bytes());
        Ok(hasher.finalize().to_hex().to_string())
    }

    /// Number of scheduled rounds.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.schedule.entries.len()
    }

    /// End of the last round.
    #[must_use]
    pub fn finish(&self) -> Option<NaiveDateTime> {
        self.schedule.last_end()
    }

    /// Short form of the fingerprint for display.
    #[must_use]
    pub fn short_fingerprint(&self) -> &str {
        &self.fingerprint[..self.fingerprint.len().min(12)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{PlanWarning, ScheduledField};
    use chrono::NaiveDate;

    fn schedule() -> Schedule {
        let start = NaiveDate::from_ymd_opt(2025, 9, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        Schedule {
            entries: vec![ScheduledField {
                field: "Wiese 1".to_string(),
                variety: "Gala".to_string(),
                group: "früh".to_string(),
                harvest_round: 1,
                start,
                end: start + chrono::TimeDelta::hours(4),
                hours: 8.0,
            }],
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_new_plan() {
        let plan = SavedPlan::new(2025, "ernte", schedule()).unwrap();
        assert!(plan.id.is_none());
        assert_eq!(plan.entry_count(), 1);
        assert_eq!(plan.fingerprint.len(), 64);
        assert_eq!(plan.short_fingerprint().len(), 12);
        assert!(plan.finish().is_some());
    }

    #[test]
    fn test_fingerprint_depends_on_content() {
        let a = SavedPlan::compute_fingerprint(2025, "ernte", &schedule()).unwrap();
        let b = SavedPlan::compute_fingerprint(2025, "ernte", &schedule()).unwrap();
        assert_eq!(a, b);

        assert_ne!(
            a,
            SavedPlan::compute_fingerprint(2024, "ernte", &schedule()).unwrap()
        );
        assert_ne!(
            a,
            SavedPlan::compute_fingerprint(2025, "zupfen", &schedule()).unwrap()
        );

        let mut warned = schedule();
        warned.warnings.push(PlanWarning::MissingStartDate {
            group: "spät".to_string(),
        });
        assert_ne!(
            a,
            SavedPlan::compute_fingerprint(2025, "ernte", &warned).unwrap()
        );
    }

    #[test]
    fn test_label_not_part_of_fingerprint() {
        let plain = SavedPlan::new(2025, "ernte", schedule()).unwrap();
        let labeled = SavedPlan::new(2025, "ernte", schedule())
            .unwrap()
            .with_label("Entwurf");
        assert_eq!(plain.fingerprint, labeled.fingerprint);
        assert_eq!(labeled.label.as_deref(), Some("Entwurf"));
    }
}
