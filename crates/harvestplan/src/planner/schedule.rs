//! Schedule (solution) model.
//!
//! A schedule lists every planned harvest round with its wall-clock start and
//! end, in execution order, together with the warnings raised while building
//! it.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// One planned harvest round of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledField {
    /// Field name.
    pub field: String,
    /// Variety of the field.
    pub variety: String,
    /// Variety group the round was scheduled in.
    pub group: String,
    /// Harvest round, 1-based.
    pub harvest_round: u32,
    /// When work on the round starts.
    pub start: NaiveDateTime,
    /// When work on the round ends, rounded to the hour.
    pub end: NaiveDateTime,
    /// Labor hours the round requires.
    pub hours: f64,
}

impl ScheduledField {
    /// Wall-clock duration of the round.
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}

/// Something that kept the schedule from covering every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanWarning {
    /// The group has no start date and was not scheduled.
    MissingStartDate {
        /// The skipped group.
        group: String,
    },
    /// Capacity ran out before the horizon; scheduling stopped.
    HorizonExceeded {
        /// Group being scheduled when the horizon was hit.
        group: String,
        /// Field that could not be finished.
        field: String,
        /// The horizon date.
        horizon: NaiveDate,
    },
    /// The field had neither explicit hours nor an estimate.
    NoEstimate {
        /// Field name.
        field: String,
        /// Variety of the field.
        variety: String,
    },
}

impl std::fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingStartDate { group } => {
                write!(f, "no start date for group '{group}', group skipped")
            }
            Self::HorizonExceeded {
                group,
                field,
                horizon,
            } => write!(
                f,
                "could not finish '{field}' (group '{group}') by {horizon}; review the workforce or field requirements"
            ),
            Self::NoEstimate { field, variety } => {
                write!(f, "no hours for '{field}' ({variety}), field skipped")
            }
        }
    }
}

/// Summary of one variety group within a schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSpan {
    /// Group name.
    pub group: String,
    /// Start of the group's first round.
    pub start: NaiveDateTime,
    /// End of the group's last round.
    pub end: NaiveDateTime,
    /// Labor hours across the group.
    pub hours: f64,
    /// Number of scheduled rounds.
    pub rounds: usize,
}

/// A complete harvest schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Planned rounds in execution order.
    pub entries: Vec<ScheduledField>,
    /// Warnings raised while planning.
    pub warnings: Vec<PlanWarning>,
}

impl Schedule {
    /// Creates an empty schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether scheduling ran to the end without hitting the horizon.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self
            .warnings
            .iter()
            .any(|w| matches!(w, PlanWarning::HorizonExceeded { .. }))
    }

    /// Total labor hours of all scheduled rounds.
    #[must_use]
    pub fn total_hours(&self) -> f64 {
        self.entries.iter().map(|e| e.hours).sum()
    }

    /// Start of the first round.
    #[must_use]
    pub fn first_start(&self) -> Option<NaiveDateTime> {
        self.entries.iter().map(|e| e.start).min()
    }

    /// End of the last round.
    #[must_use]
    pub fn last_end(&self) -> Option<NaiveDateTime> {
        self.entries.iter().map(|e| e.end).max()
    }

    /// Time from the first start to the last end.
    #[must_use]
    pub fn makespan(&self) -> TimeDelta {
        match (self.first_start(), self.last_end()) {
            (Some(start), Some(end)) => end - start,
            _ => TimeDelta::zero(),
        }
    }

    /// Rounds scheduled for one group.
    pub fn entries_for_group<'a>(
        &'a self,
        group: &'a str,
    ) -> impl Iterator<Item = &'a ScheduledField> + 'a {
        self.entries.iter().filter(move |e| e.group == group)
    }

    /// Per-group summaries in execution order.
    #[must_use]
    pub fn group_spans(&self) -> Vec<GroupSpan> {
        let mut order: Vec<&str> = Vec::new();
        let mut spans: BTreeMap<&str, GroupSpan> = BTreeMap::new();

        for entry in &self.entries {
            let span = spans.entry(entry.group.as_str()).or_insert_with(|| {
                order.push(entry.group.as_str());
                GroupSpan {
                    group: entry.group.clone(),
                    start: entry.start,
                    end: entry.end,
                    hours: 0.0,
                    rounds: 0,
                }
            });
            span.start = span.start.min(entry.start);
            span.end = span.end.max(entry.end);
            span.hours += entry.hours;
            span.rounds += 1;
        }

        order
            .into_iter()
            .filter_map(|group| spans.remove(group))
            .collect()
    }
}
