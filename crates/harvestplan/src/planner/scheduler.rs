//! Sequential variety-group scheduler.
//!
//! # Algorithm
//!
//! 1. Partition work items by variety group, keeping their order.
//! 2. Order groups by configured start date (then name). Groups without a
//!    start date are skipped with a warning.
//! 3. Each group starts at `max(start date at day start, previous group end)`,
//!    so groups never overlap.
//! 4. Rounds are worked back to back. Each day offers the workforce's labor
//!    hours; the wall clock advances by `hours / workers` because workers pick
//!    in parallel. Days without capacity are skipped, resuming at day start.
//! 5. Each round's end is rounded to the nearest hour and becomes the start
//!    of the next round.
//!
//! Scheduling stops with a partial result once a group would start, or the
//! next working day would fall, after the horizon (December 31 of the
//! group's start year unless configured).

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::schedule::{PlanWarning, Schedule, ScheduledField};
use crate::error::{Error, Result};
use crate::workforce::Capacity;

const MICROS_PER_HOUR: f64 = 3_600_000_000.0;

/// One harvest round of one field, ready to be scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Field name.
    pub field: String,
    /// Variety of the field.
    pub variety: String,
    /// Variety group the round belongs to.
    pub group: String,
    /// Harvest round, 1-based.
    pub harvest_round: u32,
    /// Labor hours the round requires.
    pub hours: f64,
}

impl WorkItem {
    /// Creates a work item for round 1.
    pub fn new(
        field: impl Into<String>,
        variety: impl Into<String>,
        group: impl Into<String>,
        hours: f64,
    ) -> Self {
        Self {
            field: field.into(),
            variety: variety.into(),
            group: group.into(),
            harvest_round: 1,
            hours,
        }
    }

    /// Sets the harvest round.
    #[must_use]
    pub fn with_round(mut self, round: u32) -> Self {
        self.harvest_round = round;
        self
    }
}

/// Capacity left on the day currently being worked.
#[derive(Debug)]
struct WorkDay {
    date: NaiveDate,
    hours_left: f64,
    workers: usize,
}

impl WorkDay {
    fn load<C: Capacity + ?Sized>(capacity: &C, date: NaiveDate) -> Self {
        Self {
            date,
            hours_left: capacity.daily_hours(date),
            workers: capacity.daily_workers(date),
        }
    }

    fn is_exhausted(&self) -> bool {
        self.hours_left <= 0.0 || self.workers == 0
    }
}

/// Sequential, non-overlapping scheduler over variety groups.
#[derive(Debug, Clone)]
pub struct GroupScheduler {
    start_dates: BTreeMap<String, NaiveDate>,
    day_start: NaiveTime,
    horizon: Option<NaiveDate>,
}

impl GroupScheduler {
    /// Creates a scheduler with the given group start dates, starting work
    /// at 08:00.
    #[must_use]
    pub fn new(start_dates: BTreeMap<String, NaiveDate>) -> Self {
        Self {
            start_dates,
            day_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            horizon: None,
        }
    }

    /// Uses one start date for every group in `groups`.
    #[must_use]
    pub fn uniform<'a>(start: NaiveDate, groups: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(groups.into_iter().map(|g| (g.to_string(), start)).collect())
    }

    /// Sets the time of day at which work starts.
    #[must_use]
    pub fn with_day_start(mut self, day_start: NaiveTime) -> Self {
        self.day_start = day_start;
        self
    }

    /// Sets the last day on which work may be scheduled.
    #[must_use]
    pub fn with_horizon(mut self, horizon: Option<NaiveDate>) -> Self {
        self.horizon = horizon;
        self
    }

    /// Schedules `items` against the daily `capacity`.
    ///
    /// # Errors
    ///
    /// Returns an error if any item has negative or non-finite hours.
    pub fn schedule<C: Capacity + ?Sized>(
        &self,
        items: &[WorkItem],
        capacity: &C,
    ) -> Result<Schedule> {
        for item in items {
            if !item.hours.is_finite() || item.hours < 0.0 {
                return Err(Error::InvalidHours {
                    field: item.field.clone(),
                    hours: item.hours,
                });
            }
        }

        let mut schedule = Schedule::new();
        let mut previous_end: Option<NaiveDateTime> = None;
        let mut day: Option<WorkDay> = None;

        for (group, group_items) in self.ordered_groups(items, &mut schedule) {
            let Some(&start_date) = self.start_dates.get(group) else {
                continue;
            };
            let horizon = self.horizon_for(start_date);

            let group_start = start_date.and_time(self.day_start);
            let mut now = previous_end.map_or(group_start, |end| end.max(group_start));
            if now.date() > horizon {
                if let Some(first) = group_items.first() {
                    horizon_exceeded(&mut schedule, group, &first.field, horizon);
                }
                return Ok(schedule);
            }
            debug!("Scheduling group '{}' from {}", group, now);

            for item in group_items {
                let field_start = now;
                let mut remaining = item.hours;

                while remaining > 0.0 {
                    let today = match day.take() {
                        Some(d) if d.date == now.date() => d,
                        _ if now.date() > horizon => {
                            horizon_exceeded(&mut schedule, group, &item.field, horizon);
                            return Ok(schedule);
                        }
                        _ => WorkDay::load(capacity, now.date()),
                    };

                    if today.is_exhausted() {
                        let next = today.date.succ_opt().filter(|next| *next <= horizon);
                        let Some(next) = next else {
                            horizon_exceeded(&mut schedule, group, &item.field, horizon);
                            return Ok(schedule);
                        };
                        now = next.and_time(self.day_start);
                        continue;
                    }

                    let mut today = today;
                    let worked = remaining.min(today.hours_left);
                    #[allow(clippy::cast_precision_loss)]
                    let elapsed = worked / today.workers as f64;
                    now += hours_delta(elapsed);
                    remaining -= worked;
                    today.hours_left -= worked;
                    day = Some(today);
                }

                let field_end = round_to_nearest_hour(now);
                debug!(
                    "Finished field {} (group {}, round {}) on {}",
                    item.field, group, item.harvest_round, field_end
                );
                schedule.entries.push(ScheduledField {
                    field: item.field.clone(),
                    variety: item.variety.clone(),
                    group: group.to_string(),
                    harvest_round: item.harvest_round,
                    start: field_start,
                    end: field_end,
                    hours: item.hours,
                });
                now = field_end;
            }

            previous_end = Some(now);
        }

        Ok(schedule)
    }

    /// Groups in scheduling order, each with its items in input order.
    /// Groups without a start date are reported and left out.
    fn ordered_groups<'a>(
        &self,
        items: &'a [WorkItem],
        schedule: &mut Schedule,
    ) -> Vec<(&'a str, Vec<&'a WorkItem>)> {
        let mut groups: Vec<(&'a str, Vec<&'a WorkItem>)> = Vec::new();
        for item in items {
            match groups.iter_mut().find(|(g, _)| *g == item.group) {
                Some((_, members)) => members.push(item),
                None => groups.push((item.group.as_str(), vec![item])),
            }
        }

        groups.retain(|(group, _)| {
            if self.start_dates.contains_key(*group) {
                true
            } else {
                warn!("No start date specified for group '{}', skipping", group);
                schedule.warnings.push(PlanWarning::MissingStartDate {
                    group: (*group).to_string(),
                });
                false
            }
        });

        groups.sort_by(|(a, _), (b, _)| {
            let key_a = (self.start_dates.get(*a), *a);
            let key_b = (self.start_dates.get(*b), *b);
            key_a.cmp(&key_b)
        });
        groups
    }

    fn horizon_for(&self, start_date: NaiveDate) -> NaiveDate {
        self.horizon.unwrap_or_else(|| {
            NaiveDate::from_ymd_opt(start_date.year(), 12, 31).unwrap_or(start_date)
        })
    }
}

fn horizon_exceeded(schedule: &mut Schedule, group: &str, field: &str, horizon: NaiveDate) {
    warn!(
        "Could not finish field '{}' in group '{}' by {}",
        field, group, horizon
    );
    schedule.warnings.push(PlanWarning::HorizonExceeded {
        group: group.to_string(),
        field: field.to_string(),
        horizon,
    });
}

#[allow(clippy::cast_possible_truncation)]
fn hours_delta(hours: f64) -> TimeDelta {
    TimeDelta::microseconds((hours * MICROS_PER_HOUR).round() as i64)
}

/// Round to the nearest full hour; half hours round up.
#[must_use]
pub fn round_to_nearest_hour(t: NaiveDateTime) -> NaiveDateTime {
    let hour = NaiveTime::from_hms_opt(t.hour(), 0, 0).unwrap_or_default();
    let floor = t.date().and_time(hour);
    if t - floor >= TimeDelta::minutes(30) {
        floor + TimeDelta::hours(1)
    } else {
        floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Same capacity every day except the listed rest days.
    struct FixedCapacity {
        hours: f64,
        workers: usize,
        rest: Vec<NaiveDate>,
    }

    impl FixedCapacity {
        fn new(hours: f64, workers: usize) -> Self {
            Self {
                hours,
                workers,
                rest: Vec::new(),
            }
        }

        fn resting(mut self, day: NaiveDate) -> Self {
            self.rest.push(day);
            self
        }
    }

    impl Capacity for FixedCapacity {
        fn daily_hours(&self, date: NaiveDate) -> f64 {
            if self.rest.contains(&date) {
                0.0
            } else {
                self.hours
            }
        }

        fn daily_workers(&self, date: NaiveDate) -> usize {
            if self.rest.contains(&date) {
                0
            } else {
                self.workers
            }
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        date(d).and_hms_opt(h, m, 0).unwrap()
    }

    fn starts(groups: &[(&str, u32)]) -> BTreeMap<String, NaiveDate> {
        groups
            .iter()
            .map(|(g, d)| ((*g).to_string(), date(*d)))
            .collect()
    }

    #[test]
    fn test_round_to_nearest_hour() {
        assert_eq!(round_to_nearest_hour(at(1, 10, 0)), at(1, 10, 0));
        assert_eq!(round_to_nearest_hour(at(1, 10, 29)), at(1, 10, 0));
        assert_eq!(round_to_nearest_hour(at(1, 10, 30)), at(1, 11, 0));
        assert_eq!(round_to_nearest_hour(at(1, 23, 45)), at(2, 0, 0));

        let almost = date(1).and_hms_opt(10, 29, 59).unwrap();
        assert_eq!(round_to_nearest_hour(almost), at(1, 10, 0));
    }

    #[test]
    fn test_workers_share_hours() {
        let scheduler = GroupScheduler::new(starts(&[("Gala", 1)]));
        let items = vec![
            WorkItem::new("A", "Gala", "Gala", 8.0),
            WorkItem::new("B", "Gala", "Gala", 12.0),
        ];
        // two workers, eight hours each
        let schedule = scheduler
            .schedule(&items, &FixedCapacity::new(16.0, 2))
            .unwrap();

        assert_eq!(schedule.entries.len(), 2);
        assert_eq!(schedule.entries[0].start, at(1, 8, 0));
        assert_eq!(schedule.entries[0].end, at(1, 12, 0));
        assert_eq!(schedule.entries[1].start, at(1, 12, 0));
        assert_eq!(schedule.entries[1].end, at(2, 10, 0));
        assert!(schedule.is_complete());
    }

    #[test]
    fn test_end_rounded_and_next_round_starts_there() {
        let scheduler = GroupScheduler::new(starts(&[("Gala", 1)]));
        let items = vec![
            WorkItem::new("A", "Gala", "Gala", 2.5),
            WorkItem::new("A", "Gala", "Gala", 1.25).with_round(2),
        ];
        let schedule = scheduler
            .schedule(&items, &FixedCapacity::new(8.0, 1))
            .unwrap();

        assert_eq!(schedule.entries[0].end, at(1, 11, 0));
        assert_eq!(schedule.entries[1].start, at(1, 11, 0));
        assert_eq!(schedule.entries[1].end, at(1, 12, 0));
        assert_eq!(schedule.entries[1].harvest_round, 2);
    }

    #[test]
    fn test_rest_days_skipped() {
        let scheduler = GroupScheduler::new(starts(&[("Gala", 1)]));
        let items = vec![WorkItem::new("A", "Gala", "Gala", 12.0)];
        let capacity = FixedCapacity::new(8.0, 1).resting(date(2));

        let schedule = scheduler.schedule(&items, &capacity).unwrap();
        assert_eq!(schedule.entries[0].start, at(1, 8, 0));
        assert_eq!(schedule.entries[0].end, at(3, 12, 0));
    }

    #[test]
    fn test_groups_ordered_by_start_date() {
        let scheduler = GroupScheduler::new(starts(&[("late", 5), ("early", 1)]));
        let items = vec![
            WorkItem::new("L", "Topaz", "late", 4.0),
            WorkItem::new("E", "Gala", "early", 4.0),
        ];
        let schedule = scheduler
            .schedule(&items, &FixedCapacity::new(8.0, 1))
            .unwrap();

        assert_eq!(schedule.entries[0].group, "early");
        assert_eq!(schedule.entries[0].start, at(1, 8, 0));
        assert_eq!(schedule.entries[1].group, "late");
        assert_eq!(schedule.entries[1].start, at(5, 8, 0));
    }

    #[test]
    fn test_groups_never_overlap() {
        let scheduler = GroupScheduler::new(starts(&[("early", 1), ("late", 5)]));
        let items = vec![
            WorkItem::new("E", "Gala", "early", 100.0),
            WorkItem::new("L", "Topaz", "late", 8.0),
        ];
        let schedule = scheduler
            .schedule(&items, &FixedCapacity::new(8.0, 1))
            .unwrap();

        // twelve full days plus half of the thirteenth
        assert_eq!(schedule.entries[0].end, at(13, 12, 0));
        // late group waits, then uses the rest of that day's capacity
        assert_eq!(schedule.entries[1].start, at(13, 12, 0));
        assert_eq!(schedule.entries[1].end, at(14, 12, 0));
    }

    #[test]
    fn test_items_keep_input_order_within_group() {
        let scheduler = GroupScheduler::new(starts(&[("Gala", 1)]));
        let items = vec![
            WorkItem::new("Z", "Gala", "Gala", 1.0),
            WorkItem::new("A", "Gala", "Gala", 1.0),
        ];
        let schedule = scheduler
            .schedule(&items, &FixedCapacity::new(8.0, 1))
            .unwrap();

        let fields: Vec<&str> = schedule.entries.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["Z", "A"]);
    }

    #[test]
    fn test_missing_start_date_skips_group() {
        let scheduler = GroupScheduler::new(starts(&[("Gala", 1)]));
        let items = vec![
            WorkItem::new("X", "Topaz", "Topaz", 4.0),
            WorkItem::new("A", "Gala", "Gala", 4.0),
        ];
        let schedule = scheduler
            .schedule(&items, &FixedCapacity::new(8.0, 1))
            .unwrap();

        assert_eq!(schedule.entries.len(), 1);
        assert_eq!(schedule.entries[0].field, "A");
        assert_eq!(
            schedule.warnings,
            vec![PlanWarning::MissingStartDate {
                group: "Topaz".to_string()
            }]
        );
        assert!(schedule.is_complete());
    }

    #[test]
    fn test_horizon_returns_partial_schedule() {
        let scheduler = GroupScheduler::new(starts(&[("Gala", 1)])).with_horizon(Some(date(2)));
        let items = vec![
            WorkItem::new("A", "Gala", "Gala", 4.0),
            WorkItem::new("B", "Gala", "Gala", 24.0),
            WorkItem::new("C", "Gala", "Gala", 1.0),
        ];
        let schedule = scheduler
            .schedule(&items, &FixedCapacity::new(8.0, 1))
            .unwrap();

        assert_eq!(schedule.entries.len(), 1);
        assert!(!schedule.is_complete());
        assert!(matches!(
            &schedule.warnings[0],
            PlanWarning::HorizonExceeded { field, .. } if field == "B"
        ));
    }

    #[test]
    fn test_group_starting_after_horizon() {
        let scheduler = GroupScheduler::new(starts(&[("Gala", 5)])).with_horizon(Some(date(2)));
        let items = vec![WorkItem::new("A", "Gala", "Gala", 4.0)];
        let schedule = scheduler
            .schedule(&items, &FixedCapacity::new(8.0, 1))
            .unwrap();

        assert!(schedule.entries.is_empty());
        assert!(!schedule.is_complete());
        assert_eq!(
            schedule.warnings,
            vec![PlanWarning::HorizonExceeded {
                group: "Gala".to_string(),
                field: "A".to_string(),
                horizon: date(2),
            }]
        );
    }

    #[test]
    fn test_later_group_after_horizon_keeps_earlier_entries() {
        let scheduler = GroupScheduler::new(starts(&[("early", 1), ("late", 8)]))
            .with_horizon(Some(date(5)));
        let items = vec![
            WorkItem::new("E", "Gala", "early", 8.0),
            WorkItem::new("L", "Topaz", "late", 0.0),
        ];
        let schedule = scheduler
            .schedule(&items, &FixedCapacity::new(8.0, 1))
            .unwrap();

        assert_eq!(schedule.entries.len(), 1);
        assert_eq!(schedule.entries[0].field, "E");
        assert!(matches!(
            &schedule.warnings[0],
            PlanWarning::HorizonExceeded { group, field, .. } if group == "late" && field == "L"
        ));
    }

    #[test]
    fn test_default_horizon_is_end_of_year() {
        let scheduler = GroupScheduler::new(
            [("Gala".to_string(), NaiveDate::from_ymd_opt(2025, 12, 30).unwrap())]
                .into_iter()
                .collect(),
        );
        let items = vec![WorkItem::new("A", "Gala", "Gala", 24.0)];
        let schedule = scheduler
            .schedule(&items, &FixedCapacity::new(8.0, 1))
            .unwrap();

        assert!(schedule.entries.is_empty());
        assert!(matches!(
            schedule.warnings[0],
            PlanWarning::HorizonExceeded { horizon, .. }
                if horizon == NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        ));
    }

    #[test]
    fn test_no_capacity_at_all() {
        let scheduler = GroupScheduler::new(starts(&[("Gala", 1)])).with_horizon(Some(date(10)));
        let items = vec![WorkItem::new("A", "Gala", "Gala", 1.0)];
        let schedule = scheduler
            .schedule(&items, &FixedCapacity::new(0.0, 0))
            .unwrap();

        assert!(schedule.entries.is_empty());
        assert!(!schedule.is_complete());
    }

    #[test]
    fn test_zero_hour_item() {
        let scheduler = GroupScheduler::new(starts(&[("Gala", 1)]));
        let items = vec![WorkItem::new("A", "Gala", "Gala", 0.0)];
        let schedule = scheduler
            .schedule(&items, &FixedCapacity::new(8.0, 1))
            .unwrap();

        assert_eq!(schedule.entries[0].start, at(1, 8, 0));
        assert_eq!(schedule.entries[0].end, at(1, 8, 0));
    }

    #[test]
    fn test_invalid_hours_rejected() {
        let scheduler = GroupScheduler::new(starts(&[("Gala", 1)]));
        for hours in [-1.0, f64::NAN, f64::INFINITY] {
            let items = vec![WorkItem::new("A", "Gala", "Gala", hours)];
            let err = scheduler
                .schedule(&items, &FixedCapacity::new(8.0, 1))
                .unwrap_err();
            assert!(matches!(err, Error::InvalidHours { .. }));
        }
    }

    #[test]
    fn test_custom_day_start() {
        let scheduler = GroupScheduler::uniform(date(1), ["Gala"])
            .with_day_start(NaiveTime::from_hms_opt(6, 0, 0).unwrap());
        let items = vec![WorkItem::new("A", "Gala", "Gala", 10.0)];
        let schedule = scheduler
            .schedule(&items, &FixedCapacity::new(8.0, 1))
            .unwrap();

        assert_eq!(schedule.entries[0].start, at(1, 6, 0));
        assert_eq!(schedule.entries[0].end, at(2, 8, 0));
    }

    #[test]
    fn test_empty_input() {
        let scheduler = GroupScheduler::new(BTreeMap::new());
        let schedule = scheduler
            .schedule(&[], &FixedCapacity::new(8.0, 1))
            .unwrap();
        assert_eq!(schedule, Schedule::new());
    }
}
