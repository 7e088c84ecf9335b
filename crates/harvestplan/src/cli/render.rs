//! Text rendering of command results.

use std::io::Write;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use tabled::{Table, Tabled};

use super::OutputFormat;
use crate::error::Result;
use crate::estimate::{Encoding, Estimates, Estimator, Scores, ValidationReport};
use crate::fields::FieldCollection;
use crate::planner::Schedule;
use crate::storage::{SavedPlan, StorageStats};
use crate::workforce::Workforce;

const TIME_FORMAT: &str = "%a %Y-%m-%d %H:%M";

fn time(t: NaiveDateTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

fn duration(d: TimeDelta) -> String {
    let hours = d.num_hours();
    if hours >= 24 {
        format!("{}d {}h", hours / 24, hours % 24)
    } else {
        format!("{hours}h")
    }
}

/// `n` followed by `noun`, with an `s` unless `n` is one.
fn count(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

fn hours(h: f64) -> String {
    format!("{h:.1}")
}

#[derive(Debug, Tabled)]
struct EntryRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Variety")]
    variety: String,
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Round")]
    round: u32,
    #[tabled(rename = "Hours")]
    hours: String,
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
}

#[derive(Debug, Tabled)]
struct GroupRow {
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
    #[tabled(rename = "Rounds")]
    rounds: usize,
    #[tabled(rename = "Hours")]
    hours: String,
}

#[derive(Debug, Tabled)]
struct WorkerRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "From")]
    start: NaiveDate,
    #[tabled(rename = "Until")]
    end: NaiveDate,
    #[tabled(rename = "h/day")]
    hours: String,
    #[tabled(rename = "Days")]
    days: String,
    #[tabled(rename = "Payment")]
    payment: String,
}

#[derive(Debug, Tabled)]
struct CapacityRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Workers")]
    workers: usize,
    #[tabled(rename = "Hours")]
    hours: String,
}

#[derive(Debug, Tabled)]
struct FieldRow {
    #[tabled(rename = "Order")]
    order: String,
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Variety")]
    variety: String,
    #[tabled(rename = "Rounds")]
    rounds: u32,
    #[tabled(rename = "Hours/round")]
    hours: String,
}

#[derive(Debug, Tabled)]
struct EstimateRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Variety")]
    variety: String,
    #[tabled(rename = "Hours")]
    hours: String,
}

#[derive(Debug, Tabled)]
struct ScoreRow {
    #[tabled(rename = "Split")]
    split: String,
    #[tabled(rename = "R²")]
    r2: String,
    #[tabled(rename = "MSE")]
    mse: String,
    #[tabled(rename = "MAE")]
    mae: String,
}

#[derive(Debug, Tabled)]
struct TermRow {
    #[tabled(rename = "Term")]
    term: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Debug, Tabled)]
struct PlanRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Year")]
    year: i32,
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Rounds")]
    rounds: usize,
    #[tabled(rename = "Hours")]
    hours: String,
    #[tabled(rename = "Until")]
    until: String,
    #[tabled(rename = "Fingerprint")]
    fingerprint: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Label")]
    label: String,
}

/// Write a schedule in the requested format.
///
/// # Errors
///
/// Returns an error if writing or JSON serialization fails.
pub fn schedule(out: &mut impl Write, schedule: &Schedule, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(schedule)?)?;
            return Ok(());
        }
        OutputFormat::Plain => {
            for e in &schedule.entries {
                writeln!(
                    out,
                    "{} - {}  {} ({}) round {}  {:.1} h",
                    time(e.start),
                    time(e.end),
                    e.field,
                    e.variety,
                    e.harvest_round,
                    e.hours
                )?;
            }
        }
        OutputFormat::Table => schedule_table(out, schedule)?,
    }

    for warning in &schedule.warnings {
        writeln!(out, "warning: {warning}")?;
    }
    Ok(())
}

fn schedule_table(out: &mut impl Write, schedule: &Schedule) -> Result<()> {
    if schedule.entries.is_empty() {
        writeln!(out, "Nothing scheduled.")?;
        return Ok(());
    }

    let rows = schedule.entries.iter().map(|e| EntryRow {
        field: e.field.clone(),
        variety: e.variety.clone(),
        group: e.group.clone(),
        round: e.harvest_round,
        hours: hours(e.hours),
        start: time(e.start),
        end: time(e.end),
    });
    writeln!(out, "{}", Table::new(rows))?;

    writeln!(out)?;
    writeln!(out, "Groups")?;
    let groups = schedule.group_spans().into_iter().map(|span| GroupRow {
        group: span.group,
        start: time(span.start),
        end: time(span.end),
        rounds: span.rounds,
        hours: hours(span.hours),
    });
    writeln!(out, "{}", Table::new(groups))?;

    writeln!(out)?;
    writeln!(
        out,
        "Total: {}, {:.1} h, makespan {}",
        count(schedule.entries.len(), "round"),
        schedule.total_hours(),
        duration(schedule.makespan())
    )?;
    if !schedule.is_complete() {
        writeln!(out, "Schedule is INCOMPLETE.")?;
    }
    Ok(())
}

/// Write the workers of a season.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn workforce(out: &mut impl Write, workforce: &Workforce) -> Result<()> {
    if workforce.is_empty() {
        writeln!(out, "No workers.")?;
        return Ok(());
    }
    let rows = workforce.into_iter().map(|w| WorkerRow {
        name: w.name.clone(),
        start: w.start_date,
        end: w.end_date,
        hours: hours(w.work_hours),
        days: w
            .work_days
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(","),
        payment: w.payment.map_or_else(String::new, |p| format!("{p:.2}")),
    });
    writeln!(out, "{}", Table::new(rows))?;

    let total = workforce.total_payment();
    if total > 0.0 {
        writeln!(out, "Total payment: {total:.2}")?;
    }
    Ok(())
}

/// Write daily capacity for `days` days from `from`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn capacity(out: &mut impl Write, workforce: &Workforce, from: NaiveDate, days: u32) -> Result<()> {
    let rows = from.iter_days().take(days as usize).map(|date| CapacityRow {
        date: date.format("%a %Y-%m-%d").to_string(),
        workers: workforce.daily_worker_count(date),
        hours: hours(workforce.daily_work_hours(date)),
    });
    writeln!(out, "{}", Table::new(rows))?;
    Ok(())
}

/// Write the fields of a season in schedule order.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn fields(out: &mut impl Write, fields: &FieldCollection) -> Result<()> {
    if fields.is_empty() {
        writeln!(out, "No fields.")?;
        return Ok(());
    }
    let rows = fields.in_schedule_order().into_iter().map(|f| FieldRow {
        order: f.order.map_or_else(|| "-".to_string(), |o| o.to_string()),
        field: f.field.clone(),
        variety: f.variety.clone(),
        rounds: f.harvest_rounds,
        hours: f.hours.map_or_else(|| "estimate".to_string(), hours),
    });
    writeln!(out, "{}", Table::new(rows))?;
    Ok(())
}

/// Write a validation report and the fitted model.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn report(out: &mut impl Write, estimator: &Estimator, report: &ValidationReport) -> Result<()> {
    writeln!(
        out,
        "Model: {} for '{}' on {}",
        report.model,
        estimator.target(),
        estimator.predictors().join(", ")
    )?;
    writeln!(
        out,
        "Validation: {} ({}, {} dropped)",
        report.method,
        count(report.samples, "row"),
        report.dropped
    )?;
    if !report.groups.is_empty() {
        writeln!(out, "Groups: {}", report.groups.join(", "))?;
    }

    let r2 = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.3}"));
    let mut scores = Vec::new();
    match &report.scores {
        Scores::Split { train, test } => {
            for (split, m) in [("train", train), ("test", test)] {
                scores.push(ScoreRow {
                    split: split.to_string(),
                    r2: r2(m.r2),
                    mse: format!("{:.2}", m.mse),
                    mae: format!("{:.2}", m.mae),
                });
            }
        }
        Scores::Folds { folds, summary } => {
            for (i, fold) in folds.iter().enumerate() {
                scores.push(ScoreRow {
                    split: format!("fold {}", i + 1),
                    r2: r2(fold.r2),
                    mse: format!("{:.2}", fold.mse),
                    mae: format!("{:.2}", fold.mae),
                });
            }
            scores.push(ScoreRow {
                split: "mean ± std".to_string(),
                r2: summary.r2.map_or_else(
                    || "n/a".to_string(),
                    |s| format!("{:.3} ± {:.3}", s.mean, s.std),
                ),
                mse: format!("{:.2} ± {:.2}", summary.mse.mean, summary.mse.std),
                mae: format!("{:.2} ± {:.2}", summary.mae.mean, summary.mae.std),
            });
        }
    }
    writeln!(out, "{}", Table::new(scores))?;

    let mut terms = Vec::new();
    if let Some(linear) = estimator.linear() {
        terms.push(TermRow {
            term: "intercept".to_string(),
            value: format!("{:.3}", linear.intercept),
        });
        let mut coefficients = linear.coefficients.iter();
        for encoding in estimator.encodings() {
            match encoding {
                Encoding::Categorical { column, levels, .. } => {
                    for level in levels {
                        if let Some(c) = coefficients.next() {
                            terms.push(TermRow {
                                term: format!("{column}={level}"),
                                value: format!("{c:.3}"),
                            });
                        }
                    }
                }
                Encoding::Numeric { column, .. } => {
                    if let Some(c) = coefficients.next() {
                        terms.push(TermRow {
                            term: format!("{column} (standardized)"),
                            value: format!("{c:.3}"),
                        });
                    }
                }
            }
        }
    } else {
        writeln!(out, "Feature importance")?;
        terms.extend(report.feature_importance.iter().map(|f| TermRow {
            term: f.predictor.clone(),
            value: format!("{:.3}", f.importance),
        }));
    }
    if !terms.is_empty() {
        writeln!(out, "{}", Table::new(terms))?;
    }
    Ok(())
}

/// Write estimated hours per field.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn estimates(out: &mut impl Write, estimates: &Estimates) -> Result<()> {
    if estimates.is_empty() {
        writeln!(out, "No estimates.")?;
        return Ok(());
    }
    let rows = estimates.iter().map(|((field, variety), h)| EstimateRow {
        field: field.clone(),
        variety: variety.clone(),
        hours: hours(*h),
    });
    writeln!(out, "{}", Table::new(rows))?;
    Ok(())
}

/// Write a list of archived plans.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn plans(out: &mut impl Write, plans: &[SavedPlan]) -> Result<()> {
    if plans.is_empty() {
        writeln!(out, "No archived plans.")?;
        return Ok(());
    }
    let rows = plans.iter().map(|plan| PlanRow {
        id: plan.id.unwrap_or_default(),
        created: plan.created_at.format("%Y-%m-%d %H:%M").to_string(),
        year: plan.year,
        task: plan.task.clone(),
        rounds: plan.entry_count(),
        hours: hours(plan.schedule.total_hours()),
        until: plan.finish().map_or_else(|| "-".to_string(), time),
        fingerprint: plan.short_fingerprint().to_string(),
        status: if plan.schedule.is_complete() {
            "complete"
        } else {
            "incomplete"
        }
        .to_string(),
        label: plan.label.clone().unwrap_or_default(),
    });
    writeln!(out, "{}", Table::new(rows))?;
    Ok(())
}

/// Write archive statistics.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn stats(out: &mut impl Write, stats: &StorageStats) -> Result<()> {
    writeln!(out, "Plans:    {}", stats.total_plans)?;
    for (year, count) in &stats.plans_per_year {
        writeln!(out, "  {year}:   {count}")?;
    }
    if let Some(oldest) = stats.oldest_plan {
        writeln!(out, "Oldest:   {}", oldest.format("%Y-%m-%d %H:%M"))?;
    }
    if let Some(newest) = stats.newest_plan {
        writeln!(out, "Newest:   {}", newest.format("%Y-%m-%d %H:%M"))?;
    }
    #[allow(clippy::cast_precision_loss)]
    let kib = stats.db_size_bytes as f64 / 1024.0;
    writeln!(out, "Size:     {kib:.1} KiB")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Field;
    use crate::planner::{PlanWarning, ScheduledField};
    use crate::workforce::Worker;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 9, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn entry(field: &str, variety: &str, group: &str, start: NaiveDateTime, end: NaiveDateTime) -> ScheduledField {
        ScheduledField {
            field: field.to_string(),
            variety: variety.to_string(),
            group: group.to_string(),
            harvest_round: 2,
            start,
            end,
            hours: 24.0,
        }
    }

    fn sample() -> Schedule {
        Schedule {
            entries: vec![entry("Wiese 1", "Gala", "früh", at(1, 8), at(2, 12))],
            warnings: vec![PlanWarning::MissingStartDate {
                group: "spät".to_string(),
            }],
        }
    }

    fn render(format: OutputFormat) -> String {
        let mut out = Vec::new();
        schedule(&mut out, &sample(), format).unwrap();
        String::from_utf8(out).unwrap()
    }

    /// Lines of the first table block in `text`.
    fn first_table(text: &str) -> Vec<&str> {
        text.lines().take_while(|line| !line.is_empty()).collect()
    }

    fn assert_aligned(lines: &[&str]) {
        let width = lines[0].chars().count();
        for line in lines {
            assert_eq!(line.chars().count(), width, "misaligned line: {line}");
        }
    }

    #[test]
    fn test_schedule_plain() {
        let text = render(OutputFormat::Plain);
        assert!(text.contains("Mon 2025-09-01 08:00 - Tue 2025-09-02 12:00"));
        assert!(text.contains("Wiese 1 (Gala) round 2"));
        assert!(text.contains("warning: no start date for group 'spät'"));
    }

    #[test]
    fn test_schedule_table() {
        let text = render(OutputFormat::Table);
        let header = text.lines().nth(1).unwrap();
        assert!(header.contains("Field"));
        assert!(header.contains("Variety"));
        assert!(text.contains("Groups"));
        assert!(text.contains("Total: 1 round, 24.0 h, makespan 1d 4h"));
        assert!(!text.contains("1 rounds"));
        assert!(!text.contains("INCOMPLETE"));
    }

    #[test]
    fn test_schedule_table_long_names_stay_aligned() {
        let schedule = Schedule {
            entries: vec![
                entry("A", "Gala", "früh", at(1, 8), at(1, 16)),
                entry(
                    "Obstwiese hinter dem alten Bahnhof",
                    "Roter Berlepsch Spätlese",
                    "Sehr späte Lagersorten",
                    at(2, 8),
                    at(3, 12),
                ),
            ],
            warnings: Vec::new(),
        };
        let mut out = Vec::new();
        super::schedule(&mut out, &schedule, OutputFormat::Table).unwrap();
        let text = String::from_utf8(out).unwrap();

        let entries = first_table(&text);
        assert_aligned(&entries);
        assert!(entries.iter().any(|l| l.contains("Roter Berlepsch Spätlese")));

        let groups: Vec<&str> = text
            .lines()
            .skip_while(|line| *line != "Groups")
            .skip(1)
            .take_while(|line| !line.is_empty())
            .collect();
        assert_aligned(&groups);
        assert!(groups.iter().any(|l| l.contains("Sehr späte Lagersorten")));
        assert!(text.contains("Total: 2 rounds"));
    }

    #[test]
    fn test_schedule_json() {
        let text = render(OutputFormat::Json);
        let parsed: Schedule = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_empty_schedule_table() {
        let mut out = Vec::new();
        schedule(&mut out, &Schedule::new(), OutputFormat::Table).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Nothing scheduled.\n");
    }

    #[test]
    fn test_workforce_table() {
        let crew = Workforce::from_workers([
            Worker::new(
                "Gabriel",
                NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(),
                9.0,
            )
            .with_payment(1200.0),
            Worker::new(
                "Maximiliane Wertheimer-Schulz",
                NaiveDate::from_ymd_opt(2025, 9, 15).unwrap(),
                NaiveDate::from_ymd_opt(2025, 10, 15).unwrap(),
                8.0,
            ),
        ])
        .unwrap();

        let mut out = Vec::new();
        workforce(&mut out, &crew).unwrap();
        let text = String::from_utf8(out).unwrap();

        let table = first_table(&text);
        assert_aligned(&table[..table.len() - 1]);
        assert!(text.contains("2025-09-01"));
        assert!(text.contains("1200.00"));
        assert!(text.ends_with("Total payment: 1200.00\n"));
    }

    #[test]
    fn test_fields_table() {
        let mut collection = FieldCollection::new();
        collection
            .add(Field::new("Wiese 1", "Gala").with_order(1).with_hours(12.0))
            .unwrap();
        collection
            .add(Field::new("Am langen Graben beim Weiher", "Topaz"))
            .unwrap();

        let mut out = Vec::new();
        fields(&mut out, &collection).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_aligned(&first_table(&text));
        assert!(text.contains("12.0"));
        assert!(text.contains("estimate"));
        let wiese = text.find("Wiese 1").unwrap();
        let graben = text.find("Am langen Graben").unwrap();
        assert!(wiese < graben);
    }

    #[test]
    fn test_capacity() {
        let start = NaiveDate::from_ymd_opt(2025, 9, 6).unwrap();
        let crew = Workforce::from_workers([Worker::new(
            "Gabriel",
            start,
            NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(),
            9.0,
        )])
        .unwrap();

        let mut out = Vec::new();
        capacity(&mut out, &crew, start, 2).unwrap();
        let text = String::from_utf8(out).unwrap();

        let saturday = text.lines().find(|l| l.contains("Sat 2025-09-06")).unwrap();
        assert!(saturday.contains("| 1 "));
        assert!(saturday.contains("9.0"));
        let sunday = text.lines().find(|l| l.contains("Sun 2025-09-07")).unwrap();
        assert!(sunday.contains("| 0 "));
        assert!(sunday.contains("0.0"));
    }

    #[test]
    fn test_count() {
        assert_eq!(count(0, "round"), "0 rounds");
        assert_eq!(count(1, "round"), "1 round");
        assert_eq!(count(3, "round"), "3 rounds");
    }

    #[test]
    fn test_duration() {
        assert_eq!(duration(TimeDelta::hours(5)), "5h");
        assert_eq!(duration(TimeDelta::hours(50)), "2d 2h");
    }
}
