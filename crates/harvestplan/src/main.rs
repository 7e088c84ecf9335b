//! `harvestplan` - CLI for the harvest labor planner
//!
//! This binary plans a season's harvest from its field and workforce files,
//! edits those files, evaluates the hour estimation model and browses the
//! archive of saved plans.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use harvestplan::cli::{
    render, Cli, Command, ConfigCommand, FieldsCommand, HistoryCommand, ModelCommand,
    PlanCommand, WorkforceCommand,
};
use harvestplan::estimate::{self, CvMethod, Estimator, ModelKind};
use harvestplan::{init_logging, Config, Field, FieldCollection, Planner, SavedPlan, Storage};
use harvestplan::{Worker, Workforce};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config_path = cli.config_path();
    let load = || load_config(&config_path);

    match cli.command {
        Command::Plan(cmd) => handle_plan(&load()?, cmd),
        Command::Workforce(cmd) => handle_workforce(&load()?, cmd),
        Command::Fields(cmd) => handle_fields(&load()?, cmd),
        Command::Model(cmd) => handle_model(&load()?, cmd),
        Command::History(cmd) => handle_history(&load()?, cmd),
        Command::Years => handle_years(&load()?),
        Command::Config(cmd) => handle_config(&config_path, cmd),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    Config::load_from(Some(path.to_path_buf()))
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

fn handle_plan(config: &Config, cmd: PlanCommand) -> Result<()> {
    let year = cmd.year.unwrap_or(config.year);
    let task = cmd.task.unwrap_or_else(|| config.task.clone());

    let planner = cmd
        .starts
        .into_iter()
        .fold(Planner::new(config), |planner, (group, date)| {
            planner.with_start(group, date)
        });
    let schedule = planner
        .plan_season(year, &task)
        .with_context(|| format!("failed to plan {task} {year}"))?;

    render::schedule(&mut io::stdout().lock(), &schedule, cmd.format)?;

    if cmd.save {
        let mut plan = SavedPlan::new(year, &task, schedule)?;
        if let Some(label) = cmd.label {
            plan = plan.with_label(label);
        }

        let storage = open_storage(config)?;
        match storage.insert(&plan)? {
            Some(id) => eprintln!("Saved plan #{id} ({})", plan.short_fingerprint()),
            None => eprintln!("Identical plan already archived; not saved again"),
        }
        let pruned = storage.prune_keep_recent(config.storage.max_plans)?;
        if pruned > 0 {
            info!("Pruned {} old plans", pruned);
        }
    }
    Ok(())
}

fn handle_workforce(config: &Config, cmd: WorkforceCommand) -> Result<()> {
    match cmd {
        WorkforceCommand::List { year, json } => {
            let workforce = load_workforce(config, year)?;
            if json {
                let workers: Vec<&Worker> = workforce.iter().collect();
                println!("{}", serde_json::to_string_pretty(&workers)?);
            } else {
                render::workforce(&mut io::stdout().lock(), &workforce)?;
            }
        }
        WorkforceCommand::Add {
            year,
            name,
            start,
            end,
            hours,
            days,
            payment,
        } => {
            let mut workforce = load_workforce(config, year)?;
            let mut worker = Worker::new(&name, start, end, hours);
            if !days.is_empty() {
                worker = worker.with_days(days);
            }
            if let Some(payment) = payment {
                worker = worker.with_payment(payment);
            }
            workforce.add(worker)?;
            save_workforce(config, year, &workforce)?;
            println!("Added worker '{name}'");
        }
        WorkforceCommand::Update {
            year,
            name,
            rename,
            start,
            end,
            hours,
            days,
            payment,
        } => {
            let mut workforce = load_workforce(config, year)?;
            let Some(current) = workforce.get(&name) else {
                bail!("worker '{name}' not found");
            };
            let mut worker = current.clone();
            if let Some(rename) = rename {
                worker.name = rename;
            }
            if let Some(start) = start {
                worker.start_date = start;
            }
            if let Some(end) = end {
                worker.end_date = end;
            }
            if let Some(hours) = hours {
                worker.work_hours = hours;
            }
            if !days.is_empty() {
                worker = worker.with_days(days);
            }
            if payment.is_some() {
                worker.payment = payment;
            }
            workforce.update(&name, worker)?;
            save_workforce(config, year, &workforce)?;
            println!("Updated worker '{name}'");
        }
        WorkforceCommand::Remove { year, name } => {
            let mut workforce = load_workforce(config, year)?;
            workforce.remove(&name)?;
            save_workforce(config, year, &workforce)?;
            println!("Removed worker '{name}'");
        }
        WorkforceCommand::Capacity { year, date, days } => {
            let workforce = load_workforce(config, year)?;
            render::capacity(&mut io::stdout().lock(), &workforce, date, days)?;
        }
    }
    Ok(())
}

fn load_workforce(config: &Config, year: Option<i32>) -> Result<Workforce> {
    let path = config.workforce_path(year.unwrap_or(config.year));
    Workforce::load(&path).with_context(|| format!("failed to load {}", path.display()))
}

fn save_workforce(config: &Config, year: Option<i32>, workforce: &Workforce) -> Result<()> {
    let path = config.workforce_path(year.unwrap_or(config.year));
    workforce
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn handle_fields(config: &Config, cmd: FieldsCommand) -> Result<()> {
    match cmd {
        FieldsCommand::List { year, json } => {
            let fields = load_fields(config, year)?;
            if json {
                let list: Vec<&Field> = fields.in_schedule_order();
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else {
                render::fields(&mut io::stdout().lock(), &fields)?;
            }
        }
        FieldsCommand::Add {
            year,
            field,
            variety,
            rounds,
            order,
            hours,
        } => {
            let mut fields = load_fields(config, year)?;
            let mut new = Field::new(&field, &variety).with_rounds(rounds);
            if let Some(order) = order {
                new = new.with_order(order);
            }
            if let Some(hours) = hours {
                new = new.with_hours(hours);
            }
            fields.add(new)?;
            save_fields(config, year, &fields)?;
            println!("Added field '{field}' ({variety})");
        }
        FieldsCommand::Update {
            year,
            field,
            variety,
            rename,
            new_variety,
            rounds,
            order,
            hours,
            estimate,
        } => {
            let mut fields = load_fields(config, year)?;
            let Some(current) = fields.get(&field, &variety) else {
                bail!("field '{field}' ({variety}) not found");
            };
            let mut updated = current.clone();
            if let Some(rename) = rename {
                updated.field = rename;
            }
            if let Some(new_variety) = new_variety {
                updated.variety = new_variety;
            }
            if let Some(rounds) = rounds {
                updated.harvest_rounds = rounds;
            }
            if order.is_some() {
                updated.order = order;
            }
            if estimate {
                updated.hours = None;
            } else if hours.is_some() {
                updated.hours = hours;
            }
            fields.update(&field, &variety, updated)?;
            save_fields(config, year, &fields)?;
            println!("Updated field '{field}' ({variety})");
        }
        FieldsCommand::Remove {
            year,
            field,
            variety,
        } => {
            let mut fields = load_fields(config, year)?;
            fields.remove(&field, &variety)?;
            save_fields(config, year, &fields)?;
            println!("Removed field '{field}' ({variety})");
        }
    }
    Ok(())
}

fn load_fields(config: &Config, year: Option<i32>) -> Result<FieldCollection> {
    let path = config.fields_path(year.unwrap_or(config.year));
    FieldCollection::load(&path).with_context(|| format!("failed to load {}", path.display()))
}

fn save_fields(config: &Config, year: Option<i32>, fields: &FieldCollection) -> Result<()> {
    let path = config.fields_path(year.unwrap_or(config.year));
    fields
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn handle_model(config: &Config, cmd: ModelCommand) -> Result<()> {
    match cmd {
        ModelCommand::Evaluate {
            task,
            cv_method,
            model: kind,
            json,
        } => {
            let task = task.unwrap_or_else(|| config.task.clone());
            let mut model = config.model(&task)?.clone();
            if let Some(method) = cv_method {
                model.cv_method = CvMethod::from(method);
            }
            if let Some(kind) = kind {
                model.model = ModelKind::from(kind);
            }

            let records = load_history(config)?;
            let (estimator, report) = Estimator::train(&records, &model)
                .with_context(|| format!("failed to train the '{task}' model"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                render::report(&mut io::stdout().lock(), &estimator, &report)?;
            }
        }
        ModelCommand::Predict { year, task, json } => {
            let year = year.unwrap_or(config.year);
            let task = task.unwrap_or_else(|| config.task.clone());
            let model = config.model(&task)?;

            let records = load_history(config)?;
            let (estimator, _) = Estimator::train(&records, model)
                .with_context(|| format!("failed to train the '{task}' model"))?;
            let estimates = estimator.predict_year(&records, year);
            if json {
                let rows: Vec<serde_json::Value> = estimates
                    .iter()
                    .map(|((field, variety), hours)| {
                        serde_json::json!({ "field": field, "variety": variety, "hours": hours })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                render::estimates(&mut io::stdout().lock(), &estimates)?;
            }
        }
    }
    Ok(())
}

fn load_history(config: &Config) -> Result<Vec<estimate::HistoryRecord>> {
    let path = config.history_path();
    let records = estimate::load_history(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    if records.is_empty() {
        bail!("no harvest history in {}", path.display());
    }
    Ok(records)
}

fn handle_history(config: &Config, cmd: HistoryCommand) -> Result<()> {
    let storage = open_storage(config)?;
    match cmd {
        HistoryCommand::List { year, task, limit } => {
            let plans = match year {
                Some(year) => storage.by_year(year, task.as_deref(), limit)?,
                None => storage.recent(limit)?,
            };
            render::plans(&mut io::stdout().lock(), &plans)?;
        }
        HistoryCommand::Show { id, format } => {
            let Some(plan) = storage.get(id)? else {
                bail!("plan #{id} not found");
            };
            let mut out = io::stdout().lock();
            if let Some(label) = &plan.label {
                writeln!(out, "Plan #{id}: {label}")?;
            }
            render::schedule(&mut out, &plan.schedule, format)?;
        }
        HistoryCommand::Delete { id } => {
            if !storage.delete(id)? {
                bail!("plan #{id} not found");
            }
            println!("Deleted plan #{id}");
        }
        HistoryCommand::Prune { keep } => {
            let removed = storage.prune_keep_recent(keep)?;
            println!("Removed {removed} plans");
        }
        HistoryCommand::Stats { json } => {
            let stats = storage.stats()?;
            if json {
                let value = serde_json::json!({
                    "database_path": storage.path(),
                    "total_plans": stats.total_plans,
                    "plans_per_year": stats.plans_per_year,
                    "oldest_plan": stats.oldest_plan,
                    "newest_plan": stats.newest_plan,
                    "db_size_bytes": stats.db_size_bytes,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("Database: {}", storage.path().display());
                render::stats(&mut io::stdout().lock(), &stats)?;
            }
        }
    }
    Ok(())
}

fn open_storage(config: &Config) -> Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("failed to open plan archive {}", path.display()))
}

fn handle_years(config: &Config) -> Result<()> {
    let years = config.data_dir().available_years()?;
    if years.is_empty() {
        println!("No season files in {}", config.data_dir().root().display());
    }
    for year in years {
        println!("{year}");
    }
    Ok(())
}

fn handle_config(path: &Path, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = load_config(path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", serde_yaml::to_string(&config)?);
            }
        }
        ConfigCommand::Path => {
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(|| path.to_path_buf());
            Config::load_from(Some(path.clone()))
                .with_context(|| format!("{} is invalid", path.display()))?;
            println!("Configuration is valid: {}", path.display());
        }
    }
    Ok(())
}
