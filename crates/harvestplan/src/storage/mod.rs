//! Plan archive.
//!
//! Saved schedules are kept in `SQLite` so earlier plans of a season can be
//! listed, compared and pruned. Identical plans (same year, task and
//! schedule) are stored once.

pub mod migrations;
mod plan;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};

pub use plan::SavedPlan;

const SELECT_PLAN: &str = r"
SELECT id, created_at, year, task, label, fingerprint, payload FROM plans
";

/// Storage engine for saved plans.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create the archive at the given path.
    ///
    /// Creates parent directories as needed and brings the schema up to
    /// date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening plan archive at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        debug!("Plan archive ready at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save a plan.
    ///
    /// Returns the new ID, or `None` if a plan with the same fingerprint is
    /// already archived.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert(&self, plan: &SavedPlan) -> Result<Option<i64>> {
        if let Some(existing) = self.find_by_fingerprint(&plan.fingerprint)? {
            debug!(
                "Plan {} already archived as #{}",
                plan.short_fingerprint(),
                existing
            );
            return Ok(None);
        }

        let payload = serde_json::to_string(&plan.schedule)?;
        let finish = plan
            .finish()
            .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string());
        let entry_count = i64::try_from(plan.entry_count()).unwrap_or(i64::MAX);

        self.conn.execute(
            r"
            INSERT INTO plans (created_at, year, task, label, fingerprint, entry_count,
                               total_hours, finish, complete, payload)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
            params![
                format_timestamp(plan.created_at),
                plan.year,
                plan.task,
                plan.label,
                plan.fingerprint,
                entry_count,
                plan.schedule.total_hours(),
                finish,
                plan.schedule.is_complete(),
                payload,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        info!("Archived plan #{} for {} {}", id, plan.task, plan.year);
        Ok(Some(id))
    }

    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM plans WHERE fingerprint = ?1",
                [fingerprint],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Get a plan by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the stored
    /// schedule is unreadable.
    pub fn get(&self, id: i64) -> Result<Option<SavedPlan>> {
        let plan = self
            .conn
            .query_row(
                &format!("{SELECT_PLAN} WHERE id = ?1"),
                [id],
                Self::row_to_plan,
            )
            .optional()?;
        Ok(plan)
    }

    /// Most recently saved plans, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent(&self, limit: usize) -> Result<Vec<SavedPlan>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_PLAN} ORDER BY created_at DESC, id DESC LIMIT ?1"
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let plans = stmt
            .query_map([limit], Self::row_to_plan)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(plans)
    }

    /// Plans of one season, newest first, optionally for one task only.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn by_year(&self, year: i32, task: Option<&str>, limit: usize) -> Result<Vec<SavedPlan>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_PLAN} WHERE year = ?1 AND (?2 IS NULL OR task = ?2)
             ORDER BY created_at DESC, id DESC LIMIT ?3"
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let plans = stmt
            .query_map(params![year, task, limit], Self::row_to_plan)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(plans)
    }

    /// Number of archived plans.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM plans", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete a plan. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let affected = self.conn.execute("DELETE FROM plans WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Keep only the `keep_count` newest plans. Returns how many were deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn prune_keep_recent(&self, keep_count: usize) -> Result<usize> {
        let keep = i64::try_from(keep_count).unwrap_or(i64::MAX);
        let affected = self.conn.execute(
            r"
            DELETE FROM plans WHERE id NOT IN (
                SELECT id FROM plans ORDER BY created_at DESC, id DESC LIMIT ?1
            )
            ",
            [keep],
        )?;

        if affected > 0 {
            info!("Pruned {} plans to keep {} recent", affected, keep_count);
        }
        Ok(affected)
    }

    /// Archive statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_plans = self.count()?;

        let (oldest, newest): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(created_at), MAX(created_at) FROM plans",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT year, COUNT(*) FROM plans GROUP BY year ORDER BY year")?;
        let plans_per_year = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<(i32, i64)>, _>>()?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_plans,
            plans_per_year,
            oldest_plan: oldest.as_deref().and_then(parse_timestamp),
            newest_plan: newest.as_deref().and_then(parse_timestamp),
            db_size_bytes,
        })
    }

    fn row_to_plan(row: &rusqlite::Row) -> rusqlite::Result<SavedPlan> {
        let created_at: String = row.get(1)?;
        let payload: String = row.get(6)?;

        let created_at = parse_timestamp(&created_at).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                Type::Text,
                format!("invalid timestamp '{created_at}'").into(),
            )
        })?;
        let schedule = serde_json::from_str(&payload)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

        Ok(SavedPlan {
            id: Some(row.get(0)?),
            created_at,
            year: row.get(2)?,
            task: row.get(3)?,
            label: row.get(4)?,
            fingerprint: row.get(5)?,
            schedule,
        })
    }
}

/// Fixed-width RFC 3339, so text order is time order.
fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Statistics about the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of saved plans.
    pub total_plans: i64,
    /// `(year, count)` pairs, ascending by year.
    pub plans_per_year: Vec<(i32, i64)>,
    /// When the oldest plan was saved.
    pub oldest_plan: Option<DateTime<Utc>>,
    /// When the newest plan was saved.
    pub newest_plan: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
