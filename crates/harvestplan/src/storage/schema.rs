//! `SQLite` schema of the plan archive.
//!
//! These statements create the version 1 schema. Later columns are added by
//! the migrations.

/// SQL statement to create the plans table.
pub const CREATE_PLANS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS plans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    year INTEGER NOT NULL,
    task TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    entry_count INTEGER NOT NULL,
    total_hours REAL NOT NULL,
    finish TEXT,
    complete INTEGER NOT NULL,
    payload TEXT NOT NULL
)
";

/// Index for newest-first listings.
pub const CREATE_CREATED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_plans_created ON plans(created_at DESC)
";

/// Index on the fingerprint for deduplication.
pub const CREATE_FINGERPRINT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_plans_fingerprint ON plans(fingerprint)
";

/// Index for per-season listings.
pub const CREATE_YEAR_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_plans_year ON plans(year, task)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_PLANS_TABLE,
    CREATE_CREATED_INDEX,
    CREATE_FINGERPRINT_INDEX,
    CREATE_YEAR_INDEX,
    CREATE_METADATA_TABLE,
];

/// Version 2: optional label on saved plans.
pub const ADD_LABEL_COLUMN: &str = "ALTER TABLE plans ADD COLUMN label TEXT";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plans_table_columns() {
        for column in [
            "created_at TEXT NOT NULL",
            "year INTEGER NOT NULL",
            "fingerprint TEXT NOT NULL",
            "payload TEXT NOT NULL",
        ] {
            assert!(CREATE_PLANS_TABLE.contains(column), "missing {column}");
        }
        assert!(!CREATE_PLANS_TABLE.contains("label"));
    }

    #[test]
    fn test_every_statement_is_idempotent() {
        for stmt in SCHEMA_STATEMENTS {
            assert!(stmt.contains("IF NOT EXISTS"));
        }
    }
}
