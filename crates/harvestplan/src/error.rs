//! Error types for harvestplan.
//!
//! This module defines all error types used throughout the harvestplan crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for harvestplan operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the plan archive.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Data File Errors ===
    /// A YAML data file could not be parsed or written.
    #[error("invalid data file {path}: {source}")]
    DataFile {
        /// Path to the offending file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    // === Workforce Errors ===
    /// A worker with this name is already part of the workforce.
    #[error("worker '{name}' already exists in the workforce")]
    DuplicateWorker {
        /// The worker name.
        name: String,
    },

    /// No worker with this name exists.
    #[error("worker '{name}' not found in the workforce")]
    WorkerNotFound {
        /// The worker name.
        name: String,
    },

    /// A worker definition is inconsistent.
    #[error("invalid worker '{name}': {message}")]
    InvalidWorker {
        /// The worker name.
        name: String,
        /// Description of the problem.
        message: String,
    },

    // === Field Errors ===
    /// A field with this name and variety already exists.
    #[error("field '{field}' with variety '{variety}' already exists")]
    DuplicateField {
        /// Field name.
        field: String,
        /// Variety name.
        variety: String,
    },

    /// No field with this name and variety exists.
    #[error("field '{field}' with variety '{variety}' not found")]
    FieldNotFound {
        /// Field name.
        field: String,
        /// Variety name.
        variety: String,
    },

    /// A field definition is inconsistent.
    #[error("invalid field '{field}': {message}")]
    InvalidField {
        /// Field name.
        field: String,
        /// Description of the problem.
        message: String,
    },

    /// Labor hours for a field are negative or not a number.
    #[error("invalid hours for field '{field}': {hours}")]
    InvalidHours {
        /// Field name.
        field: String,
        /// The rejected value.
        hours: f64,
    },

    // === Estimation Errors ===
    /// No model configuration exists for the requested task.
    #[error("no model configured for task '{task}'")]
    ModelNotConfigured {
        /// The task name.
        task: String,
    },

    /// Not enough usable rows to train or validate a model.
    #[error("insufficient data: {message}")]
    InsufficientData {
        /// Description of what is missing.
        message: String,
    },

    /// The regression system could not be solved.
    #[error("model could not be fitted: {message}")]
    SingularModel {
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for harvestplan operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a config validation error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create an invalid worker error.
    #[must_use]
    pub fn invalid_worker(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidWorker {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an invalid field error.
    #[must_use]
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an insufficient data error.
    #[must_use]
    pub fn insufficient_data(message: impl Into<String>) -> Self {
        Self::InsufficientData {
            message: message.into(),
        }
    }

    /// Check if this error means a named entity was not found.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::WorkerNotFound { .. } | Self::FieldNotFound { .. }
        )
    }

    /// Check if this error is a duplicate-entity error.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            Self::DuplicateWorker { .. } | Self::DuplicateField { .. }
        )
    }
}
