//! Error types for qualitycheck.
//!
//! This module defines all error types used throughout the qualitycheck crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for qualitycheck operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Submission Errors ===
    /// The serial was already inspected and the submission is not a reinspection.
    #[error("duplicate serial: {serial} has already been inspected")]
    DuplicateSerial {
        /// The offending serial number.
        serial: String,
    },

    /// The label photo is required but was not provided.
    #[error("a photo of '{item}' is required for this inspection")]
    MissingPhoto {
        /// The checklist item that requires a photo.
        item: String,
    },

    /// The submission is missing required data.
    #[error("incomplete submission: {message}")]
    IncompleteSubmission {
        /// What is missing or malformed.
        message: String,
    },

    /// A reinspection was requested for a serial with no prior inspection.
    #[error("serial {serial} has never been inspected, nothing to reinspect")]
    NotInspected {
        /// The serial number.
        serial: String,
    },

    /// A reinspection was requested for a serial that was never rejected.
    #[error("serial {serial} was never rejected, nothing to reinspect")]
    NotRejected {
        /// The serial number.
        serial: String,
    },

    // === Identity Errors ===
    /// Username or password did not match the identity directory.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// An operation needed a logged-in inspector.
    #[error("not logged in: supply --user and --password")]
    NotAuthenticated,

    // === Photo Errors ===
    /// A photo could not be encoded or decoded.
    #[error("photo encoding error: {message}")]
    PhotoEncoding {
        /// Description of what went wrong.
        message: String,
    },

    // === Storage Errors ===
    /// Failed to open or create the database.
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

    /// Reading or writing the CSV store failed.
    #[error("CSV store error at {path}: {source}")]
    Csv {
        /// Path to the CSV file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: csv::Error,
    },

    /// A stored row could not be interpreted.
    #[error("corrupt row in store: {message}")]
    CorruptRow {
        /// Description of the bad value.
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

/// A specialized Result type for qualitycheck operations.
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

    /// Create an incomplete submission error.
    #[must_use]
    pub fn incomplete(message: impl Into<String>) -> Self {
        Self::IncompleteSubmission {
            message: message.into(),
        }
    }

    /// Create a duplicate serial error.
    #[must_use]
    pub fn duplicate_serial(serial: impl Into<String>) -> Self {
        Self::DuplicateSerial {
            serial: serial.into(),
        }
    }

    /// Create a photo encoding error.
    #[must_use]
    pub fn photo(message: impl Into<String>) -> Self {
        Self::PhotoEncoding {
            message: message.into(),
        }
    }

    /// Create a corrupt row error.
    #[must_use]
    pub fn corrupt_row(message: impl Into<String>) -> Self {
        Self::CorruptRow {
            message: message.into(),
        }
    }

    /// Check if this error rejects the submission itself rather than the storage.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateSerial { .. }
                | Self::MissingPhoto { .. }
                | Self::IncompleteSubmission { .. }
                | Self::NotInspected { .. }
                | Self::NotRejected { .. }
        )
    }

    /// Check if this error is a transient storage failure worth retrying.
    ///
    /// Covers `SQLite` busy/locked conditions and interrupted or timed-out I/O.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::DatabaseQuery(rusqlite::Error::SqliteFailure(err, _))
            | Self::DatabaseOpen {
                source: rusqlite::Error::SqliteFailure(err, _),
                ..
            } => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            Self::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            Self::Csv { source, .. } => match source.kind() {
                csv::ErrorKind::Io(err) => matches!(
                    err.kind(),
                    std::io::ErrorKind::Interrupted
                        | std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::TimedOut
                ),
                _ => false,
            },
            _ => false,
        }
    }
}
