//! `SQLite` schema definitions for qualitycheck.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the checklist rows table.
pub const CREATE_ROWS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS checklist_rows (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    serial TEXT NOT NULL,
    item TEXT NOT NULL,
    status TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    inspector TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    rejected INTEGER NOT NULL,
    is_reinspection INTEGER NOT NULL,
    label_photo TEXT,
    photo_digest TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create an index on serial for duplicate checks and lookups.
pub const CREATE_SERIAL_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_rows_serial ON checklist_rows(serial)
";

/// SQL statement to create an index on timestamp for date-range reports.
pub const CREATE_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_rows_timestamp ON checklist_rows(timestamp)
";

/// Partial unique index: a serial gets exactly one first inspection.
///
/// Backstops the in-transaction duplicate check against writers using other
/// connections.
pub const CREATE_FIRST_INSPECTION_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_rows_first_inspection
    ON checklist_rows(serial, item) WHERE is_reinspection = 0
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
    CREATE_ROWS_TABLE,
    CREATE_SERIAL_INDEX,
    CREATE_TIMESTAMP_INDEX,
    CREATE_FIRST_INSPECTION_INDEX,
    CREATE_METADATA_TABLE,
];

/// Columns selected when reading rows, in `row_to_stored` order.
pub const ROW_COLUMNS: &str = "serial, item, status, notes, inspector, timestamp, \
     rejected, is_reinspection, label_photo, photo_digest";
