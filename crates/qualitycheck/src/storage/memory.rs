//! Ephemeral in-process row store.

use tracing::debug;

use crate::checklist::ChecklistRow;
use crate::config::Backend;
use crate::error::{Error, Result};

use super::{batch_key, RowStore};

/// Rows held in a `Vec`, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Vec<ChecklistRow>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl RowStore for MemoryStore {
    fn backend(&self) -> Backend {
        Backend::Memory
    }

    fn location(&self) -> String {
        ":memory:".to_string()
    }

    fn insert_batch(&mut self, rows: &[ChecklistRow]) -> Result<()> {
        let (serial, is_reinspection) = batch_key(rows)?;
        if !is_reinspection && self.contains_serial(serial)? {
            return Err(Error::duplicate_serial(serial));
        }

        self.rows.extend_from_slice(rows);
        debug!(serial, rows = rows.len(), "Appended batch to memory store");
        Ok(())
    }

    fn query_all(&self) -> Result<Vec<ChecklistRow>> {
        Ok(self.rows.clone())
    }

    fn query_by_serial(&self, serial: &str) -> Result<Vec<ChecklistRow>> {
        Ok(self
            .rows
            .iter()
            .filter(|row| row.serial == serial)
            .cloned()
            .collect())
    }

    fn contains_serial(&self, serial: &str) -> Result<bool> {
        Ok(self.rows.iter().any(|row| row.serial == serial))
    }
}
