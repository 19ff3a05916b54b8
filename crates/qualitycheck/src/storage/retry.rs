//! Bounded retry with exponential backoff for storage operations.
//!
//! Only transient failures (`SQLite` busy/locked, interrupted I/O) are
//! retried; validation errors such as a duplicate serial and permanent
//! storage errors are returned on the first attempt.

use std::thread;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::checklist::ChecklistRow;
use crate::config::{Backend, Config};
use crate::error::Result;

use super::{RowStore, StorageStats};

/// Backoff delays never exceed this.
const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Build the policy from the `[storage]` section.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.storage.retry_attempts.max(1),
            initial_backoff: config.retry_backoff(),
        }
    }

    /// Run `operation`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the first non-transient error, or the last transient one once
    /// attempts are exhausted.
    pub fn run<T>(&self, operation_name: &str, mut operation: impl FnMut() -> Result<T>) -> Result<T> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            match operation() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = operation_name, attempt, "Storage operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    warn!(
                        operation = operation_name,
                        attempt,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Transient storage failure, will retry after backoff"
                    );
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        error!(
                            operation = operation_name,
                            attempt,
                            error = %err,
                            "Storage operation failed: retries exhausted"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }
}

/// A [`RowStore`] that retries transient failures of the wrapped store.
///
/// Each backend's `insert_batch` is all-or-nothing, so a retried insert
/// cannot duplicate rows.
#[derive(Debug)]
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: RowStore> Retrying<S> {
    /// Wrap `inner` with `policy`.
    #[must_use]
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped store.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: RowStore> RowStore for Retrying<S> {
    fn backend(&self) -> Backend {
        self.inner.backend()
    }

    fn location(&self) -> String {
        self.inner.location()
    }

    fn insert_batch(&mut self, rows: &[ChecklistRow]) -> Result<()> {
        let Self { inner, policy } = self;
        policy.run("insert batch", || inner.insert_batch(rows))
    }

    fn query_all(&self) -> Result<Vec<ChecklistRow>> {
        self.policy.run("query all", || self.inner.query_all())
    }

    fn query_by_serial(&self, serial: &str) -> Result<Vec<ChecklistRow>> {
        self.policy
            .run("query by serial", || self.inner.query_by_serial(serial))
    }

    fn contains_serial(&self, serial: &str) -> Result<bool> {
        self.policy
            .run("contains serial", || self.inner.contains_serial(serial))
    }

    fn stats(&self) -> Result<StorageStats> {
        self.policy.run("stats", || self.inner.stats())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::Error;

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            initial_backoff: Duration::from_millis(1),
        }
    }

    fn busy() -> Error {
        Error::DatabaseQuery(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ))
    }

    #[test]
    fn test_succeeds_first_attempt() {
        let calls = Cell::new(0);
        let result = fast(3).run("op", || {
            calls.set(calls.get() + 1);
            Ok(7)
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_retries_transient_until_success() {
        let calls = Cell::new(0);
        let result = fast(3).run("op", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(busy())
            } else {
                Ok("done")
            }
        });
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_gives_up_after_attempts() {
        let calls = Cell::new(0);
        let result: Result<()> = fast(4).run("op", || {
            calls.set(calls.get() + 1);
            Err(busy())
        });
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_does_not_retry_duplicate_serial() {
        let calls = Cell::new(0);
        let result: Result<()> = fast(5).run("op", || {
            calls.set(calls.get() + 1);
            Err(Error::duplicate_serial("SN1"))
        });
        assert!(matches!(result, Err(Error::DuplicateSerial { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_single_attempt_policy() {
        let calls = Cell::new(0);
        let _ = fast(1).run("op", || -> Result<()> {
            calls.set(calls.get() + 1);
            Err(busy())
        });
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = Config::default();
        config.storage.retry_attempts = 6;
        config.storage.retry_backoff_ms = 10;

        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.attempts, 6);
        assert_eq!(policy.initial_backoff, Duration::from_millis(10));
    }

    #[test]
    fn test_retrying_store_delegates() {
        let mut store = Retrying::new(super::super::MemoryStore::new(), fast(2));
        let rows = super::super::test_support::batch("SN1", "2024-05-01T08:00:00-03:00", &[], false);

        store.insert_batch(&rows).unwrap();
        assert_eq!(store.query_all().unwrap().len(), 5);
        assert!(store.contains_serial("SN1").unwrap());
        assert_eq!(store.backend(), Backend::Memory);
        assert_eq!(store.inner().len(), 5);
    }
}
