//! Application context passed to every operation.

use crate::checklist::ChecklistRow;
use crate::config::Config;
use crate::error::Result;
use crate::identity::{Directory, Inspector};
use crate::storage::{self, RowStore};

/// Everything an operation needs: configuration, who is logged in, and
/// where rows live.
#[derive(Debug)]
pub struct AppContext {
    /// Loaded, validated configuration.
    pub config: Config,
    /// The authenticated operator.
    pub inspector: Inspector,
    /// The configured row store.
    pub store: Box<dyn RowStore>,
}

impl AppContext {
    /// Assemble a context from parts.
    #[must_use]
    pub fn new(config: Config, inspector: Inspector, store: Box<dyn RowStore>) -> Self {
        Self {
            config,
            inspector,
            store,
        }
    }

    /// Log in against the configured directory and open the configured store.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are missing or wrong, or if the
    /// store cannot be opened.
    pub fn login(config: Config, username: Option<&str>, password: Option<&str>) -> Result<Self> {
        let inspector = Directory::from_config(&config.identity).login(username, password)?;
        let store = storage::open_store(&config)?;
        Ok(Self::new(config, inspector, store))
    }

    /// All stored rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn rows(&self) -> Result<Vec<ChecklistRow>> {
        self.store.query_all()
    }
}
