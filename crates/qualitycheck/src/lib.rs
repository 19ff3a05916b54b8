//! `qualitycheck` - Quality-inspection checklist entry and reporting
//!
//! This library validates per-unit inspection checklists, stores them in one
//! of several interchangeable backends, and builds approval and failure
//! reports from the stored rows.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod checklist;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod inspection;
pub mod logging;
pub mod photo;
pub mod report;
pub mod storage;

pub use checklist::{ChecklistRow, ItemResult, Status, Submission};
pub use config::Config;
pub use context::AppContext;
pub use error::{Error, Result};
pub use identity::{Directory, Inspector};
pub use inspection::{find_pending_reinspection, submit};
pub use logging::init_logging;
pub use photo::LabelPhoto;
pub use report::{failure_pareto, summary, DateRange};
pub use storage::{RowStore, StorageStats};
