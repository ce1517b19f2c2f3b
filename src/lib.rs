//! Drives QuickBooks Desktop through its user interface to export invoices
//! (as PDF through a print-to-file printer) and memorized reports (as CSV)
//! to disk, confirming every file before a document leaves the queue.

pub mod config;
pub mod desktop;
pub mod error;
pub mod files;
pub mod models;
pub mod vision;
pub mod workflow;

pub use config::EngineConfig;
pub use error::{ExportError, RecoverableError, Result};
