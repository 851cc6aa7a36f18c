// src/lib.rs
//! Consolidates the newest quarterly accounting disclosures published on the
//! ANS open-data file index into a single validated expenses report.

pub mod config;
pub mod error;
pub mod fetch;
pub mod report;
pub mod table;
pub mod transform;

pub use config::Config;
pub use error::{DiscoveryError, RetrievalError, TableError};
pub use report::ReportSummary;
pub use table::Table;
