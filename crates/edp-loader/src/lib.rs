//! EDP Loader Library
//!
//! Bulk-load pipeline for eviction-filing CSV extracts.
//!
//! A load run takes one object from the inbound bucket and performs an
//! all-or-nothing snapshot swap:
//!
//! 1. Fetch the file from object storage
//! 2. Parse and sanitize rows into canonical filing records ([`parser`])
//! 3. Rebuild the staging table and insert records in fixed-size batches,
//!    halting on the first batch failure ([`loader`])
//! 4. Delete the source object (regardless of outcome, see [`run`])
//! 5. Promote staging to active only if the run recorded zero errors
//!
//! Callers must ensure at most one load runs against a given staging table at
//! a time; there is no in-process lock.

pub mod config;
pub mod loader;
pub mod parser;
pub mod run;
pub mod storage;

pub use loader::{LoadError, Loader, PgStagingStore, StagingStore};
pub use parser::{parse_filings, ParseStats, ParsedFile};
pub use run::{run_load, LoadReport, RunError};
