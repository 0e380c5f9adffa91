//! EDP Common Library
//!
//! Shared types, utilities, and error handling for the EDP project.
//!
//! # Overview
//!
//! This crate provides common functionality used across all EDP workspace members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Logging**: Central tracing setup shared by the server and the loader
//! - **Types**: The region dimension catalog and the canonical filing record

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{EdpError, Result};
pub use types::{FilingRecord, Region};
