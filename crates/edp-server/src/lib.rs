//! EDP Server Library
//!
//! HTTP query API over the eviction filings snapshot.
//!
//! # Overview
//!
//! The server exposes aggregate, region-parameterized queries for
//! visualization clients:
//!
//! - `GET /summary` - filings/median/total per region (or one global row)
//! - `GET /filings` - the same aggregates as a daily time series
//! - `GET /locations` - daily aggregates for an ad-hoc set of locations
//! - `GET /meta` - record count plus first/last filing date
//! - `GET /precincts` - distinct court precinct ids
//!
//! # Architecture
//!
//! The read path is three stages behind the axum handlers:
//!
//! 1. [`query::builder`] translates validated parameters into aggregation
//!    SQL with ordered bind values. Region names resolve through the closed
//!    catalog in `edp-common`; no user input reaches SQL text.
//! 2. [`query::executor`] runs the statement and transparently pages with
//!    LIMIT/OFFSET when the store reports its result-size ceiling.
//! 3. [`query::format`] maps rows to the abbreviated wire fields and renders
//!    JSON or CSV.

pub mod api;
pub mod config;
pub mod db;
pub mod query;

pub use config::Config;
