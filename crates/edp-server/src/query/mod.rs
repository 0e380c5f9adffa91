//! Query engine
//!
//! Parameter validation, SQL construction, execution with transparent
//! pagination, and result formatting for the aggregate filing queries.

pub mod builder;
pub mod executor;
pub mod format;
pub mod params;

pub use builder::{BindValue, BuiltQuery, QueryBuilder};
pub use executor::{JsonRow, PgStore, QueryExecutor, QueryStore, StoreError};
pub use format::{FormatError, Rendered};
pub use params::{EvictionQuery, LocationsQuery, OutputFormat, ParamError};
