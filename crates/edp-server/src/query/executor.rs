//! Query execution with oversized-result pagination
//!
//! The store is a trait so the pagination logic can be tested without a
//! database. The Postgres implementation maps the proxy's response size
//! rejection onto [`StoreError::ResultTooLarge`]; the executor reacts by
//! counting the rows and re-running the statement in `LIMIT`/`OFFSET` pages.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row, TypeInfo};
use tracing::{debug, instrument, warn};

use super::builder::{BindValue, BuiltQuery};

/// Rows are surfaced as ordered JSON objects keyed by output column name.
pub type JsonRow = Map<String, Value>;

/// Rows fetched per page when a result has to be paginated.
pub const PAGE_SIZE: u64 = 10_000;

/// Marker the data proxy puts in its error when a result exceeds its size cap.
const SIZE_LIMIT_MARKER: &str = "allowed response size limit";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend refused the result as a whole; retry in pages.
    #[error("result set exceeds the response size limit")]
    ResultTooLarge,
    #[error("query failed: {0}")]
    Query(String),
}

/// Executes a built statement and returns its rows.
#[async_trait]
pub trait QueryStore: Send + Sync {
    async fn fetch(&self, sql: &str, binds: &[BindValue]) -> Result<Vec<JsonRow>, StoreError>;
}

/// [`QueryStore`] backed by a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryStore for PgStore {
    async fn fetch(&self, sql: &str, binds: &[BindValue]) -> Result<Vec<JsonRow>, StoreError> {
        let mut query = sqlx::query(sql);
        for bind in binds {
            query = match bind {
                BindValue::Date(d) => query.bind(*d),
                BindValue::Text(t) => query.bind(t.clone()),
            };
        }

        let rows = query.fetch_all(&self.pool).await.map_err(|err| {
            let message = err.to_string();
            if message.contains(SIZE_LIMIT_MARKER) {
                StoreError::ResultTooLarge
            } else {
                StoreError::Query(message)
            }
        })?;

        rows.iter().map(row_to_json).collect()
    }
}

fn row_to_json(row: &PgRow) -> Result<JsonRow, StoreError> {
    let mut map = Map::new();
    for column in row.columns() {
        let name = column.name();
        let value = match column.type_info().name() {
            "INT2" => row
                .try_get::<Option<i16>, _>(name)
                .map(|v| v.map(Value::from))
                .map_err(decode_err)?,
            "INT4" => row
                .try_get::<Option<i32>, _>(name)
                .map(|v| v.map(Value::from))
                .map_err(decode_err)?,
            "INT8" => row
                .try_get::<Option<i64>, _>(name)
                .map(|v| v.map(Value::from))
                .map_err(decode_err)?,
            "FLOAT4" => row
                .try_get::<Option<f32>, _>(name)
                .map(|v| v.map(|n| Value::from(n as f64)))
                .map_err(decode_err)?,
            "FLOAT8" => row
                .try_get::<Option<f64>, _>(name)
                .map(|v| v.map(Value::from))
                .map_err(decode_err)?,
            "BOOL" => row
                .try_get::<Option<bool>, _>(name)
                .map(|v| v.map(Value::from))
                .map_err(decode_err)?,
            "DATE" => row
                .try_get::<Option<chrono::NaiveDate>, _>(name)
                .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%d").to_string())))
                .map_err(decode_err)?,
            _ => row
                .try_get::<Option<String>, _>(name)
                .map(|v| v.map(Value::String))
                .map_err(decode_err)?,
        };
        map.insert(name.to_string(), value.unwrap_or(Value::Null));
    }
    Ok(map)
}

fn decode_err(err: sqlx::Error) -> StoreError {
    StoreError::Query(err.to_string())
}

/// Runs built statements against a store, paging when the store reports the
/// result was too large to return whole.
#[derive(Debug, Clone)]
pub struct QueryExecutor<S> {
    store: S,
}

impl<S: QueryStore> QueryExecutor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(skip(self, built), fields(binds = built.binds.len()))]
    pub async fn execute(&self, built: &BuiltQuery) -> Result<Vec<JsonRow>, StoreError> {
        match self.store.fetch(&built.sql, &built.binds).await {
            Ok(rows) => Ok(rows),
            Err(StoreError::ResultTooLarge) => {
                warn!("result exceeded size limit, switching to pagination");
                self.execute_paged(built).await
            }
            Err(err) => Err(err),
        }
    }

    async fn execute_paged(&self, built: &BuiltQuery) -> Result<Vec<JsonRow>, StoreError> {
        let count_sql = count_query(&built.sql);
        let count_rows = self.store.fetch(&count_sql, &built.binds).await?;
        let total = count_rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_u64)
            .ok_or_else(|| StoreError::Query("count query returned no usable row".to_string()))?;

        debug!(total, page_size = PAGE_SIZE, "fetching paginated result");

        let mut rows = Vec::with_capacity(total as usize);
        let mut offset = 0u64;
        while offset < total {
            let page_sql = paged_query(&built.sql, PAGE_SIZE, offset);
            let mut page = self.store.fetch(&page_sql, &built.binds).await?;
            if page.is_empty() {
                break;
            }
            rows.append(&mut page);
            offset += PAGE_SIZE;
        }
        Ok(rows)
    }
}

fn trim_statement(sql: &str) -> &str {
    sql.trim_end().trim_end_matches(';').trim_end()
}

fn count_query(sql: &str) -> String {
    format!("SELECT COUNT(*) AS count FROM ({}) sub", trim_statement(sql))
}

fn paged_query(sql: &str, limit: u64, offset: u64) -> String {
    format!("{}\nLIMIT {limit} OFFSET {offset}", trim_statement(sql))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Scripted store: pops one canned response per fetch and records the SQL.
    struct ScriptedStore {
        responses: Mutex<Vec<Result<Vec<JsonRow>, StoreError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedStore {
        fn new(responses: Vec<Result<Vec<JsonRow>, StoreError>>) -> Self {
            let mut responses = responses;
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryStore for ScriptedStore {
        async fn fetch(&self, sql: &str, _binds: &[BindValue]) -> Result<Vec<JsonRow>, StoreError> {
            self.calls.lock().unwrap().push(sql.to_string());
            self.responses.lock().unwrap().pop().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn row(key: &str, value: i64) -> JsonRow {
        let mut map = Map::new();
        map.insert(key.to_string(), Value::from(value));
        map
    }

    fn built(sql: &str) -> BuiltQuery {
        BuiltQuery {
            sql: sql.to_string(),
            binds: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_small_result_passes_through() {
        let store = ScriptedStore::new(vec![Ok(vec![row("filings", 12)])]);
        let executor = QueryExecutor::new(store);
        let rows = executor.execute(&built("SELECT 1")).await.unwrap();
        assert_eq!(rows, vec![row("filings", 12)]);
        assert_eq!(executor.store.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_query_error_not_retried() {
        let store = ScriptedStore::new(vec![Err(StoreError::Query("boom".to_string()))]);
        let executor = QueryExecutor::new(store);
        assert!(matches!(
            executor.execute(&built("SELECT 1")).await,
            Err(StoreError::Query(_))
        ));
        assert_eq!(executor.store.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_result_paginates_in_order() {
        let store = ScriptedStore::new(vec![
            Err(StoreError::ResultTooLarge),
            Ok(vec![row("count", 15_000)]),
            Ok((0..3).map(|i| row("n", i)).collect()),
            Ok((3..5).map(|i| row("n", i)).collect()),
        ]);
        let executor = QueryExecutor::new(store);
        let rows = executor.execute(&built("SELECT n FROM t;")).await.unwrap();

        // Pages concatenate in request order.
        let values: Vec<i64> = rows.iter().map(|r| r["n"].as_i64().unwrap()).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);

        let calls = executor.store.calls();
        assert_eq!(calls.len(), 4);
        // The trailing ';' must be stripped before wrapping or appending.
        assert_eq!(calls[1], "SELECT COUNT(*) AS count FROM (SELECT n FROM t) sub");
        assert_eq!(calls[2], "SELECT n FROM t\nLIMIT 10000 OFFSET 0");
        assert_eq!(calls[3], "SELECT n FROM t\nLIMIT 10000 OFFSET 10000");
    }

    #[tokio::test]
    async fn test_pagination_stops_on_empty_page() {
        let store = ScriptedStore::new(vec![
            Err(StoreError::ResultTooLarge),
            Ok(vec![row("count", 20_000)]),
            Ok(vec![row("n", 1)]),
            Ok(Vec::new()),
        ]);
        let executor = QueryExecutor::new(store);
        let rows = executor.execute(&built("SELECT n FROM t")).await.unwrap();
        assert_eq!(rows.len(), 1);
    }
}
