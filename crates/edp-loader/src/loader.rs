//! Staged bulk loader
//!
//! All-or-nothing state transition of the active filings table. Records are
//! inserted into a staging table in fixed-size batches; the staging table is
//! promoted to active only when the whole run recorded zero errors.
//!
//! Batches are issued strictly sequentially, each awaited before the next
//! starts. Sequential ordering is not needed for correctness, but
//! halt-on-first-error is what makes the promotion guarantee hold.
//!
//! Database access goes through the [`StagingStore`] trait so the halt and
//! promotion rules can be exercised without Postgres.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;
use tracing::{debug, info};

use edp_common::types::FilingRecord;

/// Records per grouped INSERT statement.
pub const BATCH_SIZE: usize = 100;

/// Errors from the staged load. Any variant is terminal for the file:
/// promotion is skipped and the active table is left untouched.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to recreate staging table: {0}")]
    Staging(#[source] sqlx::Error),

    #[error("insert batch {batch} failed: {source}")]
    Batch {
        batch: usize,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to promote staging table: {0}")]
    Promote(#[source] sqlx::Error),
}

/// Counts from a completed insert phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertStats {
    pub batches: usize,
    pub rows: usize,
}

/// Database operations the staged load performs.
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Run one standalone DDL statement.
    async fn execute(&self, sql: &str) -> Result<(), sqlx::Error>;

    /// Insert one batch of records into the named staging table.
    async fn insert_batch(&self, table: &str, records: &[FilingRecord])
        -> Result<(), sqlx::Error>;

    /// Atomically replace `active` with `staging` (drop + rename in one
    /// transaction, so readers see either snapshot but never a gap).
    async fn swap_tables(&self, staging: &str, active: &str) -> Result<(), sqlx::Error>;
}

/// [`StagingStore`] backed by a Postgres pool.
#[derive(Clone)]
pub struct PgStagingStore {
    pool: PgPool,
}

impl PgStagingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StagingStore for PgStagingStore {
    async fn execute(&self, sql: &str) -> Result<(), sqlx::Error> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    /// One grouped, fully parameterized multi-row INSERT.
    async fn insert_batch(
        &self,
        table: &str,
        records: &[FilingRecord],
    ) -> Result<(), sqlx::Error> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {table} (case_number, filing_date, amount, lon, lat, region_ids) "
        ));

        builder.push_values(records, |mut b, record| {
            b.push_bind(&record.case_number)
                .push_bind(record.filing_date)
                .push_bind(record.amount)
                .push_bind(record.lon)
                .push_bind(record.lat)
                .push_bind(region_ids_json(record));
        });

        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn swap_tables(&self, staging: &str, active: &str) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {active}"))
            .execute(&mut *tx)
            .await?;

        sqlx::query(&format!("ALTER TABLE {staging} RENAME TO {active}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await
    }
}

/// Staged loader bound to one active/staging table pair.
///
/// Concurrency precondition (not enforced here): at most one load may run
/// against a given staging table at a time. Deployments serialize runs or
/// namespace staging tables per environment.
pub struct Loader<S> {
    store: S,
    active_table: String,
    staging_table: String,
    batch_size: usize,
}

impl<S: StagingStore> Loader<S> {
    pub fn new(store: S, active_table: impl Into<String>, staging_table: impl Into<String>) -> Self {
        Self {
            store,
            active_table: active_table.into(),
            staging_table: staging_table.into(),
            batch_size: BATCH_SIZE,
        }
    }

    /// Override the batch size (tests only; production runs use [`BATCH_SIZE`]).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// DDL for the staging table.
    ///
    /// `region_ids` is a single JSONB value so the dimension set may evolve
    /// across files without schema changes.
    pub fn staging_ddl(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
  case_number VARCHAR ( 32 ) PRIMARY KEY,
  filing_date DATE NOT NULL,
  amount NUMERIC ( 10, 2 ),
  lon NUMERIC ( 10, 7 ),
  lat NUMERIC ( 10, 7 ),
  region_ids JSONB
)",
            self.staging_table
        )
    }

    /// Drop and recreate the staging table.
    pub async fn recreate_staging(&self) -> Result<(), LoadError> {
        debug!(table = %self.staging_table, "recreating staging table");

        self.store
            .execute(&format!("DROP TABLE IF EXISTS {}", self.staging_table))
            .await
            .map_err(LoadError::Staging)?;

        self.store
            .execute(&self.staging_ddl())
            .await
            .map_err(LoadError::Staging)?;

        Ok(())
    }

    /// Insert records into staging in fixed-size batches.
    ///
    /// Hard invariant: on the first batch failure all subsequent batches are
    /// skipped. The partial staging content is abandoned (never promoted).
    pub async fn insert_all(&self, records: &[FilingRecord]) -> Result<InsertStats, LoadError> {
        let mut stats = InsertStats::default();

        for (i, chunk) in records.chunks(self.batch_size).enumerate() {
            self.store
                .insert_batch(&self.staging_table, chunk)
                .await
                .map_err(|source| LoadError::Batch { batch: i + 1, source })?;

            stats.batches += 1;
            stats.rows += chunk.len();

            if stats.batches % 10 == 0 {
                info!(batches = stats.batches, rows = stats.rows, "rows inserted");
            }
        }

        debug!(batches = stats.batches, rows = stats.rows, "done inserting");
        Ok(stats)
    }

    /// Promote the staging table to active. Only called when the run
    /// recorded zero errors.
    pub async fn promote(&self) -> Result<(), LoadError> {
        self.store
            .swap_tables(&self.staging_table, &self.active_table)
            .await
            .map_err(LoadError::Promote)?;

        info!(
            staging = %self.staging_table,
            active = %self.active_table,
            "promoted staging table to active table"
        );
        Ok(())
    }
}

fn region_ids_json(record: &FilingRecord) -> Value {
    Value::Object(
        record
            .region_ids
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn record(case_number: &str) -> FilingRecord {
        FilingRecord {
            case_number: case_number.to_string(),
            filing_date: NaiveDate::from_ymd_opt(2021, 2, 1).unwrap(),
            amount: Some(500.0),
            lon: None,
            lat: None,
            region_ids: BTreeMap::from([("county_id".to_string(), "48201".to_string())]),
        }
    }

    /// Records every operation; fails the nth insert_batch call if asked.
    #[derive(Default)]
    struct RecordingStore {
        ops: Mutex<Vec<String>>,
        fail_insert_at: Option<usize>,
    }

    impl RecordingStore {
        fn failing_at(batch: usize) -> Self {
            Self {
                fail_insert_at: Some(batch),
                ..Default::default()
            }
        }

        fn ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }

        fn insert_calls(&self) -> usize {
            self.ops().iter().filter(|op| op.starts_with("insert")).count()
        }
    }

    #[async_trait]
    impl StagingStore for RecordingStore {
        async fn execute(&self, sql: &str) -> Result<(), sqlx::Error> {
            self.ops.lock().unwrap().push(format!("execute: {sql}"));
            Ok(())
        }

        async fn insert_batch(
            &self,
            table: &str,
            records: &[FilingRecord],
        ) -> Result<(), sqlx::Error> {
            let mut ops = self.ops.lock().unwrap();
            ops.push(format!("insert {} into {table}", records.len()));
            let calls = ops.iter().filter(|op| op.starts_with("insert")).count();
            if self.fail_insert_at == Some(calls) {
                return Err(sqlx::Error::PoolClosed);
            }
            Ok(())
        }

        async fn swap_tables(&self, staging: &str, active: &str) -> Result<(), sqlx::Error> {
            self.ops.lock().unwrap().push(format!("swap {staging} -> {active}"));
            Ok(())
        }
    }

    fn test_loader(store: RecordingStore) -> Loader<RecordingStore> {
        Loader::new(store, "evictions", "evictions_staging").with_batch_size(2)
    }

    #[test]
    fn test_staging_ddl_shape() {
        let ddl = test_loader(RecordingStore::default()).staging_ddl();
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS evictions_staging"));
        assert!(ddl.contains("case_number VARCHAR ( 32 ) PRIMARY KEY"));
        assert!(ddl.contains("filing_date DATE NOT NULL"));
        assert!(ddl.contains("region_ids JSONB"));
    }

    #[test]
    fn test_region_ids_json() {
        let value = region_ids_json(&record("A1"));
        assert_eq!(value["county_id"], serde_json::json!("48201"));
    }

    #[test]
    fn test_batch_chunking() {
        let records: Vec<_> = (0..250).map(|i| record(&format!("C{}", i))).collect();
        let chunks: Vec<_> = records.chunks(BATCH_SIZE).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[2].len(), 50);
    }

    #[tokio::test]
    async fn test_insert_all_halts_on_first_batch_failure() {
        // Batch size 2, five records -> batches of 2, 2, 1. The second batch
        // fails; the third must never be issued.
        let loader = test_loader(RecordingStore::failing_at(2));
        let records: Vec<_> = (0..5).map(|i| record(&format!("C{}", i))).collect();

        let err = loader.insert_all(&records).await.unwrap_err();
        match err {
            LoadError::Batch { batch, .. } => assert_eq!(batch, 2),
            other => panic!("expected batch error, got {other:?}"),
        }
        assert_eq!(loader.store.insert_calls(), 2);
    }

    #[tokio::test]
    async fn test_insert_all_counts_complete_run() {
        let loader = test_loader(RecordingStore::default());
        let records: Vec<_> = (0..5).map(|i| record(&format!("C{}", i))).collect();

        let stats = loader.insert_all(&records).await.unwrap();
        assert_eq!(stats, InsertStats { batches: 3, rows: 5 });
    }

    #[tokio::test]
    async fn test_recreate_staging_drops_then_creates() {
        let loader = test_loader(RecordingStore::default());
        loader.recreate_staging().await.unwrap();

        let ops = loader.store.ops();
        assert_eq!(ops.len(), 2);
        assert!(ops[0].contains("DROP TABLE IF EXISTS evictions_staging"));
        assert!(ops[1].contains("CREATE TABLE IF NOT EXISTS evictions_staging"));
    }

    #[tokio::test]
    async fn test_promote_swaps_staging_into_active() {
        let loader = test_loader(RecordingStore::default());
        loader.promote().await.unwrap();
        assert_eq!(loader.store.ops(), vec!["swap evictions_staging -> evictions"]);
    }
}
