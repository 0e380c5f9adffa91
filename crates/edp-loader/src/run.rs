//! Load run orchestration
//!
//! One run per inbound object: fetch, parse, stage, delete the source file,
//! then promote or report failure.
//!
//! Source-file deletion is intentionally unconditional relative to promotion:
//! once staging inserts have finished (even with a failed batch) the inbound
//! object is removed, and only then is the failure reported. A file that
//! parses to zero records is the one exception; the run aborts before the
//! delete and leaves the object in place so it can be inspected. Downstream
//! tooling depends on both behaviors; they are locked in by tests.

use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::loader::{InsertStats, LoadError, Loader, StagingStore};
use crate::parser::{parse_filings, ParseStats};
use crate::storage::ObjectStore;

/// Terminal failure of one load run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to fetch {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{key} is not valid UTF-8")]
    Encoding { key: String },

    #[error("failed to parse {key}: {source}")]
    Parse {
        key: String,
        #[source]
        source: edp_common::EdpError,
    },

    /// Nothing to load; the source file is left in place.
    #[error("unable to load data: no records parsed from {key}")]
    NoRecords { key: String },

    /// Staging or insert failure. The source file has already been removed
    /// by the time this is reported.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Summary of a completed (successful) load run.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub run_id: Uuid,
    pub key: String,
    pub parse_stats: ParseStats,
    pub insert_stats: InsertStats,
}

/// Execute one load run for the given object key.
pub async fn run_load<S: StagingStore, O: ObjectStore>(
    loader: &Loader<S>,
    storage: &O,
    key: &str,
) -> Result<LoadReport, RunError> {
    let run_id = Uuid::new_v4();
    info!(%run_id, key, "starting load run");

    let bytes = storage.fetch(key).await.map_err(|source| RunError::Fetch {
        key: key.to_string(),
        source,
    })?;

    let content = String::from_utf8(bytes).map_err(|_| RunError::Encoding {
        key: key.to_string(),
    })?;

    let parsed = parse_filings(&content).map_err(|source| RunError::Parse {
        key: key.to_string(),
        source,
    })?;

    info!(
        %run_id,
        rows_read = parsed.stats.rows_read,
        records = parsed.records.len(),
        skipped = parsed.stats.skipped(),
        "parsed extract"
    );

    if parsed.records.is_empty() {
        return Err(RunError::NoRecords {
            key: key.to_string(),
        });
    }

    let staged: Result<InsertStats, LoadError> = async {
        loader.recreate_staging().await?;
        loader.insert_all(&parsed.records).await
    }
    .await;

    // The source file is removed regardless of how staging went; a delete
    // failure is logged but does not change the run outcome.
    if let Err(e) = storage.delete(key).await {
        warn!(%run_id, key, error = %e, "failed to remove source file");
    }

    let insert_stats = match staged {
        Ok(stats) => stats,
        Err(e) => {
            error!(%run_id, key, error = %e, "load failed, active table left untouched");
            return Err(e.into());
        },
    };

    loader.promote().await?;

    let report = LoadReport {
        run_id,
        key: key.to_string(),
        parse_stats: parsed.stats,
        insert_stats,
    };

    info!(
        %run_id,
        key,
        rows = report.insert_stats.rows,
        batches = report.insert_stats.batches,
        "load run complete"
    );

    Ok(report)
}
