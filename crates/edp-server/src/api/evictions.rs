//! Aggregate query handlers

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use tracing::instrument;

use edp_common::types::Region;

use crate::api::response::ApiError;
use crate::api::AppState;
use crate::query::format::{filings_rows, locations_rows, render, summary_rows};
use crate::query::params::{RawLocationsParams, RawParams};

/// `GET /summary` - filings, median and total filed amounts over the date
/// range, one row per region value (or a single `id: "all"` row).
#[instrument(skip(state))]
pub async fn get_summary(
    State(state): State<AppState>,
    Query(raw): Query<RawParams>,
) -> Result<Response, ApiError> {
    let query = raw.validate()?;
    let built = state.builder.summary(&query);
    let rows = state.executor.execute(&built).await?;
    let shaped = summary_rows(&rows, query.region);
    Ok(render(query.echo(), shaped, query.format)?.into_response())
}

/// `GET /filings` - the summary aggregates as a daily time series, newest
/// day first.
#[instrument(skip(state))]
pub async fn get_filings(
    State(state): State<AppState>,
    Query(raw): Query<RawParams>,
) -> Result<Response, ApiError> {
    let query = raw.validate()?;
    let built = state.builder.filings(&query);
    let rows = state.executor.execute(&built).await?;
    let shaped = filings_rows(&rows, query.region);
    Ok(render(query.echo(), shaped, query.format)?.into_response())
}

/// `GET /locations` - daily aggregates across an ad-hoc set of locations,
/// one comma-separated id list per region parameter, OR-ed together.
#[instrument(skip(state))]
pub async fn get_locations(
    State(state): State<AppState>,
    Query(raw): Query<RawLocationsParams>,
) -> Result<Response, ApiError> {
    let query = raw.validate()?;
    let built = state.builder.locations(&query);
    let rows = state.executor.execute(&built).await?;
    let shaped = locations_rows(&rows);
    Ok(render(query.echo(), shaped, query.format)?.into_response())
}

/// `GET /meta` - record count plus the first and last filing dates, as a
/// bare single-row array.
#[instrument(skip(state))]
pub async fn get_meta(State(state): State<AppState>) -> Result<Response, ApiError> {
    let built = state.builder.meta();
    let rows = state.executor.execute(&built).await?;
    Ok(Json(Value::Array(rows.into_iter().map(Value::Object).collect())).into_response())
}

/// `GET /precincts` - distinct court precinct ids, as a bare array.
#[instrument(skip(state))]
pub async fn get_precincts(State(state): State<AppState>) -> Result<Response, ApiError> {
    let built = state.builder.distinct_values(Region::Courts);
    let rows = state.executor.execute(&built).await?;
    Ok(Json(Value::Array(rows.into_iter().map(Value::Object).collect())).into_response())
}
