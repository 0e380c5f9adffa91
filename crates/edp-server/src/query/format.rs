//! Response shaping
//!
//! Database rows come back under their SQL output names; clients receive a
//! compact schema instead: `id` (region value), `date`, `ef` (eviction
//! filings), `mfa` (median filed amount), `tfa` (total filed amount).

use serde_json::{Map, Value};
use thiserror::Error;

use edp_common::types::Region;

use super::executor::JsonRow;
use super::params::OutputFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("empty result set cannot be rendered as csv")]
    EmptyCsv,
}

/// A response body ready to leave the handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Json(Value),
    Csv(String),
}

fn aggregate_fields(src: &JsonRow, dst: &mut JsonRow) {
    dst.insert("ef".into(), src.get("filings").cloned().unwrap_or(Value::Null));
    dst.insert(
        "mfa".into(),
        src.get("median_filed_amount").cloned().unwrap_or(Value::Null),
    );
    dst.insert(
        "tfa".into(),
        src.get("total_filed_amount").cloned().unwrap_or(Value::Null),
    );
}

/// Summary rows: one per region value, or a single `id: "all"` row when the
/// query was not grouped.
pub fn summary_rows(rows: &[JsonRow], region: Option<Region>) -> Vec<JsonRow> {
    rows.iter()
        .map(|src| {
            let mut out = Map::new();
            let id = match region {
                Some(region) => src.get(region.column()).cloned().unwrap_or(Value::Null),
                None => Value::String("all".to_string()),
            };
            out.insert("id".into(), id);
            aggregate_fields(src, &mut out);
            out
        })
        .collect()
}

/// Filings rows: per-day aggregates labelled by region value. An ungrouped
/// query still looks the label up under the county column, so its rows carry
/// a null `id`.
pub fn filings_rows(rows: &[JsonRow], region: Option<Region>) -> Vec<JsonRow> {
    let column = region.unwrap_or(Region::Counties).column();
    rows.iter()
        .map(|src| {
            let mut out = Map::new();
            out.insert("id".into(), src.get(column).cloned().unwrap_or(Value::Null));
            out.insert("date".into(), src.get("date").cloned().unwrap_or(Value::Null));
            aggregate_fields(src, &mut out);
            out
        })
        .collect()
}

/// Locations rows: per-day aggregates over the combined filter, no id.
pub fn locations_rows(rows: &[JsonRow]) -> Vec<JsonRow> {
    rows.iter()
        .map(|src| {
            let mut out = Map::new();
            out.insert("date".into(), src.get("date").cloned().unwrap_or(Value::Null));
            aggregate_fields(src, &mut out);
            out
        })
        .collect()
}

/// Render shaped rows as the requested representation. JSON wraps the rows in
/// an envelope that echoes the request parameters; CSV is bare rows.
pub fn render(
    echo: Map<String, Value>,
    rows: Vec<JsonRow>,
    format: OutputFormat,
) -> Result<Rendered, FormatError> {
    match format {
        OutputFormat::Json => {
            let mut envelope = echo;
            envelope.insert("result".into(), Value::Array(rows.into_iter().map(Value::Object).collect()));
            Ok(Rendered::Json(Value::Object(envelope)))
        }
        OutputFormat::Csv => to_csv(&rows).map(Rendered::Csv),
    }
}

/// Naive CSV: header from the first row's keys, nulls as empty cells, no
/// quoting. Aggregate values never contain commas.
fn to_csv(rows: &[JsonRow]) -> Result<String, FormatError> {
    let first = rows.first().ok_or(FormatError::EmptyCsv)?;
    let mut out = first.keys().cloned().collect::<Vec<_>>().join(",");
    out.push('\n');
    for row in rows {
        let cells: Vec<String> = row.values().map(cell).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    Ok(out)
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
