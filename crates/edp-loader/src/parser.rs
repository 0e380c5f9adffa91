//! Eviction filing CSV parser
//!
//! Turns a raw delimited extract into an ordered sequence of validated,
//! sanitized [`FilingRecord`]s plus per-reason skip counts.
//!
//! # File format
//! Header-driven CSV. Fixed columns: `case_number`, `date`, `amount`, `lon`,
//! `lat`. Every other column is treated as a geographic-dimension id and is
//! matched against the region catalog (an optional `_id` suffix on the header
//! is accepted).

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

use edp_common::types::{FilingRecord, Region};
use edp_common::{EdpError, Result};

/// Column names that are not geographic dimensions.
const FIXED_COLUMNS: [&str; 5] = ["case_number", "date", "amount", "lon", "lat"];

/// Per-reason counts of rows dropped during parsing.
///
/// Row-level failures are non-fatal: the row is skipped, counted, and
/// processing continues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Rows read from the file (excluding the header).
    pub rows_read: usize,
    /// Rows with an empty `case_number`.
    pub missing_case_number: usize,
    /// Rows with an empty `date`.
    pub missing_date: usize,
    /// Rows whose `date` was present but not a valid `YYYY-MM-DD` date.
    pub invalid_date: usize,
    /// Rows whose `case_number` already occurred earlier in the file.
    pub duplicate_case_number: usize,
}

impl ParseStats {
    /// Total rows dropped for any reason.
    pub fn skipped(&self) -> usize {
        self.missing_case_number
            + self.missing_date
            + self.invalid_date
            + self.duplicate_case_number
    }
}

/// Result of parsing one extract file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Validated records in file order. For duplicate case numbers only the
    /// first occurrence is kept.
    pub records: Vec<FilingRecord>,
    pub stats: ParseStats,
}

/// Parse a CSV extract into canonical filing records.
///
/// Row order is preserved. Rules are evaluated per row in order; the first
/// failure skips the row with a logged reason:
///
/// 1. `case_number` present and non-empty
/// 2. `date` present, non-empty, and a valid ISO date
/// 3. `case_number` not already seen earlier in this file
pub fn parse_filings(content: &str) -> Result<ParsedFile> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| EdpError::Parse(format!("failed to read CSV header row: {e}")))?
        .clone();

    // Resolve each non-fixed header against the region catalog once.
    let mut dimension_columns: Vec<(usize, Region)> = Vec::new();
    let mut unknown_columns: HashSet<String> = HashSet::new();
    for (idx, header) in headers.iter().enumerate() {
        let header = header.trim();
        if FIXED_COLUMNS.contains(&header) {
            continue;
        }
        let key = header.strip_suffix("_id").unwrap_or(header);
        match Region::from_dimension_key(key) {
            Some(region) => dimension_columns.push((idx, region)),
            None => {
                unknown_columns.insert(header.to_string());
            },
        }
    }

    if !unknown_columns.is_empty() {
        let mut columns: Vec<_> = unknown_columns.into_iter().collect();
        columns.sort();
        warn!(columns = ?columns, "ignoring columns not in the region catalog");
    }

    let field =
        |idx: Option<usize>, row: &csv::StringRecord| -> String {
            idx.and_then(|i| row.get(i)).unwrap_or("").trim().to_string()
        };

    let case_number_idx = headers.iter().position(|h| h.trim() == "case_number");
    let date_idx = headers.iter().position(|h| h.trim() == "date");
    let amount_idx = headers.iter().position(|h| h.trim() == "amount");
    let lon_idx = headers.iter().position(|h| h.trim() == "lon");
    let lat_idx = headers.iter().position(|h| h.trim() == "lat");

    let mut records = Vec::new();
    let mut stats = ParseStats::default();
    let mut seen: HashSet<String> = HashSet::new();

    for row in reader.records() {
        let row = row
            .map_err(|e| EdpError::Parse(format!("failed to read row {}: {e}", stats.rows_read + 1)))?;
        stats.rows_read += 1;

        let case_number = field(case_number_idx, &row);
        if case_number.is_empty() {
            stats.missing_case_number += 1;
            warn!(row = stats.rows_read, "skipping row, missing case_number");
            continue;
        }

        let date = field(date_idx, &row);
        if date.is_empty() {
            stats.missing_date += 1;
            warn!(row = stats.rows_read, case_number = %case_number, "skipping row, missing date");
            continue;
        }
        let filing_date = match NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
                stats.invalid_date += 1;
                warn!(
                    row = stats.rows_read,
                    case_number = %case_number,
                    date = %date,
                    "skipping row, invalid date"
                );
                continue;
            },
        };

        // First occurrence wins.
        if seen.contains(&case_number) {
            stats.duplicate_case_number += 1;
            warn!(row = stats.rows_read, case_number = %case_number, "skipping row, duplicate case_number");
            continue;
        }

        let mut region_ids = BTreeMap::new();
        for &(idx, region) in &dimension_columns {
            let raw = row.get(idx).unwrap_or("");
            if let Some(id) = sanitize_dimension_id(raw) {
                region_ids.insert(region.column().to_string(), id);
            }
        }

        seen.insert(case_number.clone());
        records.push(FilingRecord {
            case_number,
            filing_date,
            amount: parse_decimal(&field(amount_idx, &row)),
            lon: parse_decimal(&field(lon_idx, &row)),
            lat: parse_decimal(&field(lat_idx, &row)),
            region_ids,
        });
    }

    Ok(ParsedFile { records, stats })
}

/// Strip all non-digit characters from a raw dimension id.
///
/// An empty result means the id is absent; it is never stored as "" or zero.
fn sanitize_dimension_id(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

fn parse_decimal(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_file() {
        let csv = "case_number,date,amount,lon,lat,county_id\n\
                   A1,2021-02-01,500.00,-96.8,32.78,48201\n\
                   A2,2021-02-02,,,,48113\n";

        let parsed = parse_filings(csv).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.stats.skipped(), 0);

        let first = &parsed.records[0];
        assert_eq!(first.case_number, "A1");
        assert_eq!(first.filing_date, NaiveDate::from_ymd_opt(2021, 2, 1).unwrap());
        assert_eq!(first.amount, Some(500.0));
        assert_eq!(first.region_ids.get("county_id"), Some(&"48201".to_string()));

        let second = &parsed.records[1];
        assert_eq!(second.amount, None);
        assert_eq!(second.lon, None);
    }

    #[test]
    fn test_missing_case_number_skipped() {
        let csv = "case_number,date,county_id\n\
                   ,2021-02-01,48201\n\
                   A1,2021-02-01,48201\n";

        let parsed = parse_filings(csv).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.stats.missing_case_number, 1);
    }

    #[test]
    fn test_missing_date_skipped() {
        let csv = "case_number,date,county_id\n\
                   A1,,48201\n";

        let parsed = parse_filings(csv).unwrap();
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.stats.missing_date, 1);
    }

    #[test]
    fn test_invalid_date_skipped() {
        let csv = "case_number,date\n\
                   A1,02/01/2021\n\
                   A2,2021-02-01\n";

        let parsed = parse_filings(csv).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.stats.invalid_date, 1);
        assert_eq!(parsed.records[0].case_number, "A2");
    }

    #[test]
    fn test_duplicate_case_number_first_wins() {
        let csv = "case_number,date,county_id\n\
                   A1,2021-02-01,48201\n\
                   A1,2021-02-02,48113\n";

        let parsed = parse_filings(csv).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.stats.duplicate_case_number, 1);
        // First occurrence by file order is retained.
        assert_eq!(
            parsed.records[0].filing_date,
            NaiveDate::from_ymd_opt(2021, 2, 1).unwrap()
        );
        assert_eq!(parsed.records[0].region_ids.get("county_id"), Some(&"48201".to_string()));
    }

    #[test]
    fn test_dimension_ids_sanitized_to_digits() {
        let csv = "case_number,date,tract_id,zip_id\n\
                   A1,2021-02-01,48-113.0205,TX75201\n";

        let parsed = parse_filings(csv).unwrap();
        let record = &parsed.records[0];
        assert_eq!(record.region_ids.get("tract_id"), Some(&"481130205".to_string()));
        assert_eq!(record.region_ids.get("zip_id"), Some(&"75201".to_string()));
    }

    #[test]
    fn test_empty_dimension_id_absent_not_zero() {
        let csv = "case_number,date,county_id,city_id\n\
                   A1,2021-02-01,N/A,\n";

        let parsed = parse_filings(csv).unwrap();
        let record = &parsed.records[0];
        assert!(record.region_ids.is_empty());
    }

    #[test]
    fn test_unknown_columns_ignored() {
        let csv = "case_number,date,plaintiff_name,county_id\n\
                   A1,2021-02-01,Acme Property LLC,48201\n";

        let parsed = parse_filings(csv).unwrap();
        let record = &parsed.records[0];
        assert_eq!(record.region_ids.len(), 1);
        assert_eq!(record.region_ids.get("county_id"), Some(&"48201".to_string()));
    }

    #[test]
    fn test_header_without_id_suffix_resolves() {
        let csv = "case_number,date,county\n\
                   A1,2021-02-01,48201\n";

        let parsed = parse_filings(csv).unwrap();
        // Stored under the canonical column key regardless of header form.
        assert_eq!(
            parsed.records[0].region_ids.get("county_id"),
            Some(&"48201".to_string())
        );
    }

    #[test]
    fn test_row_order_preserved() {
        let csv = "case_number,date\n\
                   C3,2021-03-01\n\
                   A1,2021-01-01\n\
                   B2,2021-02-01\n";

        let parsed = parse_filings(csv).unwrap();
        let order: Vec<_> = parsed.records.iter().map(|r| r.case_number.as_str()).collect();
        assert_eq!(order, vec!["C3", "A1", "B2"]);
    }
}
