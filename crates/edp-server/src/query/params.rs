//! Request parameter parsing and validation
//!
//! Parameters are checked in fixed order (region, location, start, end),
//! short-circuiting at the first failure so clients always get one specific
//! per-field reason.

use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;

use edp_common::types::Region;

/// Default start of the queryable range.
pub const DEFAULT_START: &str = "2021-01-01";

fn date_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static regex"))
}

fn location_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r"^\d+$").expect("static regex"))
}

/// A parameter failed validation. The display string is the machine-readable
/// reason returned in the 400 body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("invalid region")]
    InvalidRegion,
    #[error("invalid location")]
    InvalidLocation,
    #[error("invalid start date")]
    InvalidStart,
    #[error("invalid end date")]
    InvalidEnd,
}

/// Requested response representation. Anything other than `csv` renders JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl OutputFormat {
    fn from_param(param: Option<&str>) -> Self {
        if param == Some("csv") {
            OutputFormat::Csv
        } else {
            OutputFormat::Json
        }
    }
}

/// Raw query string for `/summary` and `/filings`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub region: Option<String>,
    pub location: Option<String>,
    pub format: Option<String>,
}

/// Validated parameters for the summary and filings endpoints.
#[derive(Debug, Clone)]
pub struct EvictionQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub region: Option<Region>,
    pub location: Option<String>,
    pub format: OutputFormat,
}

impl RawParams {
    /// Validate in fixed order: region, location, start, end.
    pub fn validate(&self) -> Result<EvictionQuery, ParamError> {
        let region = match self.region.as_deref() {
            None => None,
            Some(name) => Some(Region::from_name(name).ok_or(ParamError::InvalidRegion)?),
        };

        let location = match self.location.as_deref() {
            None => None,
            Some(id) if location_pattern().is_match(id) => Some(id.to_string()),
            Some(_) => return Err(ParamError::InvalidLocation),
        };

        let start = parse_date(self.start.as_deref(), DEFAULT_START, ParamError::InvalidStart)?;
        let end = parse_date(
            self.end.as_deref(),
            &Utc::now().date_naive().format("%Y-%m-%d").to_string(),
            ParamError::InvalidEnd,
        )?;

        Ok(EvictionQuery {
            start,
            end,
            region,
            location,
            format: OutputFormat::from_param(self.format.as_deref()),
        })
    }
}

impl EvictionQuery {
    /// The input parameters echoed back in JSON responses.
    pub fn echo(&self) -> Map<String, Value> {
        let mut echo = Map::new();
        echo.insert("start".into(), Value::String(self.start.format("%Y-%m-%d").to_string()));
        echo.insert("end".into(), Value::String(self.end.format("%Y-%m-%d").to_string()));
        if let Some(region) = self.region {
            echo.insert("region".into(), Value::String(region.name().to_string()));
        }
        if let Some(location) = &self.location {
            echo.insert("location".into(), Value::String(location.clone()));
        }
        echo
    }
}

/// Raw query string for `/locations`: one comma-separated id list per region
/// name, OR-ed across dimensions at query time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLocationsParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub format: Option<String>,
    pub zips: Option<String>,
    pub counties: Option<String>,
    pub tracts: Option<String>,
    pub cities: Option<String>,
    pub districts: Option<String>,
    pub attendanceel: Option<String>,
    pub attendancemi: Option<String>,
    pub attendancehi: Option<String>,
    pub courts: Option<String>,
}

/// Validated parameters for the locations endpoint.
#[derive(Debug, Clone)]
pub struct LocationsQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Per-dimension id lists in catalog order.
    pub filters: Vec<(Region, Vec<String>)>,
    pub format: OutputFormat,
}

impl RawLocationsParams {
    pub fn validate(&self) -> Result<LocationsQuery, ParamError> {
        let start = parse_date(self.start.as_deref(), DEFAULT_START, ParamError::InvalidStart)?;
        let end = parse_date(
            self.end.as_deref(),
            &Utc::now().date_naive().format("%Y-%m-%d").to_string(),
            ParamError::InvalidEnd,
        )?;

        let mut filters = Vec::new();
        for region in Region::ALL {
            if let Some(raw) = self.list_for(region) {
                let ids: Vec<String> = raw
                    .split(',')
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect();
                if !ids.is_empty() {
                    filters.push((region, ids));
                }
            }
        }

        Ok(LocationsQuery {
            start,
            end,
            filters,
            format: OutputFormat::from_param(self.format.as_deref()),
        })
    }

    fn list_for(&self, region: Region) -> Option<&str> {
        match region {
            Region::Zips => self.zips.as_deref(),
            Region::Counties => self.counties.as_deref(),
            Region::Tracts => self.tracts.as_deref(),
            Region::Cities => self.cities.as_deref(),
            Region::Districts => self.districts.as_deref(),
            Region::AttendanceEl => self.attendanceel.as_deref(),
            Region::AttendanceMi => self.attendancemi.as_deref(),
            Region::AttendanceHi => self.attendancehi.as_deref(),
            Region::Courts => self.courts.as_deref(),
        }
    }
}

impl LocationsQuery {
    pub fn echo(&self) -> Map<String, Value> {
        let mut echo = Map::new();
        echo.insert("start".into(), Value::String(self.start.format("%Y-%m-%d").to_string()));
        echo.insert("end".into(), Value::String(self.end.format("%Y-%m-%d").to_string()));
        for (region, ids) in &self.filters {
            echo.insert(region.name().to_string(), Value::String(ids.join(",")));
        }
        echo
    }
}

fn parse_date(raw: Option<&str>, default: &str, err: ParamError) -> Result<NaiveDate, ParamError> {
    let text = raw.unwrap_or(default);
    if !date_pattern().is_match(text) {
        return Err(err);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let q = RawParams::default().validate().unwrap();
        assert_eq!(q.start, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(q.end, Utc::now().date_naive());
        assert_eq!(q.region, None);
        assert_eq!(q.format, OutputFormat::Json);
    }

    #[test]
    fn test_unknown_region_rejected() {
        let raw = RawParams {
            region: Some("neighborhoods".to_string()),
            ..Default::default()
        };
        assert_eq!(raw.validate().unwrap_err(), ParamError::InvalidRegion);
    }

    #[test]
    fn test_location_must_be_numeric() {
        let raw = RawParams {
            location: Some("48113".to_string()),
            ..Default::default()
        };
        assert_eq!(raw.validate().unwrap().location, Some("48113".to_string()));

        let raw = RawParams {
            location: Some("48113;--".to_string()),
            ..Default::default()
        };
        assert_eq!(raw.validate().unwrap_err(), ParamError::InvalidLocation);
    }

    #[test]
    fn test_date_shape_enforced() {
        let raw = RawParams {
            start: Some("2021-1-1".to_string()),
            ..Default::default()
        };
        assert_eq!(raw.validate().unwrap_err(), ParamError::InvalidStart);

        let raw = RawParams {
            end: Some("not-a-date".to_string()),
            ..Default::default()
        };
        assert_eq!(raw.validate().unwrap_err(), ParamError::InvalidEnd);
    }

    #[test]
    fn test_validation_order_region_first() {
        // Both region and start are bad; the region failure must win.
        let raw = RawParams {
            region: Some("bogus".to_string()),
            start: Some("bogus".to_string()),
            ..Default::default()
        };
        assert_eq!(raw.validate().unwrap_err(), ParamError::InvalidRegion);
    }

    #[test]
    fn test_validation_order_location_before_dates() {
        let raw = RawParams {
            location: Some("abc".to_string()),
            start: Some("bogus".to_string()),
            ..Default::default()
        };
        assert_eq!(raw.validate().unwrap_err(), ParamError::InvalidLocation);
    }

    #[test]
    fn test_inverted_range_accepted() {
        // start > end is valid input; the query just matches nothing.
        let raw = RawParams {
            start: Some("2022-01-01".to_string()),
            end: Some("2021-01-01".to_string()),
            ..Default::default()
        };
        assert!(raw.validate().is_ok());
    }

    #[test]
    fn test_format_param() {
        let raw = RawParams {
            format: Some("csv".to_string()),
            ..Default::default()
        };
        assert_eq!(raw.validate().unwrap().format, OutputFormat::Csv);

        // Unknown formats fall back to JSON.
        let raw = RawParams {
            format: Some("xml".to_string()),
            ..Default::default()
        };
        assert_eq!(raw.validate().unwrap().format, OutputFormat::Json);
    }

    #[test]
    fn test_locations_filters_in_catalog_order() {
        let raw = RawLocationsParams {
            counties: Some("48113,48085".to_string()),
            zips: Some("75201".to_string()),
            ..Default::default()
        };
        let q = raw.validate().unwrap();
        assert_eq!(q.filters.len(), 2);
        assert_eq!(q.filters[0].0, Region::Zips);
        assert_eq!(q.filters[0].1, vec!["75201"]);
        assert_eq!(q.filters[1].0, Region::Counties);
        assert_eq!(q.filters[1].1, vec!["48113", "48085"]);
    }

    #[test]
    fn test_echo_includes_given_params_only() {
        let raw = RawParams {
            region: Some("counties".to_string()),
            start: Some("2021-01-01".to_string()),
            end: Some("2021-12-31".to_string()),
            ..Default::default()
        };
        let echo = raw.validate().unwrap().echo();
        assert_eq!(echo.get("start").unwrap(), "2021-01-01");
        assert_eq!(echo.get("region").unwrap(), "counties");
        assert!(!echo.contains_key("location"));
    }
}
