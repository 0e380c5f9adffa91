//! Shared domain types for EDP
//!
//! The region dimension catalog and the canonical eviction filing record used
//! by both the loader (write path) and the server (read path).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Geographic aggregation dimensions recognized by the platform.
///
/// This is a closed catalog: a public region name that does not resolve here
/// is rejected input, never passed through as a raw column reference. Each
/// variant maps a public region name (used in query strings) to the internal
/// dimension key stored in the `region_ids` JSONB column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Counties,
    Tracts,
    Zips,
    Cities,
    Districts,
    Courts,
    AttendanceEl,
    AttendanceMi,
    AttendanceHi,
}

impl Region {
    /// All regions in catalog order. Filter construction iterates this so
    /// generated SQL is deterministic.
    pub const ALL: [Region; 9] = [
        Region::Zips,
        Region::Counties,
        Region::Tracts,
        Region::Cities,
        Region::Districts,
        Region::AttendanceEl,
        Region::AttendanceMi,
        Region::AttendanceHi,
        Region::Courts,
    ];

    /// Resolve a public region name (e.g. "counties") to a catalog entry.
    pub fn from_name(name: &str) -> Option<Region> {
        match name {
            "counties" => Some(Region::Counties),
            "tracts" => Some(Region::Tracts),
            "zips" => Some(Region::Zips),
            "cities" => Some(Region::Cities),
            "districts" => Some(Region::Districts),
            "courts" => Some(Region::Courts),
            "attendanceel" => Some(Region::AttendanceEl),
            "attendancemi" => Some(Region::AttendanceMi),
            "attendancehi" => Some(Region::AttendanceHi),
            _ => None,
        }
    }

    /// The public name used in query strings.
    pub fn name(self) -> &'static str {
        match self {
            Region::Counties => "counties",
            Region::Tracts => "tracts",
            Region::Zips => "zips",
            Region::Cities => "cities",
            Region::Districts => "districts",
            Region::Courts => "courts",
            Region::AttendanceEl => "attendanceel",
            Region::AttendanceMi => "attendancemi",
            Region::AttendanceHi => "attendancehi",
        }
    }

    /// The internal dimension key (e.g. "county").
    pub fn dimension_key(self) -> &'static str {
        match self {
            Region::Counties => "county",
            Region::Tracts => "tract",
            Region::Zips => "zip",
            Region::Cities => "city",
            Region::Districts => "council",
            Region::Courts => "precinct",
            Region::AttendanceEl => "elem",
            Region::AttendanceMi => "midd",
            Region::AttendanceHi => "high",
        }
    }

    /// The JSONB key under which per-record ids for this dimension are stored
    /// (e.g. "county_id").
    pub fn column(self) -> &'static str {
        match self {
            Region::Counties => "county_id",
            Region::Tracts => "tract_id",
            Region::Zips => "zip_id",
            Region::Cities => "city_id",
            Region::Districts => "council_id",
            Region::Courts => "precinct_id",
            Region::AttendanceEl => "elem_id",
            Region::AttendanceMi => "midd_id",
            Region::AttendanceHi => "high_id",
        }
    }

    /// Resolve an internal dimension key (e.g. "county") to a catalog entry.
    pub fn from_dimension_key(key: &str) -> Option<Region> {
        Region::ALL
            .into_iter()
            .find(|r| r.dimension_key() == key)
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Canonical eviction filing record.
///
/// - `case_number` is the unique key; duplicates within a file keep the first
///   occurrence only.
/// - `region_ids` maps canonical `<dimension>_id` keys to sanitized numeric
///   string ids. An id that sanitizes to empty is absent, never "" or zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingRecord {
    pub case_number: String,
    pub filing_date: NaiveDate,
    pub amount: Option<f64>,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    pub region_ids: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_from_name_known() {
        assert_eq!(Region::from_name("counties"), Some(Region::Counties));
        assert_eq!(Region::from_name("districts"), Some(Region::Districts));
        assert_eq!(Region::from_name("attendancehi"), Some(Region::AttendanceHi));
    }

    #[test]
    fn test_region_from_name_unknown() {
        assert_eq!(Region::from_name("county"), None);
        assert_eq!(Region::from_name("COUNTIES"), None);
        assert_eq!(Region::from_name(""), None);
    }

    #[test]
    fn test_region_dimension_keys() {
        assert_eq!(Region::Counties.dimension_key(), "county");
        assert_eq!(Region::Districts.dimension_key(), "council");
        assert_eq!(Region::Courts.dimension_key(), "precinct");
        assert_eq!(Region::Counties.column(), "county_id");
    }

    #[test]
    fn test_region_roundtrip_through_dimension_key() {
        for region in Region::ALL {
            assert_eq!(Region::from_dimension_key(region.dimension_key()), Some(region));
        }
    }
}
