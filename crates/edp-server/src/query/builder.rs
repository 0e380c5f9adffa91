//! SQL generation for the aggregate endpoints
//!
//! Every user-supplied value travels as a positional bind. The only text
//! interpolated into SQL is the table name (validated at config load) and
//! the region column names, which come from the closed catalog.

use chrono::NaiveDate;

use edp_common::types::Region;

use super::params::{EvictionQuery, LocationsQuery};

/// A value bound at a `$n` placeholder, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Date(NaiveDate),
    Text(String),
}

/// A rendered statement plus its ordered bind list.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub binds: Vec<BindValue>,
}

/// Builds the aggregate statements against one active table.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: String,
}

impl QueryBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into() }
    }

    /// Totals over the date range, grouped by region when one is given.
    /// The `location` parameter is not consulted here; only the time-series
    /// shape filters on it.
    pub fn summary(&self, query: &EvictionQuery) -> BuiltQuery {
        let binds = vec![BindValue::Date(query.start), BindValue::Date(query.end)];
        let filter = "filing_date BETWEEN $1 AND $2";

        let sql = match query.region {
            Some(region) => {
                let col = region.column();
                format!(
                    "SELECT region_ids->>'{col}' AS {col}, \
                     COUNT(case_number) AS filings, \
                     (percentile_cont(0.5) WITHIN GROUP (ORDER BY amount))::float8 AS median_filed_amount, \
                     SUM(amount)::float8 AS total_filed_amount \
                     FROM {table} WHERE {filter} \
                     GROUP BY {col} ORDER BY filings DESC",
                    table = self.table,
                )
            }
            None => format!(
                "SELECT COUNT(case_number) AS filings, \
                 (percentile_cont(0.5) WITHIN GROUP (ORDER BY amount))::float8 AS median_filed_amount, \
                 SUM(amount)::float8 AS total_filed_amount \
                 FROM {table} WHERE {filter}",
                table = self.table,
            ),
        };

        BuiltQuery { sql, binds }
    }

    /// Per-day totals over the date range, grouped by region when one is given.
    pub fn filings(&self, query: &EvictionQuery) -> BuiltQuery {
        let mut binds = vec![BindValue::Date(query.start), BindValue::Date(query.end)];
        let mut filter = String::from("filing_date BETWEEN $1 AND $2");
        if let (Some(region), Some(location)) = (query.region, &query.location) {
            filter.push_str(&format!(" AND region_ids->>'{}' = $3", region.column()));
            binds.push(BindValue::Text(location.clone()));
        }

        let sql = match query.region {
            Some(region) => {
                let col = region.column();
                format!(
                    "SELECT region_ids->>'{col}' AS {col}, filing_date AS date, \
                     COUNT(case_number) AS filings, \
                     (percentile_cont(0.5) WITHIN GROUP (ORDER BY amount))::float8 AS median_filed_amount, \
                     SUM(amount)::float8 AS total_filed_amount \
                     FROM {table} WHERE {filter} \
                     GROUP BY {col}, date ORDER BY date DESC",
                    table = self.table,
                )
            }
            None => format!(
                "SELECT filing_date AS date, \
                 COUNT(case_number) AS filings, \
                 (percentile_cont(0.5) WITHIN GROUP (ORDER BY amount))::float8 AS median_filed_amount, \
                 SUM(amount)::float8 AS total_filed_amount \
                 FROM {table} WHERE {filter} \
                 GROUP BY date ORDER BY date DESC",
                table = self.table,
            ),
        };

        BuiltQuery { sql, binds }
    }

    /// Per-day totals across an OR of per-dimension id lists.
    pub fn locations(&self, query: &LocationsQuery) -> BuiltQuery {
        let mut binds: Vec<BindValue> =
            vec![BindValue::Date(query.start), BindValue::Date(query.end)];

        let mut clauses = Vec::new();
        for (region, ids) in &query.filters {
            let placeholders: Vec<String> = ids
                .iter()
                .map(|id| {
                    binds.push(BindValue::Text(id.clone()));
                    format!("${}", binds.len())
                })
                .collect();
            clauses.push(format!(
                "region_ids->>'{}' IN ({})",
                region.column(),
                placeholders.join(", ")
            ));
        }

        let mut filter = String::from("(filing_date BETWEEN $1 AND $2)");
        if !clauses.is_empty() {
            filter.push_str(&format!(" AND ({})", clauses.join(" OR ")));
        }

        let sql = format!(
            "SELECT filing_date AS date, \
             COUNT(case_number) AS filings, \
             (percentile_cont(0.5) WITHIN GROUP (ORDER BY amount))::float8 AS median_filed_amount, \
             SUM(amount)::float8 AS total_filed_amount \
             FROM {table} WHERE {filter} \
             GROUP BY date ORDER BY date DESC",
            table = self.table,
        );

        BuiltQuery { sql, binds }
    }

    /// Dataset-wide bounds: row count plus first and last filing dates.
    pub fn meta(&self) -> BuiltQuery {
        BuiltQuery {
            sql: format!(
                "SELECT COUNT(case_number) AS filings, \
                 MAX(filing_date) AS last_filing, \
                 MIN(filing_date) AS first_filing \
                 FROM {}",
                self.table
            ),
            binds: Vec::new(),
        }
    }

    /// Distinct values of one region dimension across the whole table.
    pub fn distinct_values(&self, region: Region) -> BuiltQuery {
        let col = region.column();
        BuiltQuery {
            sql: format!(
                "SELECT DISTINCT region_ids->>'{col}' AS {col} FROM {table} ORDER BY {col}",
                table = self.table,
            ),
            binds: Vec::new(),
        }
    }
}
