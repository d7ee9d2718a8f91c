use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ApiSettings;

/// Query parameters for the CDO `/data` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQuery {
    pub dataset_id: String,
    pub location_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub limit: u32,
}

impl DataQuery {
    /// Inclusive window ending at `today` and starting `lookback_days` earlier.
    ///
    /// The start saturates at the earliest representable date.
    pub fn for_window(
        dataset_id: impl Into<String>,
        location_id: impl Into<String>,
        today: NaiveDate,
        lookback_days: u32,
        limit: u32,
    ) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            location_id: location_id.into(),
            start_date: today
                .checked_sub_days(Days::new(u64::from(lookback_days)))
                .unwrap_or(NaiveDate::MIN),
            end_date: today,
            limit,
        }
    }

    pub fn from_settings(api: &ApiSettings, today: NaiveDate) -> Self {
        Self::for_window(
            api.dataset_id.as_str(),
            api.location_id.as_str(),
            today,
            api.lookback_days,
            api.limit,
        )
    }

    /// Query pairs in the order the API documents them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("datasetid", self.dataset_id.clone()),
            ("locationid", self.location_id.clone()),
            ("startdate", self.start_date.format("%Y-%m-%d").to_string()),
            ("enddate", self.end_date.format("%Y-%m-%d").to_string()),
            ("limit", self.limit.to_string()),
        ]
    }
}

/// Object key for one day's raw payload, e.g. `noaa_raw/2024-01-01.json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn for_date(prefix: &str, date: NaiveDate) -> Self {
        let prefix = prefix.trim_matches('/');
        let file = format!("{}.json", date.format("%Y-%m-%d"));

        if prefix.is_empty() {
            Self(file)
        } else {
            Self(format!("{prefix}/{file}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Number of records reported by a CDO listing response, if it has the usual shape.
pub fn result_count(body: &Value) -> Option<u64> {
    body.pointer("/metadata/resultset/count")
        .and_then(Value::as_u64)
        .or_else(|| body.get("results").and_then(Value::as_array).map(|r| r.len() as u64))
}
