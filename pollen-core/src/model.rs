use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider-agnostic pollen forecast.
///
/// `data[0]` is today's index, later entries follow chronologically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollenReport {
    pub location: String,
    #[serde(rename = "zip")]
    pub zipcode: String,
    pub predominant_pollen: String,
    #[serde(rename = "startdate")]
    pub start_date: DateTime<Utc>,
    pub data: Vec<f64>,
    #[serde(rename = "service")]
    pub reporting_service: String,
    /// Set by the caller once a report has been selected.
    #[serde(default)]
    pub version: String,
}

impl PollenReport {
    /// A report can only win the race with more than one data point.
    pub fn is_acceptable(&self) -> bool {
        self.data.len() > 1
    }

    pub fn stamp_version(&mut self, build: &str, commit: &str) {
        self.version = format!("{build}.{commit}");
    }
}
