use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    PollenReport, ProviderError,
    provider::{fetch_json, null_as_default},
};

use super::PollenProvider;

pub const DEFAULT_BASE_URL: &str = "https://www.claritin.com/claritinapi/globalheader";

const NAME: &str = "Claritin";

/// e.g. `4/10/2024 9:30:00 AM`
const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

#[derive(Debug, Clone)]
pub struct ClaritinProvider {
    base_url: String,
    http: Client,
}

impl ClaritinProvider {
    pub fn new(http: Client) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for ClaritinProvider {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaritinResponse {
    pollen_forecast: ClaritinForecast,
}

#[derive(Debug, Deserialize)]
struct ClaritinForecast {
    #[serde(default, deserialize_with = "null_as_default")]
    zip: String,
    #[serde(default, deserialize_with = "null_as_default")]
    city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    state: String,
    #[serde(default, deserialize_with = "null_as_default")]
    forecast: Vec<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    timestamp: String,
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ProviderError> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .map(|ndt| ndt.and_utc())
        .map_err(|source| ProviderError::DateParse {
            provider: NAME,
            value: value.to_string(),
            source,
        })
}

#[async_trait]
impl PollenProvider for ClaritinProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(name = "claritin", skip(self))]
    async fn get_pollen_report(&self, zipcode: &str) -> Result<PollenReport, ProviderError> {
        let url = format!("{}/getallergyforecastdata", self.base_url);
        debug!(%url, "requesting allergy forecast");

        let request = self.http.get(&url).query(&[("zipcode", zipcode)]);
        let parsed: ClaritinResponse = fetch_json(NAME, request).await?;
        let forecast = parsed.pollen_forecast;

        let start_date = parse_timestamp(&forecast.timestamp)?;

        Ok(PollenReport {
            location: format!("{}, {}", forecast.city, forecast.state),
            zipcode: forecast.zip,
            predominant_pollen: forecast.pp,
            start_date,
            data: forecast.forecast,
            reporting_service: NAME.to_string(),
            version: String::new(),
        })
    }
}
