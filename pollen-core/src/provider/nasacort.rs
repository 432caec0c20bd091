use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    PollenReport, ProviderError,
    provider::{fetch_json, null_as_default},
};

use super::PollenProvider;

pub const DEFAULT_BASE_URL: &str = "https://www.nasacort.com/wp-json/pollen";

const NAME: &str = "Nasacort";

#[derive(Debug, Clone)]
pub struct NasacortProvider {
    base_url: String,
    http: Client,
}

impl NasacortProvider {
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

impl Default for NasacortProvider {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

// Every value arrives as a string, numbers included.
#[derive(Debug, Deserialize)]
struct NasacortResponse {
    response: NasacortForecast,
}

#[derive(Debug, Deserialize)]
struct NasacortForecast {
    #[serde(default, deserialize_with = "null_as_default")]
    today: String,
    #[serde(default, deserialize_with = "null_as_default")]
    tomorrow: String,
    #[serde(default, deserialize_with = "null_as_default")]
    after_tomorrow: String,
    #[serde(default, deserialize_with = "null_as_default")]
    day_4: String,
    #[serde(default, deserialize_with = "null_as_default")]
    source: String,
    #[serde(default, deserialize_with = "null_as_default")]
    city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    state: String,
}

/// Unparsable scores count as zero instead of failing the call.
fn parse_score(value: &str) -> f64 {
    value.trim().parse().unwrap_or(0.0)
}

#[async_trait]
impl PollenProvider for NasacortProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(name = "nasacort", skip(self))]
    async fn get_pollen_report(&self, zipcode: &str) -> Result<PollenReport, ProviderError> {
        let url = format!("{}/get/", self.base_url);
        debug!(%url, "posting pollen lookup");

        let request = self.http.post(&url).form(&[("zipcode", zipcode)]);
        let parsed: NasacortResponse = fetch_json(NAME, request).await?;
        let forecast = parsed.response;

        let data = [
            forecast.today.as_str(),
            forecast.tomorrow.as_str(),
            forecast.after_tomorrow.as_str(),
            forecast.day_4.as_str(),
        ]
        .into_iter()
        .map(parse_score)
        .collect();

        Ok(PollenReport {
            location: format!("{}, {}", forecast.city, forecast.state),
            zipcode: zipcode.to_string(),
            predominant_pollen: forecast.source,
            start_date: Utc::now(),
            data,
            reporting_service: NAME.to_string(),
            version: String::new(),
        })
    }
}
