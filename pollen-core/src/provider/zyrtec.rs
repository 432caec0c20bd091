use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    PollenReport, ProviderError,
    provider::{fetch_json, null_as_default},
};

use super::PollenProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.allergycastapp.com/allergies";

const NAME: &str = "Zyrtec";

#[derive(Debug, Clone)]
pub struct ZyrtecProvider {
    base_url: String,
    http: Client,
}

impl ZyrtecProvider {
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

impl Default for ZyrtecProvider {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZyrtecResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    predominant_pollen: String,
    #[serde(default, deserialize_with = "null_as_default")]
    location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    zipcode: String,
    #[serde(default, deserialize_with = "null_as_default")]
    date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    forecast: ZyrtecForecast,
}

#[derive(Debug, Default, Deserialize)]
struct ZyrtecForecast {
    #[serde(default, deserialize_with = "null_as_default")]
    extended: Vec<ZyrtecDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZyrtecDay {
    #[serde(default, deserialize_with = "null_as_default")]
    pollen_score: f64,
}

fn parse_date(value: &str) -> Result<DateTime<Utc>, ProviderError> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|source| {
        ProviderError::DateParse {
            provider: NAME,
            value: value.to_string(),
            source,
        }
    })?;

    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

#[async_trait]
impl PollenProvider for ZyrtecProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(name = "zyrtec", skip(self))]
    async fn get_pollen_report(&self, zipcode: &str) -> Result<PollenReport, ProviderError> {
        let url = format!("{}/dashboard/{}", self.base_url, zipcode);
        debug!(%url, "requesting allergy dashboard");

        let parsed: ZyrtecResponse = fetch_json(NAME, self.http.get(&url)).await?;

        let start_date = parse_date(&parsed.date)?;

        // Zero means "no score" here, so those days are left out entirely.
        let data = parsed
            .forecast
            .extended
            .iter()
            .map(|day| day.pollen_score)
            .filter(|score| *score != 0.0)
            .collect();

        Ok(PollenReport {
            location: parsed.location,
            zipcode: parsed.zipcode,
            predominant_pollen: parsed.predominant_pollen,
            start_date,
            data,
            reporting_service: NAME.to_string(),
            version: String::new(),
        })
    }
}
