//! Pollen.com rejects requests that don't look like they come from its own
//! web page, so both calls carry a desktop browser User-Agent and a Referer.
//!
//! The daily indices come from the extended forecast; the predominant pollen
//! is only available from the current conditions endpoint, hence two calls.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{
    Client, RequestBuilder,
    header::{ACCEPT, REFERER, USER_AGENT},
};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    PollenReport, ProviderError,
    provider::{fetch_json, null_as_default},
};

use super::PollenProvider;

pub const DEFAULT_BASE_URL: &str = "https://www.pollen.com/api/forecast";

const NAME: &str = "Pollen.com";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/65.0.3325.146 Safari/537.36";

/// Today, tomorrow, the day after and day 4.
const FORECAST_DAYS: usize = 4;

#[derive(Debug, Clone)]
pub struct PollenComProvider {
    base_url: String,
    http: Client,
}

impl PollenComProvider {
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

    fn browser_get(&self, url: &str) -> RequestBuilder {
        self.http
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, "application/json")
            .header(REFERER, url)
    }

    async fn fetch_extended(&self, zipcode: &str) -> Result<PcResponse<PcPeriod>, ProviderError> {
        let url = format!("{}/extended/pollen/{}", self.base_url, zipcode);
        debug!(%url, "requesting extended forecast");
        fetch_json(NAME, self.browser_get(&url)).await
    }

    async fn fetch_current(
        &self,
        zipcode: &str,
    ) -> Result<PcResponse<PcCurrentPeriod>, ProviderError> {
        let url = format!("{}/current/pollen/{}", self.base_url, zipcode);
        debug!(%url, "requesting current conditions");
        fetch_json(NAME, self.browser_get(&url)).await
    }
}

impl Default for PollenComProvider {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PcResponse<P> {
    #[serde(default)]
    forecast_date: Option<String>,
    location: PcLocation<P>,
}

// `Vec<P>` is `Default` for any `P`, so only `Deserialize` is required of it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", bound(deserialize = "P: Deserialize<'de>"))]
struct PcLocation<P> {
    #[serde(default, deserialize_with = "null_as_default")]
    city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    state: String,
    #[serde(rename = "periods", default, deserialize_with = "null_as_default")]
    periods: Vec<P>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PcPeriod {
    #[serde(default, deserialize_with = "null_as_default")]
    index: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PcCurrentPeriod {
    #[serde(default, deserialize_with = "null_as_default")]
    triggers: Vec<PcTrigger>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PcTrigger {
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
}

/// `ForecastDate` looks like `2024-04-10T00:00:00-04:00`; only the date is kept.
/// Falls back to the call time when missing or malformed.
fn start_date(forecast_date: Option<&str>) -> DateTime<Utc> {
    forecast_date
        .and_then(|value| value.get(..10))
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
        .unwrap_or_else(Utc::now)
}

fn predominant_pollen(periods: &[PcCurrentPeriod]) -> String {
    periods
        .first()
        .map(|period| {
            period
                .triggers
                .iter()
                .map(|trigger| trigger.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

#[async_trait]
impl PollenProvider for PollenComProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(name = "pollencom", skip(self))]
    async fn get_pollen_report(&self, zipcode: &str) -> Result<PollenReport, ProviderError> {
        let extended = self.fetch_extended(zipcode).await?;

        let data = extended
            .location
            .periods
            .iter()
            .take(FORECAST_DAYS)
            .map(|period| period.index)
            .collect();

        // A failed current conditions call fails the whole report.
        let current = self.fetch_current(zipcode).await?;

        Ok(PollenReport {
            location: format!("{}, {}", extended.location.city, extended.location.state),
            zipcode: zipcode.to_string(),
            predominant_pollen: predominant_pollen(&current.location.periods),
            start_date: start_date(extended.forecast_date.as_deref()),
            data,
            reporting_service: NAME.to_string(),
            version: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const EXTENDED: &str = "/api/forecast/extended/pollen/30019";
    const CURRENT: &str = "/api/forecast/current/pollen/30019";

    fn provider(server: &MockServer) -> PollenComProvider {
        PollenComProvider::default().with_base_url(format!("{}/api/forecast", server.uri()))
    }

    fn extended_fixture(indices: &[f64]) -> serde_json::Value {
        let periods: Vec<_> = indices
            .iter()
            .enumerate()
            .map(|(i, index)| {
                json!({ "Period": format!("2024-04-{:02}T00:00:00", 10 + i), "Index": index })
            })
            .collect();

        json!({
            "Type": "pollen",
            "ForecastDate": "2024-04-10T00:00:00-04:00",
            "Location": {
                "ZIP": "30019",
                "City": "DACULA",
                "State": "GA",
                "periods": periods,
                "DisplayLocation": "Dacula, GA"
            }
        })
    }

    fn current_fixture() -> serde_json::Value {
        json!({
            "Type": "pollen",
            "ForecastDate": "2024-04-10T00:00:00-04:00",
            "Location": {
                "ZIP": "30019",
                "City": "DACULA",
                "State": "GA",
                "periods": [
                    {
                        "Triggers": [
                            { "LGID": 272, "Name": "Oak", "Genus": "Quercus" },
                            { "LGID": 280, "Name": "Birch", "Genus": "Betula" },
                            { "LGID": 265, "Name": "Grasses", "Genus": "Griminae" }
                        ],
                        "Period": "2024-04-09T00:00:00",
                        "Type": "Yesterday",
                        "Index": 9.8
                    },
                    {
                        "Triggers": [],
                        "Period": "2024-04-10T00:00:00",
                        "Type": "Today",
                        "Index": 10.1
                    }
                ],
                "DisplayLocation": "Dacula, GA"
            }
        })
    }

    // The exact header matcher splits on commas, which the user agent contains.
    fn browser_user_agent(request: &Request) -> bool {
        request
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            == Some(BROWSER_USER_AGENT)
    }

    async fn mount(server: &MockServer, endpoint: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn combines_extended_and_current_calls() {
        let server = MockServer::start().await;
        let referer = format!("{}{}", server.uri(), EXTENDED);
        Mock::given(method("GET"))
            .and(path(EXTENDED))
            .and(browser_user_agent)
            .and(header("accept", "application/json"))
            .and(header("referer", referer.as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(extended_fixture(&[9.2, 10.1, 8.4, 7.7, 6.0])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(CURRENT))
            .and(browser_user_agent)
            .respond_with(ResponseTemplate::new(200).set_body_json(current_fixture()))
            .expect(1)
            .mount(&server)
            .await;

        let report = provider(&server).get_pollen_report("30019").await.unwrap();

        assert_eq!(report.location, "DACULA, GA");
        assert_eq!(report.zipcode, "30019");
        assert_eq!(report.predominant_pollen, "Oak, Birch, Grasses");
        assert_eq!(report.data, vec![9.2, 10.1, 8.4, 7.7]);
        assert_eq!(report.reporting_service, "Pollen.com");
        assert_eq!(report.start_date, Utc.with_ymd_and_hms(2024, 4, 10, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn short_or_empty_period_lists_do_not_fail() {
        let server = MockServer::start().await;
        mount(&server, EXTENDED, ResponseTemplate::new(200).set_body_json(extended_fixture(&[])))
            .await;
        mount(
            &server,
            CURRENT,
            ResponseTemplate::new(200).set_body_json(json!({ "Location": { "periods": [] } })),
        )
        .await;

        let report = provider(&server).get_pollen_report("30019").await.unwrap();
        assert!(report.data.is_empty());
        assert_eq!(report.predominant_pollen, "");
        assert!(!report.is_acceptable());
    }

    #[tokio::test]
    async fn extended_error_status_fails_without_second_call() {
        for status in [400, 500] {
            let server = MockServer::start().await;
            mount(&server, EXTENDED, ResponseTemplate::new(status)).await;
            Mock::given(method("GET"))
                .and(path(CURRENT))
                .respond_with(ResponseTemplate::new(200).set_body_json(current_fixture()))
                .expect(0)
                .mount(&server)
                .await;

            let err = provider(&server).get_pollen_report("30019").await.unwrap_err();
            assert!(matches!(err, ProviderError::Status { provider: "Pollen.com", .. }));
        }
    }

    #[tokio::test]
    async fn current_error_status_fails_the_report() {
        for status in [400, 500] {
            let server = MockServer::start().await;
            mount(
                &server,
                EXTENDED,
                ResponseTemplate::new(200).set_body_json(extended_fixture(&[1.0, 2.0, 3.0, 4.0])),
            )
            .await;
            mount(&server, CURRENT, ResponseTemplate::new(status).set_body_json(current_fixture()))
                .await;

            let err = provider(&server).get_pollen_report("30019").await.unwrap_err();
            match err {
                ProviderError::Status { status: got, .. } => assert_eq!(got.as_u16(), status),
                other => panic!("expected status error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_decode_error() {
        let server = MockServer::start().await;
        mount(&server, EXTENDED, ResponseTemplate::new(200).set_body_string("[1, 2")).await;

        let err = provider(&server).get_pollen_report("30019").await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode { .. }));
    }

    #[tokio::test]
    async fn current_malformed_json_is_a_decode_error() {
        let server = MockServer::start().await;
        mount(
            &server,
            EXTENDED,
            ResponseTemplate::new(200).set_body_json(extended_fixture(&[1.0, 2.0, 3.0, 4.0])),
        )
        .await;
        let truncated = ResponseTemplate::new(200).set_body_string("{\"Location\": ");
        mount(&server, CURRENT, truncated).await;

        let err = provider(&server).get_pollen_report("30019").await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode { provider: "Pollen.com", .. }));
    }

    #[tokio::test]
    async fn null_indices_and_triggers_read_as_empty() {
        let mut extended = extended_fixture(&[5.5, 6.5]);
        extended["Location"]["periods"][1]["Index"] = serde_json::Value::Null;
        extended["Location"]["State"] = serde_json::Value::Null;

        let server = MockServer::start().await;
        mount(&server, EXTENDED, ResponseTemplate::new(200).set_body_json(extended)).await;
        mount(
            &server,
            CURRENT,
            ResponseTemplate::new(200)
                .set_body_json(json!({ "Location": { "periods": [{ "Triggers": null }] } })),
        )
        .await;

        let report = provider(&server).get_pollen_report("30019").await.unwrap();
        assert_eq!(report.data, vec![5.5, 0.0]);
        assert_eq!(report.location, "DACULA, ");
        assert_eq!(report.predominant_pollen, "");
    }

    #[test]
    fn start_date_falls_back_to_now() {
        let before = Utc::now();
        let fallback = start_date(Some("soon"));
        assert!(fallback >= before);

        let missing = start_date(None);
        assert!(missing >= before);

        assert_eq!(
            start_date(Some("2023-11-02")),
            Utc.with_ymd_and_hms(2023, 11, 2, 0, 0, 0).unwrap()
        );
    }
}
