use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single provider call.
///
/// The aggregator treats every variant the same way: the provider simply
/// does not take part in the race.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection, DNS, timeout or body-read failure.
    #[error("There was a problem calling {provider} API: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} API request failed with status {status}: {body}")]
    Status {
        provider: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("Failed to decode {provider} API response: {source}")]
    Decode {
        provider: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse date '{value}' from {provider} API: {source}")]
    DateParse {
        provider: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl ProviderError {
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Transport { provider, .. }
            | Self::Status { provider, .. }
            | Self::Decode { provider, .. }
            | Self::DateParse { provider, .. } => provider,
        }
    }
}
