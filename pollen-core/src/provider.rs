use crate::{
    Config, PollenReport, ProviderError,
    provider::{
        claritin::ClaritinProvider, nasacort::NasacortProvider, pollencom::PollenComProvider,
        zyrtec::ZyrtecProvider,
    },
};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use std::{fmt::Debug, sync::Arc};
use tracing::debug;

pub mod claritin;
pub mod nasacort;
pub mod pollencom;
pub mod zyrtec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Claritin,
    Nasacort,
    PollenCom,
    Zyrtec,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Claritin => "claritin",
            ProviderId::Nasacort => "nasacort",
            ProviderId::PollenCom => "pollencom",
            ProviderId::Zyrtec => "zyrtec",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[
            ProviderId::Claritin,
            ProviderId::Nasacort,
            ProviderId::PollenCom,
            ProviderId::Zyrtec,
        ]
    }

    /// Claritin is opt-in; the rest race unless disabled in the config.
    pub fn enabled_by_default(&self) -> bool {
        !matches!(self, ProviderId::Claritin)
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderId::Claritin => claritin::DEFAULT_BASE_URL,
            ProviderId::Nasacort => nasacort::DEFAULT_BASE_URL,
            ProviderId::PollenCom => pollencom::DEFAULT_BASE_URL,
            ProviderId::Zyrtec => zyrtec::DEFAULT_BASE_URL,
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "claritin" => Ok(ProviderId::Claritin),
            "nasacort" => Ok(ProviderId::Nasacort),
            "pollencom" | "pollen.com" => Ok(ProviderId::PollenCom),
            "zyrtec" => Ok(ProviderId::Zyrtec),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. \
                 Supported providers: claritin, nasacort, pollencom, zyrtec."
            )),
        }
    }
}

/// A source of pollen forecasts.
///
/// Implementations hold no mutable state, so a single instance may be
/// called concurrently with itself and with any other provider.
#[async_trait]
pub trait PollenProvider: Send + Sync + Debug {
    /// Display name, also reported as the report's `service`.
    fn name(&self) -> &'static str;

    async fn get_pollen_report(&self, zipcode: &str) -> Result<PollenReport, ProviderError>;
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Arc<dyn PollenProvider>> {
    let http = Client::builder()
        .timeout(config.request_timeout())
        .build()
        .with_context(|| format!("Failed to build HTTP client for provider '{id}'"))?;

    let base_url = config.provider_base_url(id);

    let provider: Arc<dyn PollenProvider> = match id {
        ProviderId::Claritin => Arc::new(ClaritinProvider::new(http).with_base_url(base_url)),
        ProviderId::Nasacort => Arc::new(NasacortProvider::new(http).with_base_url(base_url)),
        ProviderId::PollenCom => Arc::new(PollenComProvider::new(http).with_base_url(base_url)),
        ProviderId::Zyrtec => Arc::new(ZyrtecProvider::new(http).with_base_url(base_url)),
    };

    Ok(provider)
}

/// Construct every enabled provider, in `ProviderId::all()` order.
pub fn providers_from_config(config: &Config) -> anyhow::Result<Vec<Arc<dyn PollenProvider>>> {
    let ids: Vec<ProviderId> = ProviderId::all()
        .iter()
        .copied()
        .filter(|id| config.is_provider_enabled(*id))
        .collect();

    if ids.is_empty() {
        return Err(anyhow::anyhow!(
            "No providers are enabled.\n\
             Hint: run `pollen configure` and select at least one provider."
        ));
    }

    ids.into_iter().map(|id| provider_from_config(id, config)).collect()
}

/// Send `request`, reject any status >= 400 and decode the body as JSON.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    let res = request
        .send()
        .await
        .map_err(|source| ProviderError::Transport { provider, source })?;

    let status = res.status();
    debug!(provider, %status, "received response");

    if status.as_u16() >= 400 {
        // The body only decorates the message; a failed read still reports the status.
        let body = res.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            provider,
            status,
            body: truncate_body(&body),
        });
    }

    let body = res
        .text()
        .await
        .map_err(|source| ProviderError::Transport { provider, source })?;

    serde_json::from_str(&body).map_err(|source| ProviderError::Decode { provider, source })
}

/// Reads JSON `null` the same as a missing key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
