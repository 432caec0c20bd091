//! Races every configured provider and keeps the first usable report.
//!
//! Each provider runs in its own task. The first task to finish with a
//! report holding more than one data point wins; the remaining tasks are
//! aborted when the join set is dropped. Provider errors, thin reports and
//! panics only remove that provider from the race.
//!
//! There is no "all providers failed" result: when nobody qualifies the
//! race waits forever. Callers that need a bound wrap the call in
//! [`tokio::time::timeout`].

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{Instrument, Span, debug, info, instrument, warn};

use crate::{PollenReport, provider::PollenProvider};

#[derive(Debug, Clone, Default)]
pub struct PollenAggregator {
    providers: Vec<Arc<dyn PollenProvider>>,
}

impl PollenAggregator {
    pub fn new(providers: Vec<Arc<dyn PollenProvider>>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &[Arc<dyn PollenProvider>] {
        &self.providers
    }

    /// Never returns if no provider produces an acceptable report.
    #[instrument(skip(self), fields(providers = self.providers.len()))]
    pub async fn get_pollen_report(&self, zipcode: &str) -> PollenReport {
        let mut tasks = JoinSet::new();

        for provider in &self.providers {
            let provider = Arc::clone(provider);
            let zipcode = zipcode.to_owned();

            // Keep provider spans nested under this race.
            tasks.spawn(
                async move {
                    let result = provider.get_pollen_report(&zipcode).await;
                    (provider.name(), result)
                }
                .instrument(Span::current()),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(report))) if report.is_acceptable() => {
                    info!(provider = name, points = report.data.len(), "provider won the race");
                    return report;
                }
                Ok((name, Ok(report))) => {
                    debug!(
                        provider = name,
                        points = report.data.len(),
                        "report has too few data points"
                    );
                }
                Ok((name, Err(err))) => {
                    warn!(provider = name, error = %err, "provider failed");
                }
                Err(err) => {
                    warn!(error = %err, "provider task did not complete");
                }
            }
        }

        warn!(%zipcode, "no provider returned an acceptable report");
        std::future::pending::<PollenReport>().await
    }
}
