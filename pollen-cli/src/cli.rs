use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow, bail};
use chrono::Days;
use clap::{Parser, Subcommand};
use inquire::{CustomType, MultiSelect, Text};
use pollen_core::{
    Config, PollenAggregator, PollenProvider, PollenReport, ProviderId,
    provider::{provider_from_config, providers_from_config},
};
use tracing::debug;

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Filled in by the release build.
const COMMIT_ID: &str = match option_env!("POLLEN_COMMIT_ID") {
    Some(id) => id,
    None => "unknown",
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "pollen", version, about = "Pollen forecast CLI")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set, e.g. "debug" or "pollen_core=trace".
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the pollen forecast for a zipcode.
    Show {
        /// US zipcode; falls back to the configured default.
        zipcode: Option<String>,

        /// Race only these providers, e.g. `--provider zyrtec --provider nasacort`.
        #[arg(long = "provider")]
        providers: Vec<String>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the known providers and whether they are enabled.
    Providers,

    /// Interactively choose providers, timeouts and a default zipcode.
    Configure,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };
        let mut config = Config::load_from(&config_path)?;
        debug!(path = %config_path.display(), "loaded configuration");

        match self.command {
            Command::Show { zipcode, providers, json } => {
                show(&config, zipcode, &providers, json).await?;
            }
            Command::Providers => {
                for id in ProviderId::all() {
                    let state = if config.is_provider_enabled(*id) {
                        "enabled"
                    } else {
                        "disabled"
                    };
                    let url = config.provider_base_url(*id);
                    println!("{:<10} {:<9} {url}", id.as_str(), state);
                }
            }
            Command::Configure => {
                configure(&mut config)?;
                config.save_to(&config_path)?;
                println!("Saved configuration to {}", config_path.display());
            }
        }

        Ok(())
    }
}

async fn show(
    config: &Config,
    zipcode: Option<String>,
    provider_names: &[String],
    json: bool,
) -> Result<()> {
    let zipcode = zipcode.or_else(|| config.default_zipcode.clone()).ok_or_else(|| {
        anyhow!(
            "No zipcode given.\n\
             Hint: run `pollen show <zipcode>` or set a default with `pollen configure`."
        )
    })?;

    let aggregator = PollenAggregator::new(select_providers(config, provider_names)?);
    let race = aggregator.get_pollen_report(&zipcode);

    let mut report = match config.race_timeout() {
        Some(limit) => tokio::time::timeout(limit, race).await.map_err(|_| {
            anyhow!(
                "No provider returned a usable report for {zipcode} within {}s",
                limit.as_secs()
            )
        })?,
        None => race.await,
    };

    report.stamp_version(BUILD_VERSION, COMMIT_ID);

    if json {
        let out = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{out}");
    } else {
        println!("{}", format_report(&report));
    }

    Ok(())
}

/// Explicit `--provider` names win over the enabled flags in the config.
fn select_providers(config: &Config, names: &[String]) -> Result<Vec<Arc<dyn PollenProvider>>> {
    if names.is_empty() {
        return providers_from_config(config);
    }

    names
        .iter()
        .map(|name| {
            let id = ProviderId::try_from(name.as_str())?;
            provider_from_config(id, config)
        })
        .collect()
}

fn configure(config: &mut Config) -> Result<()> {
    let options = ProviderId::all().to_vec();
    let enabled: Vec<usize> = options
        .iter()
        .enumerate()
        .filter(|(_, id)| config.is_provider_enabled(**id))
        .map(|(i, _)| i)
        .collect();

    let selected = MultiSelect::new("Providers to race:", options.clone())
        .with_default(&enabled)
        .prompt()
        .context("Provider selection was cancelled")?;

    if selected.is_empty() {
        bail!("At least one provider must be enabled");
    }

    for id in &options {
        config.set_provider_enabled(*id, selected.contains(id));
    }

    let request_timeout = CustomType::<u64>::new("HTTP request timeout in seconds:")
        .with_default(config.request_timeout().as_secs())
        .prompt()?;
    config.request_timeout_secs = Some(request_timeout);

    let race_timeout = CustomType::<u64>::new("Give up after how many seconds? (0 waits forever)")
        .with_default(config.race_timeout_secs.unwrap_or(0))
        .prompt()?;
    config.race_timeout_secs = (race_timeout > 0).then_some(race_timeout);

    let zipcode = Text::new("Default zipcode (leave blank for none):")
        .with_default(config.default_zipcode.as_deref().unwrap_or(""))
        .prompt()?;
    let zipcode = zipcode.trim();
    config.default_zipcode = (!zipcode.is_empty()).then(|| zipcode.to_string());

    Ok(())
}

fn format_report(report: &PollenReport) -> String {
    let predominant = if report.predominant_pollen.is_empty() {
        "unknown"
    } else {
        report.predominant_pollen.as_str()
    };

    let mut lines = vec![
        format!("Pollen forecast for {} ({})", report.location, report.zipcode),
        format!("Service:     {}", report.reporting_service),
        format!("Predominant: {predominant}"),
        String::new(),
    ];

    let start = report.start_date.date_naive();
    for (offset, index) in report.data.iter().enumerate() {
        let day = start
            .checked_add_days(Days::new(offset as u64))
            .map(|d| d.format("%a %Y-%m-%d").to_string())
            .unwrap_or_else(|| format!("day {offset}"));
        lines.push(format!("  {day:<15} {index:>5.1}"));
    }

    if !report.version.is_empty() {
        lines.push(String::new());
        lines.push(format!("pollen {}", report.version));
    }

    lines.join("\n")
}
