use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::provider::ProviderId;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Per-provider overrides.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Falls back to [`ProviderId::enabled_by_default`] when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Replaces the provider's public endpoint, e.g. for a proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Zipcode used by `pollen show` when none is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_zipcode: Option<String>,

    /// Deadline applied to every HTTP request a provider makes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Upper bound the CLI puts on the whole race. Unset means wait forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub race_timeout_secs: Option<u64>,

    /// Example TOML:
    /// [providers.claritin]
    /// enabled = true
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Config {
    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    pub fn is_provider_enabled(&self, id: ProviderId) -> bool {
        self.provider_config(id)
            .and_then(|cfg| cfg.enabled)
            .unwrap_or_else(|| id.enabled_by_default())
    }

    pub fn set_provider_enabled(&mut self, id: ProviderId, enabled: bool) {
        self.providers.entry(id.as_str().to_string()).or_default().enabled = Some(enabled);
    }

    /// Configured base URL, or the provider's public endpoint.
    pub fn provider_base_url(&self, id: ProviderId) -> &str {
        self.provider_config(id)
            .and_then(|cfg| cfg.base_url.as_deref())
            .unwrap_or_else(|| id.default_base_url())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn race_timeout(&self) -> Option<Duration> {
        self.race_timeout_secs.map(Duration::from_secs)
    }

    /// Load config from the platform config directory, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the platform config directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "pollen", "pollen-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
