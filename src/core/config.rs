use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};
use tracing::debug;

/// Environment variable consulted for the FRED credential; it takes
/// precedence over the config file so the key never has to live on disk.
pub const FRED_API_KEY_ENV: &str = "FRED_API_KEY";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FredProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QuotesProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub fred: Option<FredProviderConfig>,
    pub quotes: Option<QuotesProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            fred: Some(FredProviderConfig {
                base_url: "https://api.stlouisfed.org".to_string(),
                api_key: None,
                timeout_secs: None,
            }),
            quotes: Some(QuotesProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub probe_interval_minutes: Option<u64>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "codito", "macrolens")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Resolve the FRED credential: environment first, then config file.
    pub fn fred_api_key(&self) -> Option<String> {
        env::var(FRED_API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| {
                self.providers
                    .fred
                    .as_ref()
                    .and_then(|fred| fred.api_key.clone())
            })
    }
}
