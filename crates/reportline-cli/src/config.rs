//! Configuration loading from TOML files

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reportline_analytics::{DEFAULT_API_URL, JobConfig, preset_jobs};
use reportline_core::HttpConfig;
use serde::Deserialize;

/// Environment variable holding the OAuth access token.
pub const TOKEN_ENV: &str = "GA_ACCESS_TOKEN";

/// Global configuration for reportline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub output: OutputConfig,
    /// Configured jobs; the built-in presets when empty
    pub jobs: BTreeMap<String, JobConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub access_token: Option<String>,
    pub view_id: String,
    /// Seconds
    pub connect_timeout: u64,
    /// Seconds
    pub request_timeout: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let http = HttpConfig::default();
        Self {
            url: DEFAULT_API_URL.to_string(),
            access_token: std::env::var(TOKEN_ENV).ok(),
            view_id: "150538750".to_string(),
            connect_timeout: http.connect_timeout.as_secs(),
            request_timeout: http.request_timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data"),
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./reportline.toml (current directory)
    /// 2. ~/.config/reportline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("reportline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "reportline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Jobs by name: the configured ones, else the presets.
    pub fn jobs(&self) -> Vec<(String, JobConfig)> {
        if self.jobs.is_empty() {
            preset_jobs()
        } else {
            self.jobs
                .iter()
                .map(|(name, job)| (name.clone(), job.clone()))
                .collect()
        }
    }

    pub fn using_presets(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn http(&self) -> HttpConfig {
        HttpConfig {
            connect_timeout: Duration::from_secs(self.api.connect_timeout),
            request_timeout: Duration::from_secs(self.api.request_timeout),
        }
    }

    /// Non-empty access token, if any.
    pub fn access_token(&self) -> Option<&str> {
        self.api
            .access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}
