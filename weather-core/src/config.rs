use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::error::WeatherError;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/3.0/onecall";
pub const DEFAULT_GEOCODING_URL: &str = "https://api.openweathermap.org/geo/1.0/direct";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_ENVIRONMENT: &str = "local";
pub const DEFAULT_STARTUP_WAIT_SECS: f64 = 2.0;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Layered configuration: every field is optional so that a file, the
/// environment and command-line flags can each fill in part of it.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// port = 8080
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub geocoding_url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub environment: Option<String>,
    pub startup_wait_secs: Option<f64>,
    pub request_timeout_secs: Option<u64>,
}

/// Immutable settings fixed at process start and handed to every component.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub api_key: String,
    pub base_url: String,
    pub geocoding_url: String,
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub startup_wait: Duration,
    pub request_timeout: Duration,
}

impl ServiceConfig {
    /// Settings pointing both provider URLs at `base`; used by tests and stubs.
    pub fn for_provider(api_key: impl Into<String>, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            api_key: api_key.into(),
            base_url: format!("{base}/data/3.0/onecall"),
            geocoding_url: format!("{base}/geo/1.0/direct"),
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            startup_wait: Duration::from_secs_f64(DEFAULT_STARTUP_WAIT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Load config from the platform config dir, or return an empty default
    /// if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load config from an explicit file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
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

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-proxy", "weather-server")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay `other` on top of `self`; fields set in `other` win.
    pub fn merge(self, other: Config) -> Config {
        Config {
            api_key: other.api_key.or(self.api_key),
            base_url: other.base_url.or(self.base_url),
            geocoding_url: other.geocoding_url.or(self.geocoding_url),
            host: other.host.or(self.host),
            port: other.port.or(self.port),
            environment: other.environment.or(self.environment),
            startup_wait_secs: other.startup_wait_secs.or(self.startup_wait_secs),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
        }
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    /// Returns the API key, if present and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// Fill defaults and validate. `default_host` depends on the run mode.
    pub fn resolve(&self, default_host: &str) -> std::result::Result<ServiceConfig, WeatherError> {
        let api_key = self.api_key().ok_or_else(|| {
            WeatherError::Configuration(
                "OpenWeatherMap API key not provided. Set OPENWEATHER_API_KEY or run \
                 `weather-server configure`."
                    .to_string(),
            )
        })?;

        let startup_wait = self.startup_wait_secs.unwrap_or(DEFAULT_STARTUP_WAIT_SECS);
        if !startup_wait.is_finite() || startup_wait < 0.0 {
            return Err(WeatherError::Configuration(format!(
                "startup wait must be a non-negative number of seconds, got {startup_wait}"
            )));
        }

        let request_timeout = self
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout == 0 {
            return Err(WeatherError::Configuration(
                "request timeout must be at least one second".to_string(),
            ));
        }

        Ok(ServiceConfig {
            api_key: api_key.to_string(),
            base_url: self.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            geocoding_url: self
                .geocoding_url
                .clone()
                .unwrap_or_else(|| DEFAULT_GEOCODING_URL.to_string()),
            host: self.host.clone().unwrap_or_else(|| default_host.to_string()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            environment: self
                .environment
                .clone()
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            startup_wait: Duration::from_secs_f64(startup_wait),
            request_timeout: Duration::from_secs(request_timeout),
        })
    }
}
