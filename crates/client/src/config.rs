//! Client configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `SCHEDULER__`-prefixed environment variables using `__` for nesting
//! (e.g. `SCHEDULER__API__BASE_URL`).

use crate::client::ApiClient;
use crate::cookie::MAX_COOKIE_DAYS;
use crate::error::{ClientError, ConfigError};
use crate::session::DEFAULT_REFRESH_COOKIE_DAYS;
use crate::session::refresh::DEFAULT_REFRESH_INTERVAL;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "SCHEDULER";
const ENV_SEPARATOR: &str = "__";
const STORAGE_FILE: &str = "session.json";

/// File name `config init` writes inside the data directory
pub const CONFIG_FILE: &str = "scheduler.toml";

/// Main client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Users API connection
    pub api: ApiConfig,

    /// Session lifecycle
    pub session: SessionConfig,

    /// Persistent storage
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the API server
    pub base_url: String,

    /// Request timeout in seconds (0 disables the timeout)
    pub timeout_secs: u64,

    /// Override for the User-Agent header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds between two token refreshes
    pub refresh_interval_secs: u64,

    /// Lifetime in days of the refresh cookie kept in storage
    pub refresh_cookie_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the JSON storage file
    pub path: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
            user_agent: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL.as_secs(),
            refresh_cookie_days: DEFAULT_REFRESH_COOKIE_DAYS,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir().join(STORAGE_FILE),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            session: SessionConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

fn validate_range<T: PartialOrd + std::fmt::Display>(
    value: T,
    min: T,
    max: T,
    field: &str,
) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!(
            "{field}: must be between {min} and {max}"
        )));
    }
    Ok(())
}

/// Platform data directory, falling back to `./data`
pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("org", "SmartScheduler", "smart-scheduler").map_or_else(
        || PathBuf::from("./data"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

impl ClientConfig {
    /// Load configuration with defaults, an optional file and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value cannot be parsed
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("api.base_url", defaults.api.base_url)?
            .set_default("api.timeout_secs", defaults.api.timeout_secs)?
            .set_default(
                "session.refresh_interval_secs",
                defaults.session.refresh_interval_secs,
            )?
            .set_default(
                "session.refresh_cookie_days",
                defaults.session.refresh_cookie_days,
            )?
            .set_default(
                "storage.path",
                defaults.storage.path.to_string_lossy().to_string(),
            )?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Keep the storage file inside `data_dir`
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: impl AsRef<Path>) -> Self {
        self.storage.path = data_dir.as_ref().join(STORAGE_FILE);
        self
    }

    /// Check values that deserialize fine but cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.api.base_url)
            .map_err(|e| ConfigError::Invalid(format!("api.base_url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "api.base_url: unsupported scheme '{}'",
                url.scheme()
            )));
        }

        if self.session.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "session.refresh_interval_secs must be greater than zero".to_string(),
            ));
        }

        validate_range(
            self.session.refresh_cookie_days,
            1,
            MAX_COOKIE_DAYS,
            "session.refresh_cookie_days",
        )?;

        Ok(())
    }

    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.session.refresh_interval_secs)
    }

    /// Build the API client described by this configuration
    pub fn api_client(&self) -> Result<ApiClient, ClientError> {
        let mut builder = ApiClient::builder().base_url(&self.api.base_url);
        if self.api.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(self.api.timeout_secs));
        }
        if let Some(agent) = &self.api.user_agent {
            builder = builder.user_agent(agent);
        }
        builder.build()
    }

    /// Write this configuration as TOML
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
