use std::{path::Path, time::Duration};

use anyhow::anyhow;
use serde::Deserialize;

use crate::job::{DEFAULT_POLL_INTERVAL, Page, RunOptions};

pub const DEFAULT_PORT: u16 = 9047;

/// Client configuration, as read from a TOML file:
///
/// ```toml
/// [cluster]
/// host = "localhost"
/// port = 9047
/// ssl = false
///
/// [credentials]
/// user_name = "dremio"
/// password = "dremio123"
///
/// [tracker]
/// poll_interval_ms = 10
/// timeout_secs = 60
/// ```
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub ssl: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ClusterConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            ssl: false,
        }
    }

    /// Root URL of the REST API, with a trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}:{}/", scheme, self.host, self.port)
    }
}

#[derive(Deserialize, Clone)]
pub struct Credentials {
    pub user_name: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user_name", &self.user_name)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_poll_interval_ms() -> u64 {
    u64::try_from(DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(10)
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: None,
        }
    }
}

impl TrackerConfig {
    pub fn run_options(&self, page: Page) -> RunOptions {
        RunOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            page,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

impl Config {
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str)
            .map_err(|err| anyhow!("Failed to parse TOML config due to error: {}", err))
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let toml_str = std::fs::read_to_string(path)
            .map_err(|_| anyhow!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&toml_str).map_err(|err| {
            anyhow!(
                "Invalid config file {} due to error: {}",
                path.display(),
                err
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r#"
            [cluster]
            host = "dremio.internal"
            port = 443
            ssl = true

            [credentials]
            user_name = "analyst"
            password = "secret"

            [tracker]
            poll_interval_ms = 250
            timeout_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.cluster.base_url(), "https://dremio.internal:443/");
        assert_eq!(config.credentials.as_ref().unwrap().user_name, "analyst");
        assert!(!format!("{:?}", config.credentials).contains("secret"));

        let options = config.tracker.run_options(Page {
            offset: Some(100),
            limit: Some(50),
        });
        assert_eq!(options.poll_interval, Duration::from_millis(250));
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.page.limit, Some(50));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("[cluster]\nhost = \"localhost\"\n").unwrap();
        assert_eq!(config.cluster, ClusterConfig::new("localhost"));
        assert_eq!(config.cluster.base_url(), "http://localhost:9047/");
        assert!(config.credentials.is_none());
        assert_eq!(
            config.tracker.run_options(Page::default()),
            RunOptions::default()
        );
    }

    #[test]
    fn test_missing_cluster() {
        assert!(Config::from_toml_str("[tracker]\npoll_interval_ms = 5\n").is_err());
    }
}
