//! Configuration types for tor-exit-history

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Placeholder substituted with the `YYYY-MM` period token in [`FetchConfig::url_template`]
pub const PERIOD_PLACEHOLDER: &str = "{period}";

/// Archive fetch configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// URL template with exactly one `{period}` placeholder
    /// (default: the Tor collector exit-list archive)
    #[serde(default = "default_url_template")]
    pub url_template: String,

    /// Total request timeout per archive (default: 120 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Connection establishment timeout (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            url_template: default_url_template(),
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    /// Substitute `period` into the URL template
    pub fn url_for(&self, period: &str) -> String {
        self.url_template.replacen(PERIOD_PLACEHOLDER, period, 1)
    }
}

/// Working directory configuration
///
/// Each run gets an exclusive temporary directory that is removed afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkConfig {
    /// Parent directory for working directories (None = system temp dir)
    #[serde(default)]
    pub temp_root: Option<PathBuf>,

    /// Prefix for working directory names (default: "his-tor-y-")
    #[serde(default = "default_dir_prefix")]
    pub dir_prefix: String,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            temp_root: None,
            dir_prefix: default_dir_prefix(),
        }
    }
}

/// Main configuration for [`ExitListArchive`](crate::lookup::ExitListArchive)
///
/// Every field has a default, so `Config::default()` fetches from the public collector.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Archive fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Working directory settings
    #[serde(default)]
    pub work: WorkConfig,
}

impl Config {
    /// Check settings that would otherwise fail late, in the middle of a run
    pub fn validate(&self) -> Result<()> {
        let placeholders = self.fetch.url_template.matches(PERIOD_PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(Error::Config {
                message: format!(
                    "url_template must contain exactly one {PERIOD_PLACEHOLDER} placeholder, found {placeholders}"
                ),
                key: Some("url_template".into()),
            });
        }

        if self.fetch.timeout.is_zero() {
            return Err(Error::Config {
                message: "timeout must be greater than zero".into(),
                key: Some("timeout".into()),
            });
        }

        if self.fetch.connect_timeout.is_zero() {
            return Err(Error::Config {
                message: "connect_timeout must be greater than zero".into(),
                key: Some("connect_timeout".into()),
            });
        }

        Ok(())
    }
}

fn default_url_template() -> String {
    "https://collector.torproject.org/archive/exit-lists/exit-list-{period}.tar.xz".into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into()
}

fn default_dir_prefix() -> String {
    "his-tor-y-".into()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
