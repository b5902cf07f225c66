//! Connection settings for one OpenMediaVault host.
//!
//! Settings are read from TOML, by default from
//! `<config dir>/omv-monitor/config.toml`:
//!
//! ```toml
//! host = "nas.local"
//! username = "admin"
//! password = "openmediavault"
//! scan_interval_secs = 300
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};

use crate::coordinator::REFRESH_TIMEOUT;
use crate::error::{ConfigDirNotFoundSnafu, ConfigParseSnafu, Error, IoResultExt, Result};
use crate::session::Credentials;

/// Default polling interval.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(300);

/// Default RPC endpoint path on the host.
pub const DEFAULT_RPC_PATH: &str = "rpc.php";

/// Directory name under the platform config dir.
pub const CONFIG_DIR_NAME: &str = "omv-monitor";

/// Connection settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Host name or address, optionally with a port (e.g., "nas.local:8080").
    pub host: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// URL scheme, "http" or "https".
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    /// Time budget for one refresh cycle.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_rpc_path() -> String {
    DEFAULT_RPC_PATH.to_string()
}

fn default_scan_interval_secs() -> u64 {
    DEFAULT_SCAN_INTERVAL.as_secs()
}

fn default_timeout_secs() -> u64 {
    REFRESH_TIMEOUT.as_secs()
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("scheme", &self.scheme)
            .field("rpc_path", &self.rpc_path)
            .field("scan_interval_secs", &self.scan_interval_secs)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Config {
    /// Creates a config with default scheme, path and intervals.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            scheme: default_scheme(),
            rpc_path: default_rpc_path(),
            scan_interval_secs: default_scan_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Loads a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).config_read_context(path)?;
        toml::from_str(&content).context(ConfigParseSnafu { path })
    }

    /// Loads the config file at [`default_config_path`], if it exists.
    pub fn load_default() -> Result<Option<Self>> {
        let path = default_config_path()?;
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    /// Checks that the values can be used to connect.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidConfig {
                message: "host must not be empty".to_string(),
            });
        }
        if self.host.contains("://") {
            return Err(Error::InvalidConfig {
                message: format!("host '{}' must not include a scheme", self.host),
            });
        }
        if self.username.trim().is_empty() {
            return Err(Error::InvalidConfig {
                message: "username must not be empty".to_string(),
            });
        }
        if self.scheme != "http" && self.scheme != "https" {
            return Err(Error::InvalidConfig {
                message: format!("unsupported scheme '{}'", self.scheme),
            });
        }
        if self.scan_interval_secs == 0 || self.timeout_secs == 0 {
            return Err(Error::InvalidConfig {
                message: "scan interval and timeout must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Full URL of the RPC endpoint.
    pub fn rpc_url(&self) -> String {
        format!(
            "{}://{}/{}",
            self.scheme,
            self.host.trim().trim_end_matches('/'),
            self.rpc_path.trim_start_matches('/')
        )
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Returns `<config dir>/omv-monitor/config.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context(ConfigDirNotFoundSnafu)?;
    Ok(base.join(CONFIG_DIR_NAME).join("config.toml"))
}
