//! # Configuration
//!
//! Settings are resolved in layers, each overriding the previous one:
//!
//! 1. Built-in defaults ([`ClinicConfig::default`])
//! 2. User file `~/.clinic-admin/config.toml`
//! 3. Project file `./clinic-admin.toml`
//! 4. Environment: `CLINIC_API_URL`, `CLINIC_CREDENTIAL_FILE`, `CLINIC_MAILBOX_SIZE`,
//!    `CLINIC_REQUEST_TIMEOUT_SECS`
//!
//! Missing files are skipped. A file only needs the keys it overrides:
//!
//! ```toml
//! api_url = "https://clinic.example.org"
//! request_timeout_secs = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:4109";
pub const DEFAULT_MAILBOX_SIZE: usize = 32;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const USER_DIR: &str = ".clinic-admin";
const PROJECT_FILE: &str = "clinic-admin.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicConfig {
    /// Origin of the REST backend, without a trailing path.
    pub api_url: String,
    /// Where the bearer token is persisted. `None` keeps it in memory only.
    pub credential_file: Option<PathBuf>,
    /// Mailbox capacity of each list controller.
    pub mailbox_size: usize,
    /// Per-request timeout of the HTTP transport. `None` disables it.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            credential_file: dirs::home_dir().map(|home| home.join(USER_DIR).join("credentials.json")),
            mailbox_size: DEFAULT_MAILBOX_SIZE,
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// One file's worth of overrides.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigLayer {
    api_url: Option<String>,
    credential_file: Option<PathBuf>,
    mailbox_size: Option<usize>,
    request_timeout_secs: Option<u64>,
}

impl ClinicConfig {
    /// Resolves every layer and validates the result.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(home) = dirs::home_dir() {
            config.merge_file(&home.join(USER_DIR).join("config.toml"))?;
        }
        config.merge_file(Path::new(PROJECT_FILE))?;
        config.merge_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies a TOML file on top of the current values. A missing file is not an error.
    pub fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.merge_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Config file applied");
        Ok(())
    }

    pub fn merge_toml(&mut self, content: &str) -> Result<(), toml::de::Error> {
        let layer: ConfigLayer = toml::from_str(content)?;
        if let Some(api_url) = layer.api_url {
            self.api_url = api_url;
        }
        if let Some(path) = layer.credential_file {
            self.credential_file = Some(path);
        }
        if let Some(size) = layer.mailbox_size {
            self.mailbox_size = size;
        }
        if let Some(secs) = layer.request_timeout_secs {
            self.request_timeout_secs = Some(secs);
        }
        Ok(())
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// `CLINIC_CREDENTIAL_FILE=memory` keeps the token in memory only, and
    /// `CLINIC_REQUEST_TIMEOUT_SECS=0` disables the timeout.
    pub fn merge_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_url) = lookup("CLINIC_API_URL") {
            self.api_url = api_url;
        }
        if let Some(path) = lookup("CLINIC_CREDENTIAL_FILE") {
            self.credential_file = match path.trim() {
                "" | "memory" => None,
                path => Some(PathBuf::from(path)),
            };
        }
        if let Some(size) = lookup("CLINIC_MAILBOX_SIZE") {
            self.mailbox_size = parse_number("CLINIC_MAILBOX_SIZE", &size)?;
        }
        if let Some(secs) = lookup("CLINIC_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = match parse_number("CLINIC_REQUEST_TIMEOUT_SECS", &secs)? {
                0 => None,
                secs => Some(secs),
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "api_url",
                message: format!("expected an http(s) URL, got {:?}", self.api_url),
            });
        }
        if self.mailbox_size == 0 {
            return Err(ConfigError::Invalid {
                key: "mailbox_size",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_number<N: std::str::FromStr>(key: &'static str, raw: &str) -> Result<N, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        message: format!("expected a number, got {raw:?}"),
    })
}
