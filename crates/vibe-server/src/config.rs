//! Server configuration
//!
//! Sources, lowest to highest precedence:
//!
//! 1. [`ServerConfig::default`]
//! 2. an optional TOML file
//! 3. environment variables ([`ServerConfig::apply_env`])
//! 4. command-line flags ([`Overrides`])

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vibe_core::CoreConfig;
use vibe_genai::{API_KEY_VARS, DEFAULT_BASE_URL};

pub const LISTEN_VAR: &str = "VIBESTACK_LISTEN";
pub const BASE_URL_VAR: &str = "VIBESTACK_API_BASE_URL";
pub const WEBHOOK_SECRET_VAR: &str = "VIBESTACK_WEBHOOK_SECRET";
pub const ALLOW_ANONYMOUS_VAR: &str = "VIBESTACK_ALLOW_ANONYMOUS";
pub const LOG_JSON_VAR: &str = "VIBESTACK_LOG_JSON";

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Everything the binary needs to start
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// Generation service key; never logged
    pub api_key: Option<String>,
    pub api_base_url: String,
    /// Treat requests without an identity as an anonymous user (development)
    pub allow_anonymous: bool,
    /// Shared secret expected on billing webhooks; webhooks are refused
    /// when unset
    pub webhook_secret: Option<String>,
    pub log_json: bool,
    /// Largest accepted request body, in bytes
    pub body_limit: u64,
    /// Gallery items returned by default
    pub gallery_page: usize,
    /// Editing sessions kept at once
    pub max_sessions: u64,
    /// Idle editing sessions are dropped after this long
    #[serde(with = "vibe_genai::millis")]
    pub session_idle: Duration,
    pub core: CoreConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 3000)),
            api_key: None,
            api_base_url: DEFAULT_BASE_URL.to_owned(),
            allow_anonymous: false,
            webhook_secret: None,
            log_json: false,
            body_limit: 10 * 1024 * 1024,
            gallery_page: 50,
            max_sessions: 1024,
            session_idle: Duration::from_secs(2 * 60 * 60),
            core: CoreConfig::default(),
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("listen", &self.listen)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("allow_anonymous", &self.allow_anonymous)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .field("log_json", &self.log_json)
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

/// Command-line overrides; `None`/`false` leaves the loaded value alone
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub listen: Option<SocketAddr>,
    pub allow_anonymous: bool,
    pub log_json: bool,
}

impl ServerConfig {
    /// Defaults, then `path`, then the process environment, then `overrides`
    ///
    /// # Errors
    /// Unreadable or malformed config file, or an unparsable variable
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.apply_overrides(overrides);
        Ok(config)
    }

    /// Parse a TOML file over the defaults
    ///
    /// # Errors
    /// Unreadable or malformed file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Apply environment variables read through `lookup`
    ///
    /// # Errors
    /// [`ConfigError::InvalidEnv`] for a value that does not parse
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(key) = API_KEY_VARS.iter().find_map(|var| lookup(var).filter(|v| !v.trim().is_empty())) {
            self.api_key = Some(key);
        }
        if let Some(value) = lookup(LISTEN_VAR) {
            self.listen = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: LISTEN_VAR,
                value,
            })?;
        }
        if let Some(value) = lookup(BASE_URL_VAR) {
            self.api_base_url = value;
        }
        if let Some(value) = lookup(WEBHOOK_SECRET_VAR) {
            self.webhook_secret = Some(value).filter(|v| !v.is_empty());
        }
        if let Some(value) = lookup(ALLOW_ANONYMOUS_VAR) {
            self.allow_anonymous = parse_flag(ALLOW_ANONYMOUS_VAR, value)?;
        }
        if let Some(value) = lookup(LOG_JSON_VAR) {
            self.log_json = parse_flag(LOG_JSON_VAR, value)?;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(listen) = overrides.listen {
            self.listen = listen;
        }
        self.allow_anonymous |= overrides.allow_anonymous;
        self.log_json |= overrides.log_json;
    }
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { var, value }),
    }
}
