//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use calnotify_core::DEFAULT_TIMEZONE;
use chrono_tz::Tz;
use thiserror::Error;
use url::Url;

use crate::checker::CheckerConfig;
use crate::watch::WatchConfig;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 5000;

/// Longest accepted time between checker ticks.
pub const MAX_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest accepted checker look-ahead, in minutes.
pub const MAX_LOOKAHEAD_MINUTES: i64 = 7 * 24 * 60;

/// Errors raised while assembling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was empty.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// PUBLIC_URL is not an absolute http(s) URL.
    #[error("invalid public URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Unknown IANA timezone name.
    #[error("unknown display timezone '{0}'")]
    InvalidTimezone(String),

    /// Any other out-of-range value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Externally reachable base URL, without trailing slash.
    pub public_url: String,
    /// Key signing the session cookie.
    pub secret_key: String,
    /// Token file in the authorized-user layout.
    pub token_path: PathBuf,
    /// Where the client secrets JSON is written at startup.
    pub client_secrets_path: PathBuf,
    pub display_timezone: Tz,
    /// Timeout for every outbound provider call.
    pub request_timeout: Duration,
    pub checker: CheckerConfig,
    pub watch: WatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            public_url: format!("http://localhost:{}", DEFAULT_PORT),
            secret_key: String::new(),
            token_path: PathBuf::from("token.json"),
            client_secrets_path: PathBuf::from("credentials.json"),
            display_timezone: DEFAULT_TIMEZONE,
            request_timeout: Duration::from_secs(30),
            checker: CheckerConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a configuration for the given public URL and signing key.
    pub fn new(public_url: &str, secret_key: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            public_url: normalize_public_url(public_url)?,
            secret_key: secret_key.into(),
            ..Default::default()
        })
    }

    /// Builder: set listen address.
    pub fn with_listen(mut self, bind_addr: IpAddr, port: u16) -> Self {
        self.bind_addr = bind_addr;
        self.port = port;
        self
    }

    /// Builder: set token file path.
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Builder: set client secrets path.
    pub fn with_client_secrets_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_secrets_path = path.into();
        self
    }

    /// Builder: set display timezone.
    pub fn with_display_timezone(mut self, tz: Tz) -> Self {
        self.display_timezone = tz;
        self
    }

    /// Builder: set checker settings.
    pub fn with_checker(mut self, checker: CheckerConfig) -> Self {
        self.checker = checker;
        self
    }

    /// Builder: set watch renewal settings.
    pub fn with_watch(mut self, watch: WatchConfig) -> Self {
        self.watch = watch;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Where Google delivers change notifications.
    pub fn webhook_url(&self) -> String {
        format!("{}/notifications", self.public_url)
    }

    /// Where Google sends the user back after consent.
    pub fn redirect_uri(&self) -> String {
        format!("{}/oauth2callback", self.public_url)
    }

    /// Checks cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.trim().is_empty() {
            return Err(ConfigError::Missing("SECRET_KEY"));
        }
        if self.checker.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "check interval must be at least one second".into(),
            ));
        }
        if self.checker.interval > MAX_CHECK_INTERVAL {
            return Err(ConfigError::Invalid(format!(
                "check interval must not exceed {} seconds",
                MAX_CHECK_INTERVAL.as_secs()
            )));
        }
        if self.checker.lookahead <= chrono::Duration::zero() {
            return Err(ConfigError::Invalid(
                "look-ahead must be at least one minute".into(),
            ));
        }
        if self.checker.lookahead.num_minutes() > MAX_LOOKAHEAD_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "look-ahead must not exceed {} minutes",
                MAX_LOOKAHEAD_MINUTES
            )));
        }
        Ok(())
    }
}

/// Parses and strips a trailing slash from the public base URL.
pub fn normalize_public_url(raw: &str) -> Result<String, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ConfigError::Missing("PUBLIC_URL"));
    }
    let parsed = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: "scheme must be http or https".into(),
        });
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// Parses an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::InvalidTimezone(name.to_string()))
}
