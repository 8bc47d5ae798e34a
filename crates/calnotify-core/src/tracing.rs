//! Tracing setup for calnotify
//!
//! One subscriber for the whole process: the server binary calls
//! [`init_tracing`] once at startup, before any task is spawned. `RUST_LOG`
//! wins over the configured level so operators can turn on module-level
//! debugging without a restart flag.
//!
//! ```ignore
//! use calnotify_core::tracing::{init_tracing, TracingConfig, TracingOutputFormat};
//!
//! init_tracing(TracingConfig::default().with_format(TracingOutputFormat::Json))?;
//! ```

use std::str::FromStr;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

/// Targets whose verbosity follows the configured level.
const FILTERED_TARGETS: &[&str] = &["calnotify", "tower_http"];

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    /// A global subscriber is already installed
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),

    /// Failed to parse env filter directive
    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),

    /// Unrecognised log format name
    #[error("unknown log format '{0}' (expected pretty, compact or json)")]
    UnknownFormat(String),
}

/// Log line layout, chosen with `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    /// Multi-line, for a terminal
    #[default]
    Pretty,
    /// One line per event
    Compact,
    /// JSON lines, for log shippers
    Json,
}

impl FromStr for TracingOutputFormat {
    type Err = TracingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(TracingError::UnknownFormat(other.to_string())),
        }
    }
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level for calnotify and HTTP request traces when RUST_LOG is unset
    pub level: Level,
    pub format: TracingOutputFormat,
    /// Include file and line of each event
    pub with_location: bool,
    /// Explicit filter directive, overriding both `level` and RUST_LOG
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingOutputFormat::Pretty,
            with_location: false,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    /// Set the default log level
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the output format
    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_location(mut self, with_location: bool) -> Self {
        self.with_location = with_location;
        self
    }

    /// Set a custom env filter directive
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Directive used when neither `env_filter` nor `RUST_LOG` is set.
    pub fn default_directive(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        FILTERED_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn filter(&self) -> Result<EnvFilter, TracingError> {
        match self.env_filter {
            Some(ref directive) => Ok(EnvFilter::try_new(directive)?),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.default_directive()))),
        }
    }

    fn layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let location = self.with_location;
        match self.format {
            TracingOutputFormat::Pretty => fmt::layer()
                .pretty()
                .with_file(location)
                .with_line_number(location)
                .boxed(),
            TracingOutputFormat::Compact => fmt::layer()
                .compact()
                .with_file(location)
                .with_line_number(location)
                .boxed(),
            TracingOutputFormat::Json => fmt::layer()
                .json()
                .flatten_event(true)
                .with_file(location)
                .with_line_number(location)
                .boxed(),
        }
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if a subscriber is already installed or if the filter
/// directive does not parse.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = config.filter()?;
    tracing_subscriber::registry()
        .with(config.layer())
        .with(filter)
        .try_init()?;
    Ok(())
}
