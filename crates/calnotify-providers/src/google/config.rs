//! Google client configuration: OAuth client secrets and API endpoints.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};

/// Google's OAuth consent page.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google's OAuth token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Base URL for Google Calendar API v3.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// OAuth 2.0 client credentials from Google Cloud Console.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Structure of Google's client secrets JSON.
///
/// Supports the Cloud Console layout with an `installed` or `web` section,
/// and a flat layout with `client_id`/`client_secret` at the root.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Loads client credentials from a client secrets file.
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to read client secrets {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses client credentials from a client secrets JSON string.
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let file: ClientSecretsFile = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration(format!("failed to parse client secrets JSON: {}", e))
        })?;

        if let Some(creds) = file.web.or(file.installed) {
            return Ok(Self::new(creds.client_id, creds.client_secret));
        }

        if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret) {
            return Ok(Self::new(client_id, client_secret));
        }

        Err(ProviderError::configuration(
            "client secrets must contain a 'web'/'installed' section or root-level 'client_id'/'client_secret'",
        ))
    }
}

/// Endpoint URLs; overridable so tests can point at a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub api_base: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            api_base: CALENDAR_API_BASE.to_string(),
        }
    }
}

impl GoogleEndpoints {
    /// Points every endpoint at one base URL (`{base}/auth`, `{base}/token`,
    /// `{base}/calendar/v3`).
    pub fn under(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            auth_url: format!("{}/auth", base),
            token_url: format!("{}/token", base),
            api_base: format!("{}/calendar/v3", base),
        }
    }
}

/// Configuration shared by the OAuth client and the Calendar client.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub credentials: OAuthCredentials,
    pub endpoints: GoogleEndpoints,
    /// OAuth scopes to request.
    pub scopes: Vec<String>,
    /// Timeout applied to every outbound request.
    pub timeout: Duration,
    pub user_agent: String,
}

impl GoogleConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Read-only calendar access.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar.readonly";

    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            credentials,
            endpoints: GoogleEndpoints::default(),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("calnotify/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_endpoints(mut self, endpoints: GoogleEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the HTTP client used for every outbound call.
    pub fn http_client(&self) -> ProviderResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to build HTTP client: {}", e)).with_source(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_web_section() {
        let json = r#"{"web": {"client_id": "id.apps.googleusercontent.com", "client_secret": "s", "project_id": "p"}}"#;
        let creds = OAuthCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "s");
    }

    #[test]
    fn parses_installed_section() {
        let json = r#"{"installed": {"client_id": "a", "client_secret": "b"}}"#;
        let creds = OAuthCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "a");
    }

    #[test]
    fn parses_flat_layout() {
        let json = r#"{"client_id": "a", "client_secret": "b"}"#;
        let creds = OAuthCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_secret, "b");
    }

    #[test]
    fn rejects_missing_fields() {
        let err = OAuthCredentials::from_json(r#"{"client_id": "a"}"#).unwrap_err();
        assert_eq!(err.code(), crate::ProviderErrorCode::ConfigurationError);

        let err = OAuthCredentials::from_json("not json").unwrap_err();
        assert_eq!(err.code(), crate::ProviderErrorCode::ConfigurationError);
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, r#"{"web": {"client_id": "a", "client_secret": "b"}}"#).unwrap();
        let creds = OAuthCredentials::from_file(&path).unwrap();
        assert_eq!(creds.client_id, "a");

        let err = OAuthCredentials::from_file(dir.path().join("missing.json")).unwrap_err();
        assert_eq!(err.code(), crate::ProviderErrorCode::ConfigurationError);
    }

    #[test]
    fn endpoints_under_base() {
        let e = GoogleEndpoints::under("http://127.0.0.1:9000/");
        assert_eq!(e.token_url, "http://127.0.0.1:9000/token");
        assert_eq!(e.api_base, "http://127.0.0.1:9000/calendar/v3");
    }

    #[test]
    fn config_defaults() {
        let config = GoogleConfig::new(OAuthCredentials::new("a", "b"));
        assert_eq!(config.endpoints, GoogleEndpoints::default());
        assert_eq!(config.scopes, vec![GoogleConfig::DEFAULT_SCOPE.to_string()]);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
