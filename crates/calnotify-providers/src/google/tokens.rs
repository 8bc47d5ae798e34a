//! OAuth credential persistence and refresh.
//!
//! The token file uses Google's "authorized user" JSON layout so it stays
//! interchangeable with Google's own client libraries.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};

use super::config::GOOGLE_TOKEN_URL;
use super::oauth::OAuthClient;

/// Access tokens are treated as expired this long before their real expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

/// An OAuth credential for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "token")]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// Returns true if the access token is expired or about to expire.
    ///
    /// Unknown expiry counts as valid.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .is_some_and(|expiry| now >= expiry - Duration::seconds(EXPIRY_SKEW_SECS))
    }
}

/// File-backed credential store.
///
/// Refresh-and-persist is serialized: concurrent callers of [`fresh`]
/// queue on an async mutex, so the second one reads the file the first one
/// wrote and finds a valid token.
///
/// [`fresh`]: CredentialStore::fresh
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    oauth: OAuthClient,
    lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>, oauth: OAuthClient) -> Self {
        Self {
            path: path.into(),
            oauth,
            lock: Mutex::new(()),
        }
    }

    /// Returns the token file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The OAuth client used for refresh grants and code exchange.
    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    /// Reads the credential from disk.
    ///
    /// An absent or malformed file is `CredentialMissing`.
    pub fn load(&self) -> ProviderResult<Credential> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            debug!(path = %self.path.display(), error = %e, "no readable token file");
            ProviderError::credential_missing(format!(
                "cannot read token file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "token file is malformed");
            ProviderError::credential_missing(format!("malformed token file: {}", e))
        })
    }

    /// Refreshes `credential` if it has expired.
    ///
    /// A refreshed credential is persisted before it is returned. The stored
    /// refresh token survives unless the grant returns a new one. An expired
    /// credential without a refresh token is returned unchanged.
    pub async fn refresh_if_needed(&self, credential: Credential) -> ProviderResult<Credential> {
        if !credential.is_expired() {
            return Ok(credential);
        }

        if credential.refresh_token.is_none() {
            warn!("access token expired and no refresh token is stored; re-authorization needed");
            return Ok(credential);
        }

        let token = self.oauth.refresh(&credential).await?;

        let mut refreshed = credential;
        refreshed.access_token = token.access_token;
        refreshed.expiry = token
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        if let Some(new_refresh) = token.refresh_token {
            refreshed.refresh_token = Some(new_refresh);
        }

        self.persist(&refreshed)?;
        info!(expiry = ?refreshed.expiry, "refreshed access token");
        Ok(refreshed)
    }

    /// Writes the credential atomically (temp file + rename), mode 0600 on Unix.
    pub fn persist(&self, credential: &Credential) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::internal(format!("failed to create token directory: {}", e))
                    .with_source(e)
            })?;
        }

        let content = serde_json::to_string_pretty(credential)
            .map_err(|e| ProviderError::internal(format!("failed to serialize token: {}", e)))?;

        let temp_path = self.temp_path();
        fs::write(&temp_path, &content).map_err(|e| {
            ProviderError::internal(format!("failed to write token file: {}", e)).with_source(e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600)).map_err(|e| {
                ProviderError::internal(format!("failed to restrict token file: {}", e))
                    .with_source(e)
            })?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::internal(format!("failed to rename token file: {}", e)).with_source(e)
        })?;

        debug!(path = %self.path.display(), "persisted credential");
        Ok(())
    }

    /// Loads and, if needed, refreshes the credential.
    pub async fn fresh(&self) -> ProviderResult<Credential> {
        let _guard = self.lock.lock().await;
        let credential = self.load()?;
        self.refresh_if_needed(credential).await
    }

    /// Persists a credential obtained from the authorization flow.
    pub async fn store_new(&self, credential: &Credential) -> ProviderResult<()> {
        let _guard = self.lock.lock().await;
        self.persist(credential)?;
        info!(path = %self.path.display(), "stored new credential");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "token.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
