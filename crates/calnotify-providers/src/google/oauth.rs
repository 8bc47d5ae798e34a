//! OAuth 2.0 authorization-code flow with PKCE for Google APIs.
//!
//! The web front door drives the flow: it builds a consent URL from a
//! [`PkceFlow`], keeps the flow's state and verifier in the session, and
//! hands the returned code to [`OAuthClient::exchange_code`]. The same client
//! performs refresh-token grants for the credential store.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};

use super::config::{GoogleConfig, GoogleEndpoints, OAuthCredentials};
use super::tokens::Credential;

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// OAuth client for Google APIs.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    endpoints: GoogleEndpoints,
    scopes: Vec<String>,
    http_client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        Ok(Self {
            credentials: config.credentials.clone(),
            endpoints: config.endpoints.clone(),
            scopes: config.scopes.clone(),
            http_client: config.http_client()?,
        })
    }

    /// Builds the consent URL for `flow`, redirecting back to `redirect_uri`.
    pub fn authorization_url(&self, flow: &PkceFlow, redirect_uri: &str) -> String {
        flow.build_auth_url(
            &self.endpoints.auth_url,
            &self.credentials.client_id,
            redirect_uri,
            &self.scopes,
        )
    }

    /// Exchanges an authorization code for a new credential.
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> ProviderResult<Credential> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let token = self
            .post_token_form(&self.endpoints.token_url, &params)
            .await
            .map_err(|e| match e.code() {
                ProviderErrorCode::ServerError => {
                    e.recode(ProviderErrorCode::AuthenticationFailed)
                }
                _ => e,
            })?;

        let scopes = token
            .scope
            .as_deref()
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_else(|| self.scopes.clone());

        info!(
            has_refresh_token = token.refresh_token.is_some(),
            "obtained tokens from authorization code"
        );
        Ok(Credential {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            token_uri: self.endpoints.token_url.clone(),
            client_id: self.credentials.client_id.clone(),
            client_secret: self.credentials.client_secret.clone(),
            scopes,
            expiry: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        })
    }

    /// Performs a refresh-token grant at the credential's own token endpoint.
    ///
    /// Any failure is reported as `RefreshFailed`.
    pub async fn refresh(&self, credential: &Credential) -> ProviderResult<TokenResponse> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| ProviderError::refresh_failed("credential has no refresh token"))?;

        let params = [
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let token = self
            .post_token_form(&credential.token_uri, &params)
            .await
            .map_err(|e| e.recode(ProviderErrorCode::RefreshFailed))?;

        debug!(expires_in = ?token.expires_in, "refreshed access token");
        Ok(token)
    }

    async fn post_token_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                ProviderError::network(format!("token request failed: {}", e)).with_source(e)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ProviderError::server(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::invalid_response(format!("invalid token response: {}", e)))
    }
}

/// PKCE flow state and utilities.
///
/// Implements RFC 7636 (Proof Key for Code Exchange). The fields are public
/// so the flow can be carried across the redirect in a session and rebuilt.
#[derive(Debug, Clone)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = Self::generate_verifier();
        let challenge = Self::compute_challenge(&verifier);
        let state = Self::generate_state();

        Self {
            verifier,
            challenge,
            state,
        }
    }

    fn generate_verifier() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..CODE_VERIFIER_LENGTH).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    /// Computes the SHA-256 challenge for a code verifier.
    pub fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    fn generate_state() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..16).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    /// Builds the authorization URL.
    ///
    /// Requests offline access and forces the consent prompt so Google always
    /// returns a refresh token.
    pub fn build_auth_url(
        &self,
        auth_url: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            auth_url,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Response from Google's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}
