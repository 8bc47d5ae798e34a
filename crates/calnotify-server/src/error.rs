//! Server error types.
//!
//! [`ServerError`] is what handlers return; its `IntoResponse` impl picks the
//! status code and logs the failure.

use std::io;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use calnotify_providers::{ProviderError, ProviderErrorCode};
use thiserror::Error;

use crate::config::ConfigError;
use crate::render::render_error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Calendar provider or credential failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The OAuth callback was rejected (provider error, state mismatch).
    #[error("authorization callback rejected: {0}")]
    BadCallback(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Session cookie could not be issued.
    #[error("session error: {0}")]
    Session(#[from] jsonwebtoken::errors::Error),

    /// Tracing setup failed.
    #[error("tracing setup failed: {0}")]
    Tracing(#[from] calnotify_core::TracingError),

    /// IO error (listener, client secrets file).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ServerError {
    pub fn bad_callback(message: impl Into<String>) -> Self {
        Self::BadCallback(message.into())
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Provider(e) if e.code() == ProviderErrorCode::CredentialMissing => {
                StatusCode::UNAUTHORIZED
            }
            Self::BadCallback(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (heading, detail) = match status {
            StatusCode::UNAUTHORIZED => {
                tracing::warn!(error = %self, "request needs authorization");
                ("Not authorized", "Authorize calendar access first.")
            }
            StatusCode::BAD_REQUEST => {
                tracing::warn!(error = %self, "bad request");
                ("Authorization failed", "The authorization response was rejected.")
            }
            _ => {
                tracing::error!(error = %self, "request failed");
                ("Something went wrong", "The calendar could not be loaded. Try again later.")
            }
        };

        (status, Html(render_error(heading, detail))).into_response()
    }
}
