//! Google Calendar integration.
//!
//! - [`OAuthClient`] / [`PkceFlow`]: consent URL, code exchange, refresh grant
//! - [`CredentialStore`]: the token file, refreshed transparently
//! - [`CalendarClient`]: event listing and push-notification channels

mod client;
mod config;
mod oauth;
mod tokens;

pub use client::{CalendarClient, NotificationChannel};
pub use config::{
    CALENDAR_API_BASE, GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, GoogleConfig, GoogleEndpoints,
    OAuthCredentials,
};
pub use oauth::{OAuthClient, PkceFlow, TokenResponse};
pub use tokens::{Credential, CredentialStore};
