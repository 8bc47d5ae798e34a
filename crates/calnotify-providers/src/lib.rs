//! Calendar provider access: Google OAuth credentials and the Calendar API.

pub mod error;
pub mod google;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use google::{
    CalendarClient, Credential, CredentialStore, GoogleConfig, GoogleEndpoints,
    NotificationChannel, OAuthClient, OAuthCredentials, PkceFlow,
};
