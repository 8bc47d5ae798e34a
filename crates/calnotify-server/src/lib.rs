//! Web front door, notification webhook and upcoming-event checker.
//!
//! This crate wires the Google provider into a small web service that:
//! - walks the user through OAuth consent and keeps the token file fresh
//! - caches the next few events and renders them as HTML
//! - rebuilds the cache when Google pushes a change notification
//! - alerts on events starting within the look-ahead window
//!
//! # Example
//!
//! ```rust,no_run
//! use calnotify_providers::OAuthCredentials;
//! use calnotify_server::{ServerConfig, SignalHandler, serve};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new("https://notify.example.com", "change-me")?;
//!     let credentials = OAuthCredentials::from_file("credentials.json")?;
//!     let signals = SignalHandler::new();
//!     signals.spawn_listener();
//!     serve(config, credentials, &signals).await?;
//!     Ok(())
//! }
//! ```

mod cache;
mod checker;
mod config;
mod error;
mod render;
mod routes;
mod session;
mod signals;
mod sync;
mod watch;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use calnotify_core::DisplayFormatter;
use calnotify_providers::{
    CalendarClient, CredentialStore, GoogleConfig, OAuthClient, OAuthCredentials,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

pub use cache::{EventCache, MAX_CACHED_EVENTS};
pub use checker::{Alert, Alerter, Checker, CheckerConfig, LogAlerter, SeenEvents, TickOutcome};
pub use config::{ConfigError, DEFAULT_PORT, ServerConfig, normalize_public_url, parse_timezone};
pub use error::{ServerError, ServerResult};
pub use render::{render_error, render_events};
pub use routes::{AppState, router};
pub use session::{SESSION_COOKIE, Session, SessionKeys};
pub use signals::{ShutdownSignal, SignalHandler};
pub use sync::CalendarService;
pub use watch::{WatchConfig, WatchKeeper};

/// Builds the shared state for `config`.
pub fn build_state(config: &ServerConfig, credentials: OAuthCredentials) -> ServerResult<AppState> {
    let google = GoogleConfig::new(credentials).with_timeout(config.request_timeout);

    let store = CredentialStore::new(config.token_path.clone(), OAuthClient::new(&google)?);
    let service = Arc::new(CalendarService::new(
        Arc::new(store),
        CalendarClient::new(&google)?,
        DisplayFormatter::new(config.display_timezone),
        Arc::new(EventCache::new()),
    ));
    let watch = Arc::new(WatchKeeper::new(
        service.clone(),
        config.webhook_url(),
        config.watch.clone(),
    ));
    let sessions = SessionKeys::new(&config.secret_key)
        .with_secure(config.public_url.starts_with("https://"));

    Ok(AppState {
        service,
        watch,
        sessions: Arc::new(sessions),
        redirect_uri: config.redirect_uri().into(),
    })
}

/// Runs the HTTP server, the checker and the watch keeper until `signals`
/// fires.
pub async fn serve(
    config: ServerConfig,
    credentials: OAuthCredentials,
    signals: &SignalHandler,
) -> ServerResult<()> {
    config.validate()?;
    let state = build_state(&config, credentials)?;

    let checker = Checker::new(
        state.service.clone(),
        Arc::new(LogAlerter),
        config.checker.clone(),
    );
    let checker_task = tokio::spawn(checker.run(signals.shutdown()));
    let watch_task = tokio::spawn(state.watch.clone().run(signals.shutdown()));

    let listener = TcpListener::bind(config.socket_addr()).await?;
    info!(
        addr = %config.socket_addr(),
        public_url = %config.public_url,
        timezone = %config.display_timezone,
        "calnotify listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(signals.shutdown().wait())
        .await?;

    for (name, task) in [("checker", checker_task), ("watch keeper", watch_task)] {
        if let Err(e) = task.await {
            warn!(task = name, error = %e, "background task ended abnormally");
        }
    }

    info!("calnotify stopped");
    Ok(())
}
