//! Calendar access for the server: credential + client + cache in one place.

use std::sync::Arc;

use calnotify_core::{CalendarEvent, DisplayFormatter, EventView, TimeWindow};
use calnotify_providers::{
    CalendarClient, CredentialStore, NotificationChannel, ProviderResult,
};
use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::cache::{EventCache, MAX_CACHED_EVENTS};

/// Ties the credential store and Calendar client to the event cache.
#[derive(Debug)]
pub struct CalendarService {
    store: Arc<CredentialStore>,
    client: CalendarClient,
    formatter: DisplayFormatter,
    cache: Arc<EventCache>,
}

impl CalendarService {
    pub fn new(
        store: Arc<CredentialStore>,
        client: CalendarClient,
        formatter: DisplayFormatter,
        cache: Arc<EventCache>,
    ) -> Self {
        Self {
            store,
            client,
            formatter,
            cache,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn cache(&self) -> &EventCache {
        &self.cache
    }

    /// Refetches the next events from now and replaces the cache.
    ///
    /// Fails with `CredentialMissing` before any provider call when no token
    /// file exists. On failure the previous cache contents stay in place.
    pub async fn rebuild(&self) -> ProviderResult<usize> {
        let credential = self.store.fresh().await?;
        let window = TimeWindow::starting_at(Utc::now());
        let events = self
            .client
            .list_upcoming(&credential, &window, Some(MAX_CACHED_EVENTS))
            .await?;

        let views: Vec<EventView> = events
            .into_iter()
            .map(|event| self.formatter.view(event))
            .collect();
        let count = views.len();
        self.cache.replace(views).await;

        info!(count, "event cache rebuilt");
        Ok(count)
    }

    /// Events starting within `lookahead` from now, uncapped.
    pub async fn upcoming_within(&self, lookahead: Duration) -> ProviderResult<Vec<CalendarEvent>> {
        let credential = self.store.fresh().await?;
        let window = TimeWindow::from_now(Utc::now(), lookahead);
        let events = self.client.list_upcoming(&credential, &window, None).await?;
        debug!(count = events.len(), "look-ahead query done");
        Ok(events)
    }

    /// Registers a push channel delivering to `webhook_url`.
    pub async fn register_watch(&self, webhook_url: &str) -> ProviderResult<NotificationChannel> {
        let credential = self.store.fresh().await?;
        self.client.register_watch(&credential, webhook_url).await
    }

    /// Stops a push channel.
    pub async fn stop_watch(&self, channel: &NotificationChannel) -> ProviderResult<()> {
        let credential = self.store.fresh().await?;
        self.client.stop_watch(&credential, channel).await
    }
}
