//! Push-notification channel upkeep.
//!
//! Google channels expire (typically after a week). The keeper remembers the
//! channel registered at authorization time and re-registers it before it
//! lapses, stopping the old one on a best-effort basis.

use std::sync::Arc;
use std::time::Duration;

use calnotify_providers::{NotificationChannel, ProviderResult};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::signals::ShutdownSignal;
use crate::sync::CalendarService;

/// Watch renewal configuration.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// How often the channel's expiry is checked.
    pub check_every: Duration,
    /// Renew when less than this remains.
    pub renew_before: chrono::Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            check_every: Duration::from_secs(10 * 60),
            renew_before: chrono::Duration::hours(1),
        }
    }
}

/// Owns the current notification channel.
#[derive(Debug)]
pub struct WatchKeeper {
    service: Arc<CalendarService>,
    webhook_url: String,
    config: WatchConfig,
    channel: Mutex<Option<NotificationChannel>>,
}

impl WatchKeeper {
    pub fn new(service: Arc<CalendarService>, webhook_url: String, config: WatchConfig) -> Self {
        Self {
            service,
            webhook_url,
            config,
            channel: Mutex::new(None),
        }
    }

    /// The channel currently registered, if any.
    pub async fn current(&self) -> Option<NotificationChannel> {
        self.channel.lock().await.clone()
    }

    /// Registers a new channel, replacing and stopping any previous one.
    pub async fn register(&self) -> ProviderResult<NotificationChannel> {
        let mut slot = self.channel.lock().await;
        let channel = self.service.register_watch(&self.webhook_url).await?;

        if let Some(old) = slot.replace(channel.clone())
            && let Err(e) = self.service.stop_watch(&old).await
        {
            warn!(channel_id = %old.channel_id, error = %e, "failed to stop replaced channel");
        }

        Ok(channel)
    }

    /// Re-registers the channel if it expires within the renewal margin.
    ///
    /// Returns whether a renewal happened. Does nothing before the first
    /// registration.
    pub async fn renew_if_due(&self, now: DateTime<Utc>) -> ProviderResult<bool> {
        let due = match self.channel.lock().await.as_ref() {
            Some(channel) => channel.expires_within(now, self.config.renew_before),
            None => false,
        };
        if !due {
            return Ok(false);
        }

        info!("notification channel close to expiry, renewing");
        self.register().await?;
        Ok(true)
    }

    /// Checks every `check_every` until shutdown.
    pub async fn run(self: Arc<Self>, shutdown: ShutdownSignal) {
        let period = self.config.check_every;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = shutdown.wait();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("watch keeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.renew_if_due(Utc::now()).await {
                        error!(error = %e, "notification channel renewal failed");
                    }
                }
            }
        }
    }
}
