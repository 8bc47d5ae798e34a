//! Periodic upcoming-event checker.
//!
//! On a fixed interval, independent of push notifications, queries a short
//! look-ahead window and raises an alert for every event in it. Alerts go
//! through the [`Alerter`] trait; the stock [`LogAlerter`] only logs.
//!
//! Optional duplicate suppression remembers `(event id, start)` pairs for a
//! while so an event is announced once rather than on every tick it stays
//! inside the window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use calnotify_core::CalendarEvent;
use chrono::{DateTime, Utc};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::signals::ShutdownSignal;
use crate::sync::CalendarService;

/// Checker configuration.
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// How far ahead each tick looks.
    pub lookahead: chrono::Duration,
    /// Whether already-announced events are suppressed.
    pub dedup: bool,
    /// How long an announced event is remembered.
    pub dedup_ttl: chrono::Duration,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            lookahead: chrono::Duration::minutes(10),
            dedup: false,
            dedup_ttl: chrono::Duration::hours(24),
        }
    }
}

impl CheckerConfig {
    /// Builder: set tick interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Builder: set look-ahead window.
    pub fn with_lookahead(mut self, lookahead: chrono::Duration) -> Self {
        self.lookahead = lookahead;
        self
    }

    /// Builder: enable or disable duplicate suppression.
    pub fn with_dedup(mut self, dedup: bool) -> Self {
        self.dedup = dedup;
        self
    }

    /// Builder: set how long announced events are remembered.
    pub fn with_dedup_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.dedup_ttl = ttl;
        self
    }
}

/// One upcoming-event alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub event_id: String,
    /// Summary, or "No title".
    pub summary: String,
    /// Start as the provider sent it (`dateTime`, else `date`).
    pub start: String,
    /// Size of the look-ahead window, in minutes.
    pub lookahead_minutes: i64,
}

impl Alert {
    fn from_event(event: &CalendarEvent, lookahead: chrono::Duration) -> Self {
        Self {
            event_id: event.id.clone(),
            summary: event.title().to_string(),
            start: event.raw_start().unwrap_or("unknown").to_string(),
            lookahead_minutes: lookahead.num_minutes(),
        }
    }
}

/// Delivers alerts.
pub trait Alerter: Send + Sync {
    fn alert(&self, alert: &Alert);
}

/// Writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlerter;

impl Alerter for LogAlerter {
    fn alert(&self, alert: &Alert) {
        info!(
            event_id = %alert.event_id,
            start = %alert.start,
            "Upcoming event in {} minutes: {} at {}",
            alert.lookahead_minutes,
            alert.summary,
            alert.start
        );
    }
}

/// Remembers announced `(event id, start)` pairs until their TTL lapses.
#[derive(Debug)]
pub struct SeenEvents {
    ttl: chrono::Duration,
    seen: HashMap<(String, String), DateTime<Utc>>,
}

impl SeenEvents {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            ttl,
            seen: HashMap::new(),
        }
    }

    /// Records the key; true if it was not already remembered.
    pub fn first_sighting(&mut self, key: (String, String), now: DateTime<Utc>) -> bool {
        match self.seen.get(&key) {
            Some(seen_at) if now - *seen_at < self.ttl => false,
            _ => {
                self.seen.insert(key, now);
                true
            }
        }
    }

    /// Drops entries older than the TTL.
    pub fn evict(&mut self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        let before = self.seen.len();
        self.seen.retain(|_, seen_at| now - *seen_at < ttl);
        let evicted = before - self.seen.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.seen.len(), "evicted announced events");
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No credential on disk; nothing was queried.
    NoCredentials,
    /// The provider call failed; the tick was abandoned.
    Failed,
    /// The window was empty.
    NoEvents,
    /// Alerts were raised for `alerted` events; `suppressed` were repeats.
    Alerted { alerted: usize, suppressed: usize },
}

/// The periodic checker task.
pub struct Checker {
    service: Arc<CalendarService>,
    alerter: Arc<dyn Alerter>,
    config: CheckerConfig,
    seen: Option<SeenEvents>,
}

impl Checker {
    pub fn new(
        service: Arc<CalendarService>,
        alerter: Arc<dyn Alerter>,
        config: CheckerConfig,
    ) -> Self {
        let seen = config.dedup.then(|| SeenEvents::new(config.dedup_ttl));
        Self {
            service,
            alerter,
            config,
            seen,
        }
    }

    /// Runs one check.
    pub async fn tick(&mut self) -> TickOutcome {
        let events = match self.service.upcoming_within(self.config.lookahead).await {
            Ok(events) => events,
            Err(e) if e.is_credential_missing() => {
                error!(error = %e, "failed to load credentials for upcoming-event check");
                return TickOutcome::NoCredentials;
            }
            Err(e) => {
                error!(error = %e, "upcoming-event check failed");
                return TickOutcome::Failed;
            }
        };

        if events.is_empty() {
            info!(
                "No events in the next {} minutes.",
                self.config.lookahead.num_minutes()
            );
            return TickOutcome::NoEvents;
        }

        let now = Utc::now();
        if let Some(seen) = self.seen.as_mut() {
            seen.evict(now);
        }

        let mut alerted = 0;
        let mut suppressed = 0;
        for event in &events {
            let alert = Alert::from_event(event, self.config.lookahead);
            let fresh = match self.seen.as_mut() {
                Some(seen) => seen.first_sighting((alert.event_id.clone(), alert.start.clone()), now),
                None => true,
            };

            if fresh {
                self.alerter.alert(&alert);
                alerted += 1;
            } else {
                debug!(event_id = %alert.event_id, "already announced");
                suppressed += 1;
            }
        }

        if let Some(seen) = self.seen.as_ref() {
            debug!(alerted, suppressed, remembered = seen.len(), "alerts raised");
        }

        TickOutcome::Alerted {
            alerted,
            suppressed,
        }
    }

    /// Ticks every `interval` until shutdown. The first tick happens one
    /// interval after start.
    pub async fn run(mut self, shutdown: ShutdownSignal) {
        let period = self.config.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = shutdown.wait();
        tokio::pin!(shutdown);

        info!(
            interval_secs = period.as_secs(),
            lookahead_minutes = self.config.lookahead.num_minutes(),
            dedup = self.config.dedup,
            "upcoming-event checker started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("upcoming-event checker stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let outcome = self.tick().await;
                    debug!(?outcome, "checker tick done");
                }
            }
        }
    }
}
