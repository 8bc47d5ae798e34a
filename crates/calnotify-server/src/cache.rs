//! The upcoming-events cache.
//!
//! Holds the next few events for rendering, in the order the provider
//! returned them (`orderBy=startTime`). Replaced wholesale on every rebuild;
//! there is no TTL. A separate `refreshed_at` marker tells "never
//! fetched" apart from "fetched, nothing upcoming".

use calnotify_core::EventView;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

/// Maximum number of events kept.
pub const MAX_CACHED_EVENTS: usize = 10;

#[derive(Debug, Default)]
struct CacheState {
    events: Vec<EventView>,
    refreshed_at: Option<DateTime<Utc>>,
}

/// Process-wide event cache.
#[derive(Debug, Default)]
pub struct EventCache {
    state: RwLock<CacheState>,
}

impl EventCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the cached events.
    pub async fn get(&self) -> Vec<EventView> {
        self.state.read().await.events.clone()
    }

    /// Swaps in a new event list, keeping its order and capping it.
    pub async fn replace(&self, mut events: Vec<EventView>) {
        events.truncate(MAX_CACHED_EVENTS);

        let mut state = self.state.write().await;
        debug!(
            previous = state.events.len(),
            count = events.len(),
            "replacing event cache"
        );
        state.events = events;
        state.refreshed_at = Some(Utc::now());
    }

    /// True until the first successful rebuild.
    pub async fn needs_rebuild(&self) -> bool {
        self.state.read().await.refreshed_at.is_none()
    }

    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.refreshed_at
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calnotify_core::{CalendarEvent, DisplayFormatter, EventTime};
    use chrono::{Duration, NaiveDate, TimeZone};

    fn view(id: &str, minutes: i64) -> EventView {
        let base = Utc.with_ymd_and_hms(2025, 2, 5, 4, 0, 0).unwrap();
        let start = base + Duration::minutes(minutes);
        DisplayFormatter::default().view(CalendarEvent::new(
            id,
            EventTime::from_utc(start),
            EventTime::from_utc(start + Duration::minutes(30)),
        ))
    }

    #[tokio::test]
    async fn starts_empty_and_unrefreshed() {
        let cache = EventCache::new();
        assert!(cache.needs_rebuild().await);
        assert!(cache.is_empty().await);
        assert!(cache.refreshed_at().await.is_none());
    }

    #[tokio::test]
    async fn empty_replace_marks_fresh() {
        let cache = EventCache::new();
        cache.replace(Vec::new()).await;
        assert!(!cache.needs_rebuild().await);
        assert!(cache.is_empty().await);
        assert!(cache.refreshed_at().await.is_some());
    }

    #[tokio::test]
    async fn replace_caps_in_provider_order() {
        let cache = EventCache::new();
        let events: Vec<EventView> = (0..15).map(|i| view(&format!("e{}", i), i)).collect();
        cache.replace(events).await;

        let got = cache.get().await;
        assert_eq!(got.len(), MAX_CACHED_EVENTS);
        assert_eq!(got[0].event.id, "e0");
        assert_eq!(got[9].event.id, "e9");
    }

    #[tokio::test]
    async fn all_day_keeps_its_place_before_late_evening_event() {
        // 2030-01-01T20:00Z is 01:30 on the 2nd in Kolkata, after the
        // all-day event starts there.
        let formatter = DisplayFormatter::default();
        let all_day = formatter.view(CalendarEvent::new(
            "allday",
            EventTime::from_date(NaiveDate::from_ymd_opt(2030, 1, 2).unwrap()),
            EventTime::from_date(NaiveDate::from_ymd_opt(2030, 1, 3).unwrap()),
        ));
        let timed = formatter.view(CalendarEvent::new(
            "timed",
            EventTime::from_utc(Utc.with_ymd_and_hms(2030, 1, 1, 20, 0, 0).unwrap()),
            EventTime::from_utc(Utc.with_ymd_and_hms(2030, 1, 1, 21, 0, 0).unwrap()),
        ));

        let cache = EventCache::new();
        cache.replace(vec![all_day, timed]).await;

        let ids: Vec<_> = cache.get().await.into_iter().map(|v| v.event.id).collect();
        assert_eq!(ids, ["allday", "timed"]);
    }

    #[tokio::test]
    async fn replace_is_wholesale() {
        let cache = EventCache::new();
        cache.replace(vec![view("a", 1), view("b", 2)]).await;
        cache.replace(vec![view("c", 3)]).await;

        let got = cache.get().await;
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].event.id, "c");
    }

    #[tokio::test]
    async fn unknown_times_stay_where_provider_put_them() {
        let cache = EventCache::new();
        let unknown = DisplayFormatter::default().view(CalendarEvent::new(
            "u",
            EventTime::Unknown,
            EventTime::Unknown,
        ));
        cache.replace(vec![unknown, view("a", 5)]).await;
        let got = cache.get().await;
        assert_eq!(got[0].start_pretty, "Unknown");
        assert_eq!(got[1].event.id, "a");
    }
}
