//! Event types for calendar events.
//!
//! - [`CalendarEvent`]: one event as fetched from the provider
//! - [`EventView`]: an event annotated with display strings for rendering

use serde::{Deserialize, Serialize};

use crate::time::EventTime;

/// Title used when an event has no summary.
pub const UNTITLED: &str = "No title";

/// A calendar event as returned by the provider.
///
/// Immutable once fetched. The provider's original JSON is kept in `raw` so
/// that fields not modelled here stay available to renderers and alerters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Provider event id.
    pub id: String,
    /// Event title, if the provider sent one.
    pub summary: Option<String>,
    /// When the event starts.
    pub start: EventTime,
    /// When the event ends.
    pub end: EventTime,
    /// Link to the event in the provider's web UI.
    pub html_link: Option<String>,
    /// Provider status string (`confirmed`, `tentative`, `cancelled`).
    pub status: Option<String>,
    /// The untouched provider payload.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl CalendarEvent {
    /// Creates an event with only the required fields set.
    pub fn new(id: impl Into<String>, start: EventTime, end: EventTime) -> Self {
        Self {
            id: id.into(),
            summary: None,
            start,
            end,
            html_link: None,
            status: None,
            raw: serde_json::Value::Null,
        }
    }

    /// Sets the summary.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Sets the raw provider payload.
    #[must_use]
    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    /// The summary, or [`UNTITLED`] when absent.
    pub fn title(&self) -> &str {
        self.summary.as_deref().unwrap_or(UNTITLED)
    }

    /// Returns true if both start and end are all-day dates.
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day() && self.end.is_all_day()
    }

    /// The start exactly as the provider sent it: `start.dateTime`, else
    /// `start.date`.
    pub fn raw_start(&self) -> Option<&str> {
        let start = self.raw.get("start")?;
        start
            .get("dateTime")
            .or_else(|| start.get("date"))
            .and_then(serde_json::Value::as_str)
    }
}

/// A display-ready event held by the cache and consumed by rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventView {
    /// The underlying event.
    #[serde(flatten)]
    pub event: CalendarEvent,
    /// Start in the display timezone.
    pub start_pretty: String,
    /// End in the display timezone.
    pub end_pretty: String,
}
