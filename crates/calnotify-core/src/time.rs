//! Time types for calendar events.
//!
//! This module provides [`EventTime`] for representing event start/end times
//! (a specific datetime, an all-day date, or nothing usable), and
//! [`TimeWindow`] for defining query ranges.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Represents the start or end of a calendar event.
///
/// Google Calendar reports either a `dateTime` (timed event) or a `date`
/// (all-day event). Events carrying neither are kept as [`EventTime::Unknown`]
/// rather than dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific datetime, stored in UTC.
    DateTime(DateTime<Utc>),
    /// An all-day event date (no specific time).
    AllDay(NaiveDate),
    /// Neither a date nor a datetime was available.
    Unknown,
}

impl EventTime {
    /// Creates a new `EventTime::DateTime` from a UTC datetime.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }

    /// Creates a new `EventTime::AllDay` from a date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::AllDay(date)
    }

    /// Returns `true` if this is an all-day event time.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Returns `true` if no usable time was present.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

/// A time window for querying calendar events.
///
/// `end` is optional: the rendering path asks for "the next N events from
/// now" with no upper bound, while the periodic checker uses a bounded
/// look-ahead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive), if bounded.
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Creates a bounded time window.
    ///
    /// # Panics
    ///
    /// Panics if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "TimeWindow start must be <= end");
        Self {
            start,
            end: Some(end),
        }
    }

    /// Creates a window with no upper bound.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    /// Creates a time window starting from now extending the given duration.
    pub fn from_now(now: DateTime<Utc>, duration: Duration) -> Self {
        Self::new(now, now + duration)
    }
}
