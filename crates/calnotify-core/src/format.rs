//! Human-readable event times in a fixed display timezone.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::event::{CalendarEvent, EventView};
use crate::time::EventTime;

/// Timezone used when none is configured.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Kolkata;

/// Label used for times that cannot be formatted.
pub const UNKNOWN_TIME: &str = "Unknown";

const TIMED_START: &str = "%A, %d %B %Y — %I:%M %p";
const TIMED_END: &str = "%I:%M %p";
const ALL_DAY_START: &str = "%A, %d %B %Y (All Day)";
const ALL_DAY_END: &str = "%A, %d %B %Y";

/// Errors from building a formatter.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
}

/// Formats event start/end pairs for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayFormatter {
    tz: Tz,
}

impl Default for DisplayFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

impl DisplayFormatter {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Builds a formatter from an IANA name such as `Europe/Paris`.
    pub fn from_name(name: &str) -> Result<Self, FormatError> {
        name.parse::<Tz>()
            .map(Self::new)
            .map_err(|_| FormatError::UnknownTimezone(name.to_string()))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Returns `(start_pretty, end_pretty)`.
    ///
    /// Both ends must be of the same kind; anything else yields
    /// [`UNKNOWN_TIME`] for both. Never fails.
    pub fn format_times(&self, start: &EventTime, end: &EventTime) -> (String, String) {
        match (start, end) {
            (EventTime::DateTime(s), EventTime::DateTime(e)) => {
                (self.timed(s, TIMED_START), self.timed(e, TIMED_END))
            }
            (EventTime::AllDay(s), EventTime::AllDay(e)) => {
                (all_day(s, ALL_DAY_START), all_day(e, ALL_DAY_END))
            }
            _ => (UNKNOWN_TIME.to_string(), UNKNOWN_TIME.to_string()),
        }
    }

    /// Annotates an event with its display strings.
    pub fn view(&self, event: CalendarEvent) -> EventView {
        let (start_pretty, end_pretty) = self.format_times(&event.start, &event.end);
        EventView {
            event,
            start_pretty,
            end_pretty,
        }
    }

    fn timed(&self, dt: &DateTime<Utc>, fmt: &str) -> String {
        dt.with_timezone(&self.tz).format(fmt).to_string()
    }
}

fn all_day(date: &NaiveDate, fmt: &str) -> String {
    date.format(fmt).to_string()
}

/// Escapes text for HTML display.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn timed_event_in_kolkata() {
        let f = DisplayFormatter::default();
        let (start, end) = f.format_times(
            &EventTime::from_utc(utc(2025, 2, 5, 4, 30)),
            &EventTime::from_utc(utc(2025, 2, 5, 5, 15)),
        );
        insta::assert_snapshot!(start, @"Wednesday, 05 February 2025 — 10:00 AM");
        insta::assert_snapshot!(end, @"10:45 AM");
    }

    #[test]
    fn all_day_event() {
        let f = DisplayFormatter::default();
        let (start, end) = f.format_times(
            &EventTime::from_date(date(2025, 3, 1)),
            &EventTime::from_date(date(2025, 3, 2)),
        );
        insta::assert_snapshot!(start, @"Saturday, 01 March 2025 (All Day)");
        insta::assert_snapshot!(end, @"Sunday, 02 March 2025");
    }

    #[test]
    fn mixed_or_missing_is_unknown() {
        let f = DisplayFormatter::default();
        let timed = EventTime::from_utc(utc(2025, 2, 5, 4, 30));
        let day = EventTime::from_date(date(2025, 2, 5));

        for (s, e) in [
            (&timed, &day),
            (&day, &timed),
            (&EventTime::Unknown, &EventTime::Unknown),
            (&timed, &EventTime::Unknown),
        ] {
            let (start, end) = f.format_times(s, e);
            assert_eq!(start, "Unknown");
            assert_eq!(end, "Unknown");
        }
    }

    #[test]
    fn configured_timezone_is_used() {
        let f = DisplayFormatter::from_name("Europe/Paris").unwrap();
        assert_eq!(f.timezone(), chrono_tz::Europe::Paris);
        let (start, _) = f.format_times(
            &EventTime::from_utc(utc(2025, 7, 14, 8, 0)),
            &EventTime::from_utc(utc(2025, 7, 14, 9, 0)),
        );
        insta::assert_snapshot!(start, @"Monday, 14 July 2025 — 10:00 AM");
    }

    #[test]
    fn unknown_timezone_rejected() {
        assert!(matches!(
            DisplayFormatter::from_name("Mars/Olympus"),
            Err(FormatError::UnknownTimezone(name)) if name == "Mars/Olympus"
        ));
    }

    #[test]
    fn view_carries_event() {
        let ev = CalendarEvent::new(
            "a",
            EventTime::from_date(date(2025, 3, 1)),
            EventTime::from_date(date(2025, 3, 2)),
        );
        let view = DisplayFormatter::default().view(ev.clone());
        assert_eq!(view.event, ev);
        assert_eq!(view.start_pretty, "Saturday, 01 March 2025 (All Day)");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            html_escape(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#x27;Jerry&#x27;&lt;/b&gt;"
        );
    }
}
