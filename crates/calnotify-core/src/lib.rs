//! Core types: event times, events, display formatting, tracing setup

pub mod event;
pub mod format;
pub mod time;
pub mod tracing;

pub use event::{CalendarEvent, EventView, UNTITLED};
pub use format::{DEFAULT_TIMEZONE, DisplayFormatter, FormatError, UNKNOWN_TIME, html_escape};
pub use time::{EventTime, TimeWindow};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
