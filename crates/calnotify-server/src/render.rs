//! HTML pages.
//!
//! Deliberately plain: one list of upcoming events and an error page. Every
//! provider-supplied string goes through `html_escape`.

use std::fmt::Write as _;

use calnotify_core::{EventView, html_escape};

const STYLE: &str = "body{font-family:sans-serif;max-width:40em;margin:2em auto;padding:0 1em}\
li{margin-bottom:1em}.when{color:#555}";

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        title = html_escape(title),
    )
}

/// Renders the upcoming-events page.
pub fn render_events(events: &[EventView]) -> String {
    let mut body = String::from("<h1>Upcoming events</h1>\n");

    if events.is_empty() {
        body.push_str("<p>No upcoming events.</p>\n");
        return page("Upcoming events", &body);
    }

    body.push_str("<ul>\n");
    for view in events {
        let title = html_escape(view.event.title());
        let title = match view.event.html_link.as_deref() {
            Some(link) => format!("<a href=\"{}\">{}</a>", html_escape(link), title),
            None => title,
        };
        let _ = writeln!(
            body,
            "<li><strong>{}</strong><br><span class=\"when\">{} - {}</span></li>",
            title,
            html_escape(&view.start_pretty),
            html_escape(&view.end_pretty),
        );
    }
    body.push_str("</ul>\n");

    page("Upcoming events", &body)
}

/// Renders a generic error page.
pub fn render_error(heading: &str, detail: &str) -> String {
    let body = format!(
        "<h1>{}</h1>\n<p>{}</p>\n<p><a href=\"/\">Back</a></p>\n",
        html_escape(heading),
        html_escape(detail)
    );
    page(heading, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calnotify_core::{CalendarEvent, DisplayFormatter, EventTime};
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn empty_list() {
        let html = render_events(&[]);
        assert!(html.contains("No upcoming events."));
        assert!(!html.contains("<ul>"));
    }

    #[test]
    fn lists_events_escaped() {
        let start = Utc.with_ymd_and_hms(2025, 2, 5, 4, 30, 0).unwrap();
        let timed = CalendarEvent::new(
            "1",
            EventTime::from_utc(start),
            EventTime::from_utc(start + chrono::Duration::minutes(30)),
        )
        .with_summary("<script>alert(1)</script>");
        let day = NaiveDate::from_ymd_opt(2025, 2, 6).unwrap();
        let mut all_day = CalendarEvent::new("2", EventTime::from_date(day), EventTime::from_date(day));
        all_day.html_link = Some("https://calendar.google.com/event?eid=a&b".into());

        let f = DisplayFormatter::default();
        let html = render_events(&[f.view(timed), f.view(all_day)]);

        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("Wednesday, 05 February 2025 — 10:00 AM - 10:30 AM"));
        assert!(html.contains("href=\"https://calendar.google.com/event?eid=a&amp;b\">No title</a>"));
        assert!(html.contains("Thursday, 06 February 2025 (All Day)"));
    }

    #[test]
    fn error_page() {
        let html = render_error("Something went wrong", "a <b>detail</b>");
        assert!(html.contains("<h1>Something went wrong</h1>"));
        assert!(html.contains("a &lt;b&gt;detail&lt;/b&gt;"));
    }
}
