//! Google Calendar API client.
//!
//! Lists upcoming events on the primary calendar and manages push
//! notification channels. Every call authenticates with the access token of
//! the [`Credential`] passed in; obtaining a fresh one is the credential
//! store's job.

use calnotify_core::{CalendarEvent, EventTime, TimeWindow};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};

use super::config::GoogleConfig;
use super::tokens::Credential;

const PRIMARY_CALENDAR: &str = "primary";

/// A registered push-notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationChannel {
    /// Our id for the channel (random UUID v4).
    pub channel_id: String,
    /// Google's id for the watched resource, needed to stop the channel.
    pub resource_id: Option<String>,
    /// Where Google delivers notifications.
    pub webhook_url: String,
    /// When Google will stop delivering, if it told us.
    pub expiration: Option<DateTime<Utc>>,
}

impl NotificationChannel {
    /// True if the channel lapses within `margin` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expiration.is_some_and(|exp| exp - now < margin)
    }
}

/// Google Calendar API client.
#[derive(Debug, Clone)]
pub struct CalendarClient {
    http_client: reqwest::Client,
    api_base: String,
}

impl CalendarClient {
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        Ok(Self {
            http_client: config.http_client()?,
            api_base: config.endpoints.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Lists events on the primary calendar starting in `window`, ordered by
    /// start time, recurring events expanded. Single page only.
    pub async fn list_upcoming(
        &self,
        credential: &Credential,
        window: &TimeWindow,
        max_results: Option<usize>,
    ) -> ProviderResult<Vec<CalendarEvent>> {
        let url = format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(PRIMARY_CALENDAR)
        );

        let mut request = self
            .http_client
            .get(&url)
            .bearer_auth(&credential.access_token)
            .query(&[
                ("timeMin", window.start.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ]);

        if let Some(end) = window.end {
            request = request.query(&[("timeMax", end.to_rfc3339())]);
        }

        if let Some(max) = max_results {
            request = request.query(&[("maxResults", max.to_string())]);
        }

        let response = request.send().await.map_err(transport_error)?;
        let response = check_status(response).await?;

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        let list: EventListResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse event list: {}", e))
        })?;

        let events: Vec<CalendarEvent> = list.items.into_iter().filter_map(convert_event).collect();
        debug!(count = events.len(), time_min = %window.start, "listed events");
        Ok(events)
    }

    /// Registers a web-hook channel on the primary calendar's events.
    pub async fn register_watch(
        &self,
        credential: &Credential,
        webhook_url: &str,
    ) -> ProviderResult<NotificationChannel> {
        let url = format!(
            "{}/calendars/{}/events/watch",
            self.api_base,
            urlencoding::encode(PRIMARY_CALENDAR)
        );
        let channel_id = Uuid::new_v4().to_string();

        let body = WatchRequest {
            id: &channel_id,
            kind: "web_hook",
            address: webhook_url,
        };

        let result: ProviderResult<WatchResponse> = async {
            let response = self
                .http_client
                .post(&url)
                .bearer_auth(&credential.access_token)
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;
            let response = check_status(response).await?;
            response.json::<WatchResponse>().await.map_err(|e| {
                ProviderError::invalid_response(format!("failed to parse watch response: {}", e))
            })
        }
        .await;

        let watch = result.map_err(|e| {
            warn!(error = %e, webhook_url, "watch registration failed");
            e.recode(ProviderErrorCode::WatchRegistrationFailed)
        })?;

        let expiration = watch
            .expiration
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        info!(
            channel_id = %channel_id,
            resource_id = ?watch.resource_id,
            expiration = ?expiration,
            "registered notification channel"
        );

        Ok(NotificationChannel {
            channel_id,
            resource_id: watch.resource_id,
            webhook_url: webhook_url.to_string(),
            expiration,
        })
    }

    /// Stops a previously registered channel.
    pub async fn stop_watch(
        &self,
        credential: &Credential,
        channel: &NotificationChannel,
    ) -> ProviderResult<()> {
        let resource_id = channel.resource_id.as_deref().ok_or_else(|| {
            ProviderError::internal("cannot stop a channel without a resource id")
        })?;

        let url = format!("{}/channels/stop", self.api_base);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&credential.access_token)
            .json(&StopRequest {
                id: &channel.channel_id,
                resource_id,
            })
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;

        info!(channel_id = %channel.channel_id, "stopped notification channel");
        Ok(())
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    let message = if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        format!("request failed: {}", e)
    };
    ProviderError::network(message).with_source(e)
}

/// Maps non-success statuses onto error codes.
async fn check_status(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        reqwest::StatusCode::UNAUTHORIZED => Err(ProviderError::authentication(
            "access token expired or invalid",
        )),
        reqwest::StatusCode::FORBIDDEN => {
            Err(ProviderError::authorization("access denied to calendar"))
        }
        reqwest::StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            Err(ProviderError::rate_limited(format!(
                "rate limit exceeded{}",
                retry_after
                    .map(|s| format!(", retry after {} seconds", s))
                    .unwrap_or_default()
            )))
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::server(format!("API error ({}): {}", status, body)))
        }
    }
}

/// Converts one item of an events list. Non-object items are skipped.
fn convert_event(raw: serde_json::Value) -> Option<CalendarEvent> {
    let event: ApiEvent = match serde_json::from_value(raw.clone()) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "skipping unparseable event item");
            return None;
        }
    };

    let id = event.id.unwrap_or_default();
    let start = parse_event_time(event.start.as_ref(), &id, "start");
    let end = parse_event_time(event.end.as_ref(), &id, "end");

    Some(CalendarEvent {
        id,
        summary: event.summary,
        start,
        end,
        html_link: event.html_link,
        status: event.status,
        raw,
    })
}

fn parse_event_time(time: Option<&ApiEventTime>, id: &str, which: &str) -> EventTime {
    let Some(time) = time else {
        return EventTime::Unknown;
    };

    if let Some(dt) = &time.date_time {
        return match DateTime::parse_from_rfc3339(dt) {
            Ok(parsed) => EventTime::DateTime(parsed.with_timezone(&Utc)),
            Err(e) => {
                warn!(event_id = id, which, error = %e, "unparseable dateTime");
                EventTime::Unknown
            }
        };
    }

    if let Some(date) = &time.date {
        return match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            Ok(parsed) => EventTime::AllDay(parsed),
            Err(e) => {
                warn!(event_id = id, which, error = %e, "unparseable date");
                EventTime::Unknown
            }
        };
    }

    EventTime::Unknown
}

// Google Calendar API response types

#[derive(Debug, Deserialize)]
struct EventListResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    start: Option<ApiEventTime>,
    end: Option<ApiEventTime>,
    html_link: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Serialize)]
struct WatchRequest<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    address: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WatchResponse {
    resource_id: Option<String>,
    expiration: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StopRequest<'a> {
    id: &'a str,
    resource_id: &'a str,
}
