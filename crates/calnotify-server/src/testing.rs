//! Shared test fixtures: a mock Google behind a real service stack.

use std::sync::Arc;

use calnotify_core::DisplayFormatter;
use calnotify_providers::{
    CalendarClient, Credential, CredentialStore, GoogleConfig, GoogleEndpoints, OAuthClient,
    OAuthCredentials,
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::cache::EventCache;
use crate::sync::CalendarService;

pub(crate) const EVENTS_PATH: &str = "/calendar/v3/calendars/primary/events";
pub(crate) const WATCH_PATH: &str = "/calendar/v3/calendars/primary/events/watch";
pub(crate) const STOP_PATH: &str = "/calendar/v3/channels/stop";

pub(crate) struct Fixture {
    pub server: MockServer,
    pub dir: TempDir,
    pub config: GoogleConfig,
    pub service: Arc<CalendarService>,
}

impl Fixture {
    pub async fn with_token() -> Self {
        let fx = Self::without_token().await;
        fx.service
            .store()
            .persist(&valid_credential(&fx.server))
            .unwrap();
        fx
    }

    pub async fn without_token() -> Self {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let config = GoogleConfig::new(OAuthCredentials::new("cid", "csecret"))
            .with_endpoints(GoogleEndpoints::under(&server.uri()));

        let store = CredentialStore::new(
            dir.path().join("token.json"),
            OAuthClient::new(&config).unwrap(),
        );
        let service = CalendarService::new(
            Arc::new(store),
            CalendarClient::new(&config).unwrap(),
            DisplayFormatter::default(),
            Arc::new(EventCache::new()),
        );

        Self {
            server,
            dir,
            config,
            service: Arc::new(service),
        }
    }
}

pub(crate) fn valid_credential(server: &MockServer) -> Credential {
    Credential {
        access_token: "test-access".into(),
        refresh_token: Some("test-refresh".into()),
        token_uri: format!("{}/token", server.uri()),
        client_id: "cid".into(),
        client_secret: "csecret".into(),
        scopes: vec![GoogleConfig::DEFAULT_SCOPE.into()],
        expiry: Some(Utc::now() + Duration::hours(1)),
    }
}

pub(crate) fn event_json(id: &str, summary: Option<&str>, start: &str, end: &str) -> Value {
    let mut event = json!({
        "id": id,
        "start": {"dateTime": start},
        "end": {"dateTime": end},
    });
    if let Some(summary) = summary {
        event["summary"] = json!(summary);
    }
    event
}

/// Mounts the events-list endpoint, expecting exactly `calls` requests.
pub(crate) async fn mount_events(server: &MockServer, items: Value, calls: u64) {
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
        .expect(calls)
        .mount(server)
        .await;
}

/// Mounts the watch endpoint returning `resource_id` and an expiry `hours` out.
pub(crate) async fn mount_watch(server: &MockServer, resource_id: &str, hours: i64, calls: u64) {
    let expiration = (Utc::now() + Duration::hours(hours)).timestamp_millis();
    Mock::given(method("POST"))
        .and(path(WATCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "api#channel",
            "resourceId": resource_id,
            "expiration": expiration.to_string(),
        })))
        .expect(calls)
        .mount(server)
        .await;
}
