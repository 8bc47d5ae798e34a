//! HTTP routes.
//!
//! | Route                  | Purpose                                          |
//! |------------------------|--------------------------------------------------|
//! | `GET /`                | Upcoming events page, authorizing on first visit |
//! | `GET /authorize`       | Redirect to the Google consent screen            |
//! | `GET /oauth2callback`  | Finish authorization and register the watch      |
//! | `POST /notifications`  | Google push notification webhook                 |
//! | `GET /health`          | Liveness                                         |

use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use calnotify_providers::PkceFlow;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::{ServerError, ServerResult};
use crate::render::render_events;
use crate::session::{Session, SessionKeys};
use crate::sync::CalendarService;
use crate::watch::WatchKeeper;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<CalendarService>,
    pub watch: Arc<WatchKeeper>,
    pub sessions: Arc<SessionKeys>,
    /// `{PUBLIC_URL}/oauth2callback`.
    pub redirect_uri: Arc<str>,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/authorize", get(authorize))
        .route("/oauth2callback", get(oauth2callback))
        .route("/notifications", post(notifications))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(State(state): State<AppState>, headers: HeaderMap) -> ServerResult<Response> {
    let cache = state.service.cache();

    if cache.needs_rebuild().await {
        if !state.sessions.read(&headers).authorized {
            debug!("no session and empty cache, starting authorization");
            return Ok(Redirect::to("/authorize").into_response());
        }
        state.service.rebuild().await?;
    }

    let events = cache.get().await;
    Ok(Html(render_events(&events)).into_response())
}

async fn authorize(State(state): State<AppState>) -> ServerResult<Response> {
    let flow = PkceFlow::new();
    let url = state
        .service
        .store()
        .oauth()
        .authorization_url(&flow, &state.redirect_uri);
    let cookie = state
        .sessions
        .cookie(&Session::pending(flow.state, flow.verifier))?;

    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(&url)).into_response())
}

/// Query parameters Google appends to the redirect URI.
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn oauth2callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> ServerResult<Response> {
    if let Some(error) = params.error {
        return Err(ServerError::bad_callback(format!("provider returned '{}'", error)));
    }

    let session = state.sessions.read(&headers);
    let (Some(expected), Some(verifier)) = (session.oauth_state, session.pkce_verifier) else {
        return Err(ServerError::bad_callback("no authorization in progress"));
    };
    if params.state.as_deref() != Some(expected.as_str()) {
        return Err(ServerError::bad_callback("state mismatch"));
    }
    let code = params
        .code
        .ok_or_else(|| ServerError::bad_callback("missing authorization code"))?;

    let store = state.service.store();
    let credential = store
        .oauth()
        .exchange_code(&code, &verifier, &state.redirect_uri)
        .await?;
    store.store_new(&credential).await?;

    let channel = state.watch.register().await?;
    info!(
        channel_id = %channel.channel_id,
        expiration = ?channel.expiration,
        "authorized, notification channel registered"
    );

    let cookie = state.sessions.cookie(&Session::authorized())?;
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response())
}

async fn notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServerResult<StatusCode> {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string()
    };
    info!(
        channel_id = %header_str("x-goog-channel-id"),
        resource_state = %header_str("x-goog-resource-state"),
        "calendar change notification"
    );

    state.service.rebuild().await?;
    Ok(StatusCode::OK)
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EVENTS_PATH, Fixture, event_json, mount_events, mount_watch};
    use crate::watch::WatchConfig;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use calnotify_providers::Credential;
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, ResponseTemplate};

    const REDIRECT_URI: &str = "http://localhost:5000/oauth2callback";

    fn state(fx: &Fixture) -> AppState {
        AppState {
            service: fx.service.clone(),
            watch: Arc::new(WatchKeeper::new(
                fx.service.clone(),
                "http://localhost:5000/notifications".into(),
                WatchConfig::default(),
            )),
            sessions: Arc::new(SessionKeys::new("test-secret")),
            redirect_uri: REDIRECT_URI.into(),
        }
    }

    /// `Cookie` request header value for `session`.
    fn cookie_header(state: &AppState, session: &Session) -> String {
        let set_cookie = state.sessions.cookie(session).unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    fn query_param(url: &str, name: &str) -> String {
        url::Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let fx = Fixture::without_token().await;
        let response = router(state(&fx)).oneshot(get("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn index_without_session_redirects_to_authorize() {
        let fx = Fixture::with_token().await;
        mount_events(&fx.server, json!([]), 0).await;

        let response = router(state(&fx)).oneshot(get("/", None)).await.unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/authorize");
    }

    #[tokio::test]
    async fn index_with_session_rebuilds_and_renders() {
        let fx = Fixture::with_token().await;
        mount_events(
            &fx.server,
            json!([event_json(
                "a",
                Some("Standup <team>"),
                "2030-01-01T09:00:00Z",
                "2030-01-01T09:30:00Z"
            )]),
            1,
        )
        .await;
        let state = state(&fx);
        let cookie = cookie_header(&state, &Session::authorized());

        let response = router(state).oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_string(response).await;
        assert!(body.contains("Standup &lt;team&gt;"));
        assert!(body.contains("Tuesday, 01 January 2030 — 02:30 PM"));
    }

    #[tokio::test]
    async fn index_serves_cache_without_session() {
        let fx = Fixture::with_token().await;
        mount_events(
            &fx.server,
            json!([event_json("a", Some("Review"), "2030-01-01T09:00:00Z", "2030-01-01T10:00:00Z")]),
            1,
        )
        .await;
        fx.service.rebuild().await.unwrap();

        let response = router(state(&fx)).oneshot(get("/", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("Review"));
    }

    #[tokio::test]
    async fn index_rebuild_failure_is_generic_500() {
        let fx = Fixture::with_token().await;
        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("backend exploded"))
            .mount(&fx.server)
            .await;
        let state = state(&fx);
        let cookie = cookie_header(&state, &Session::authorized());

        let response = router(state).oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body_string(response).await.contains("backend exploded"));
    }

    #[tokio::test]
    async fn authorize_redirects_with_pending_session() {
        let fx = Fixture::without_token().await;
        let state = state(&fx);

        let response = router(state.clone())
            .oneshot(get("/authorize", None))
            .await
            .unwrap();
        assert!(response.status().is_redirection());

        let url = location(&response).to_string();
        assert!(url.starts_with(&format!("{}/auth?", fx.server.uri())));
        assert_eq!(query_param(&url, "redirect_uri"), REDIRECT_URI);
        assert_eq!(query_param(&url, "access_type"), "offline");
        assert_eq!(query_param(&url, "prompt"), "consent");
        assert_eq!(query_param(&url, "code_challenge_method"), "S256");

        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            set_cookie.split(';').next().unwrap().parse().unwrap(),
        );
        let session = state.sessions.read(&headers);
        assert_eq!(session.oauth_state, Some(query_param(&url, "state")));
        let verifier = session.pkce_verifier.unwrap();
        assert_eq!(
            PkceFlow::compute_challenge(&verifier),
            query_param(&url, "code_challenge")
        );
        assert!(!session.authorized);
    }

    #[tokio::test]
    async fn callback_with_provider_error_is_400() {
        let fx = Fixture::without_token().await;
        let response = router(state(&fx))
            .oneshot(get("/oauth2callback?error=access_denied", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn callback_with_state_mismatch_is_400() {
        let fx = Fixture::without_token().await;
        let state = state(&fx);
        let cookie = cookie_header(&state, &Session::pending("expected", "verifier"));

        let response = router(state)
            .oneshot(get("/oauth2callback?code=c&state=forged", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn callback_without_pending_session_is_400() {
        let fx = Fixture::without_token().await;
        let response = router(state(&fx))
            .oneshot(get("/oauth2callback?code=c&state=s", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn callback_persists_credential_and_registers_watch() {
        let fx = Fixture::without_token().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("code_verifier=the-verifier"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-access",
                "refresh_token": "fresh-refresh",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&fx.server)
            .await;
        mount_watch(&fx.server, "res-1", 24 * 7, 1).await;

        let state = state(&fx);
        let cookie = cookie_header(&state, &Session::pending("st", "the-verifier"));

        let response = router(state.clone())
            .oneshot(get("/oauth2callback?code=the-code&state=st", Some(&cookie)))
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/");

        let stored: Credential = fx.service.store().load().unwrap();
        assert_eq!(stored.access_token, "fresh-access");
        assert_eq!(stored.refresh_token.as_deref(), Some("fresh-refresh"));

        let channel = state.watch.current().await.unwrap();
        assert_eq!(channel.resource_id.as_deref(), Some("res-1"));

        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            set_cookie.split(';').next().unwrap().parse().unwrap(),
        );
        assert!(state.sessions.read(&headers).authorized);
    }

    #[tokio::test]
    async fn notification_without_token_is_401_without_provider_call() {
        let fx = Fixture::without_token().await;
        mount_events(&fx.server, json!([]), 0).await;

        let request = Request::post("/notifications")
            .header("X-Goog-Channel-ID", "chan-1")
            .header("X-Goog-Resource-State", "exists")
            .body(Body::empty())
            .unwrap();
        let response = router(state(&fx)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn notification_rebuilds_cache() {
        let fx = Fixture::with_token().await;
        mount_events(
            &fx.server,
            json!([
                event_json("a", Some("Sooner"), "2030-01-01T09:00:00Z", "2030-01-01T10:00:00Z"),
                event_json("b", Some("Later"), "2030-01-02T09:00:00Z", "2030-01-02T10:00:00Z")
            ]),
            1,
        )
        .await;

        let request = Request::post("/notifications")
            .header("X-Goog-Resource-State", "exists")
            .body(Body::empty())
            .unwrap();
        let response = router(state(&fx)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cached = fx.service.cache().get().await;
        let ids: Vec<_> = cached.iter().map(|v| v.event.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
