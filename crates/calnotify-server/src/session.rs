//! Signed session cookie.
//!
//! The session is a small HS256 JWT in an HttpOnly cookie. It carries the
//! in-flight OAuth `state` and PKCE verifier between `/authorize` and
//! `/oauth2callback`, and an `authorized` flag afterwards. Credentials
//! themselves never go in the cookie; they live in the token file.

use axum::http::{HeaderMap, header};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cookie name.
pub const SESSION_COOKIE: &str = "calnotify_session";

/// Per-browser session data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// CSRF `state` sent with the pending authorization request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_state: Option<String>,
    /// PKCE verifier for the pending authorization request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkce_verifier: Option<String>,
    /// Set once the OAuth callback completed.
    #[serde(default)]
    pub authorized: bool,
}

impl Session {
    /// A session waiting for the callback of the given flow.
    pub fn pending(state: impl Into<String>, verifier: impl Into<String>) -> Self {
        Self {
            oauth_state: Some(state.into()),
            pkce_verifier: Some(verifier.into()),
            authorized: false,
        }
    }

    pub fn authorized() -> Self {
        Self {
            authorized: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    session: Session,
    iat: i64,
    exp: i64,
}

/// Signs and verifies session cookies.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    secure: bool,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("ttl", &self.ttl)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::days(7),
            secure: false,
        }
    }

    /// Builder: set cookie lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Builder: add the `Secure` attribute (HTTPS deployments).
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Encodes `session` as a signed token.
    pub fn issue(&self, session: &Session) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            session: session.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    /// Decodes a token; `None` when invalid, expired or forged.
    pub fn verify(&self, token: &str) -> Option<Session> {
        match decode::<Claims>(token, &self.decoding, &Validation::default()) {
            Ok(data) => Some(data.claims.session),
            Err(e) => {
                debug!(error = %e, "ignoring invalid session cookie");
                None
            }
        }
    }

    /// Reads the session from request headers, or an empty one.
    pub fn read(&self, headers: &HeaderMap) -> Session {
        extract_cookie(headers, SESSION_COOKIE)
            .and_then(|token| self.verify(&token))
            .unwrap_or_default()
    }

    /// `Set-Cookie` value carrying `session`.
    pub fn cookie(&self, session: &Session) -> Result<String, jsonwebtoken::errors::Error> {
        let token = self.issue(session)?;
        Ok(format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
            SESSION_COOKIE,
            token,
            self.ttl.num_seconds(),
            if self.secure { "; Secure" } else { "" }
        ))
    }
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for cookie_str in value.split(';') {
            if let Ok(cookie) = cookie::Cookie::parse(cookie_str.trim())
                && cookie.name() == name
            {
                return Some(cookie.value().to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    fn token_of(set_cookie: &str) -> &str {
        set_cookie
            .split(';')
            .next()
            .and_then(|kv| kv.split_once('='))
            .map(|(_, v)| v)
            .unwrap()
    }

    #[test]
    fn roundtrip_through_cookie() {
        let keys = SessionKeys::new("test-secret");
        let session = Session::pending("st", "ver");
        let set_cookie = keys.cookie(&session).unwrap();

        assert!(set_cookie.starts_with("calnotify_session="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Lax"));
        assert!(!set_cookie.contains("Secure"));

        let headers = headers_with(&format!("other=1; calnotify_session={}", token_of(&set_cookie)));
        assert_eq!(keys.read(&headers), session);
    }

    #[test]
    fn wrong_secret_is_ignored() {
        let token = SessionKeys::new("a").issue(&Session::authorized()).unwrap();
        let headers = headers_with(&format!("calnotify_session={}", token));
        assert_eq!(SessionKeys::new("b").read(&headers), Session::default());
    }

    #[test]
    fn expired_session_is_ignored() {
        let keys = SessionKeys::new("s").with_ttl(Duration::hours(-2));
        let token = keys.issue(&Session::authorized()).unwrap();
        assert!(keys.verify(&token).is_none());
    }

    #[test]
    fn missing_cookie_is_empty_session() {
        let keys = SessionKeys::new("s");
        assert_eq!(keys.read(&HeaderMap::new()), Session::default());
        assert_eq!(keys.read(&headers_with("calnotify_session=garbage")), Session::default());
    }

    #[test]
    fn secure_cookie_and_lifetime() {
        let keys = SessionKeys::new("s")
            .with_secure(true)
            .with_ttl(Duration::hours(1));
        let set_cookie = keys.cookie(&Session::authorized()).unwrap();
        assert!(set_cookie.contains("Max-Age=3600"));
        assert!(set_cookie.ends_with("; Secure"));
    }
}
