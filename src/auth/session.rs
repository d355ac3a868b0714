use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axum::http::{header::InvalidHeaderValue, HeaderMap, HeaderValue};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use tracing::debug;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "gatehouse_session";

/// Token size in bytes (32 bytes = 256 bits of entropy).
const TOKEN_BYTES: usize = 32;

fn generate_token() -> String {
    let mut buffer = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut buffer);
    Base64UrlUnpadded::encode_string(&buffer)
}

/// Server-side session map: opaque token -> user id.
///
/// A token is either absent or active; `destroy` on an unknown token is a
/// no-op. No automatic expiry.
#[derive(Clone, Default)]
pub struct SessionManager {
    inner: Arc<RwLock<HashMap<String, Uuid>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a fresh opaque token to `user_id` and return it.
    pub fn create(&self, user_id: Uuid) -> String {
        let token = generate_token();
        self.inner
            .write()
            .expect("session map poisoned")
            .insert(token.clone(), user_id);
        debug!(user_id = %user_id, "session created");
        token
    }

    pub fn resolve(&self, token: &str) -> Option<Uuid> {
        self.inner
            .read()
            .expect("session map poisoned")
            .get(token)
            .copied()
    }

    /// Idempotent: destroying an unknown token does nothing.
    pub fn destroy(&self, token: &str) {
        if let Some(user_id) = self
            .inner
            .write()
            .expect("session map poisoned")
            .remove(token)
        {
            debug!(user_id = %user_id, "session destroyed");
        }
    }
}

/// Build the `Set-Cookie` value carrying the session token.
pub fn session_cookie(token: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Build the `Set-Cookie` value that clears the session cookie.
pub fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Pull the session token out of the `Cookie` request header, if present.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE {
            return Some(val.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_opaque() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        // 32 bytes of entropy encoded in base64, about 43 chars
        assert!(a.len() >= 42);
    }

    #[test]
    fn create_resolve_destroy() {
        let sessions = SessionManager::new();
        let user_id = Uuid::new_v4();

        let token = sessions.create(user_id);
        assert_eq!(sessions.resolve(&token), Some(user_id));

        sessions.destroy(&token);
        assert_eq!(sessions.resolve(&token), None);
    }

    #[test]
    fn destroy_is_idempotent() {
        let sessions = SessionManager::new();
        sessions.destroy("never-issued");

        let token = sessions.create(Uuid::new_v4());
        sessions.destroy(&token);
        sessions.destroy(&token);
        assert_eq!(sessions.resolve(&token), None);
    }

    #[test]
    fn cookie_roundtrip_through_headers() {
        let cookie = session_cookie("tok123", false).expect("valid header value");
        let mut headers = HeaderMap::new();
        // Simulate a browser echoing the cookie back alongside others.
        let echoed = format!(
            "theme=dark; {SESSION_COOKIE}=tok123; other=1",
        );
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_str(&echoed).unwrap(),
        );
        assert!(cookie.to_str().unwrap().contains("HttpOnly"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn missing_cookie_yields_none() {
        let headers = HeaderMap::new();
        assert_eq!(token_from_headers(&headers), None);
    }

    #[test]
    fn secure_flag_is_appended() {
        let cookie = session_cookie("tok", true).expect("valid header value");
        assert!(cookie.to_str().unwrap().ends_with("; Secure"));
        let clear = clear_session_cookie(false).expect("valid header value");
        assert!(clear.to_str().unwrap().contains("Max-Age=0"));
    }
}
