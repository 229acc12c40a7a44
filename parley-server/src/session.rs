//! Signed session cookie

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use parley_core::config::SessionConfig;
use parley_core::conversation::SessionId;

/// Session resolved from the request's cookie
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub is_new: bool,
}

impl Session {
    /// Resolve the session from the `Cookie` headers.
    ///
    /// A missing cookie, or one whose signature does not verify, starts a
    /// fresh session.
    pub fn from_headers(headers: &HeaderMap, config: &SessionConfig) -> Self {
        let existing = cookie_value(headers, &config.cookie_name)
            .and_then(|value| SessionId::verify(value, &config.secret_key));

        match existing {
            Some(id) => Self { id, is_new: false },
            None => {
                let id = SessionId::generate();
                tracing::debug!(session = %id, "starting new session");
                Self { id, is_new: true }
            }
        }
    }

    /// `Set-Cookie` value carrying this session with a refreshed lifetime.
    pub fn set_cookie(&self, config: &SessionConfig) -> String {
        format!(
            "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
            config.cookie_name,
            self.id.sign(&config.secret_key),
            config.ttl.as_secs()
        )
    }

    /// Attach the session cookie to a response.
    pub fn attach(&self, config: &SessionConfig, mut response: Response) -> Response {
        match HeaderValue::try_from(self.set_cookie(config)) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(error) => tracing::warn!(%error, "session cookie is not a valid header value"),
        }
        response
    }
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig {
            secret_key: "test-secret".to_string(),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_missing_cookie_starts_new_session() {
        let session = Session::from_headers(&HeaderMap::new(), &config());
        assert!(session.is_new);
    }

    #[test]
    fn test_signed_cookie_round_trips() {
        let config = config();
        let id = SessionId::generate();

        let mut headers = HeaderMap::new();
        let cookie = format!("theme=dark; parley_session={}", id.sign(&config.secret_key));
        headers.insert(COOKIE, HeaderValue::from_str(&cookie).unwrap());

        let session = Session::from_headers(&headers, &config);
        assert!(!session.is_new);
        assert_eq!(session.id, id);
    }

    #[test]
    fn test_forged_cookie_is_ignored() {
        let config = config();
        let id = SessionId::generate();

        let mut headers = HeaderMap::new();
        let cookie = format!("parley_session={}", id.sign("other-secret"));
        headers.insert(COOKIE, HeaderValue::from_str(&cookie).unwrap());

        let session = Session::from_headers(&headers, &config);
        assert!(session.is_new);
        assert_ne!(session.id, id);
    }

    #[test]
    fn test_set_cookie_attributes() {
        let config = config();
        let session = Session::from_headers(&HeaderMap::new(), &config);
        let cookie = session.set_cookie(&config);

        assert!(cookie.starts_with(&format!("parley_session={}.", session.id)));
        assert!(cookie.contains("Max-Age=7200"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
    }
}
