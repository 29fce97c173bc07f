//! CSRF and bearer token handling
//!
//! DSpace rotates its CSRF token on many responses. Every response that
//! passes through a session is handed to [`TokenStore::observe`] before the
//! next request is built, so requests always carry the latest token.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, SET_COOKIE};
use reqwest::RequestBuilder;
use serde_json::Value;

use crate::constants::auth;

/// Where a CSRF token was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Header(&'static str),
    Cookie(&'static str),
    Body(&'static str),
}

/// A CSRF token together with its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedToken {
    pub value: String,
    pub source: TokenSource,
}

/// Extract a CSRF token from a response
///
/// Lookup order: named response headers, then `Set-Cookie` cookies, then
/// JSON body keys. The first non-empty match wins.
pub fn extract_token(headers: &HeaderMap, body: &[u8]) -> Option<ObservedToken> {
    token_from_headers(headers)
        .or_else(|| token_from_cookies(headers))
        .or_else(|| token_from_body(body))
}

fn token_from_headers(headers: &HeaderMap) -> Option<ObservedToken> {
    auth::CSRF_HEADERS.iter().find_map(|&name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|value| ObservedToken {
                value: value.to_string(),
                source: TokenSource::Header(name),
            })
    })
}

fn token_from_cookies(headers: &HeaderMap) -> Option<ObservedToken> {
    let cookies: Vec<(&str, &str)> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(parse_cookie_pair)
        .collect();

    auth::CSRF_COOKIES.iter().find_map(|&name| {
        cookies
            .iter()
            .find(|(cookie, value)| cookie.eq_ignore_ascii_case(name) && !value.is_empty())
            .map(|(_, value)| ObservedToken {
                value: value.to_string(),
                source: TokenSource::Cookie(name),
            })
    })
}

/// Name and value of a `Set-Cookie` header, ignoring attributes
fn parse_cookie_pair(header: &str) -> Option<(&str, &str)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    Some((name.trim(), value.trim().trim_matches('"')))
}

fn token_from_body(body: &[u8]) -> Option<ObservedToken> {
    if body.is_empty() {
        return None;
    }
    let json: Value = serde_json::from_slice(body).ok()?;
    let object = json.as_object()?;

    auth::CSRF_BODY_KEYS.iter().find_map(|&key| {
        object
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(|value| ObservedToken {
                value: value.to_string(),
                source: TokenSource::Body(key),
            })
    })
}

/// Bearer token from a login response's `Authorization` header
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Current CSRF and bearer tokens of one session
#[derive(Debug, Default, Clone)]
pub struct TokenStore {
    csrf: Option<String>,
    bearer: Option<String>,
    rotations: u64,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect a response and install any fresh CSRF token
    ///
    /// Returns true if the cached token changed.
    pub fn observe(&mut self, headers: &HeaderMap, body: &[u8]) -> bool {
        let Some(observed) = extract_token(headers, body) else {
            return false;
        };

        if self.csrf.as_deref() == Some(observed.value.as_str()) {
            return false;
        }

        tracing::debug!(
            "CSRF token rotated via {:?}: {}...",
            observed.source,
            preview(&observed.value)
        );
        self.csrf = Some(observed.value);
        self.rotations += 1;
        true
    }

    pub fn csrf(&self) -> Option<&str> {
        self.csrf.as_deref()
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    pub fn set_bearer(&mut self, bearer: String) {
        self.bearer = Some(bearer);
    }

    /// Forget the bearer token before a re-login
    pub fn clear_bearer(&mut self) {
        self.bearer = None;
    }

    /// Number of times the CSRF token changed
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    /// Attach the current tokens to an outgoing request
    pub fn apply(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(csrf) = self.csrf.as_deref().and_then(|t| HeaderValue::from_str(t).ok()) {
            for name in auth::CSRF_REQUEST_HEADERS {
                request = request.header(name, csrf.clone());
            }
        }
        if let Some(bearer) = self.bearer.as_deref() {
            request = request.header(AUTHORIZATION, bearer);
        }
        request
    }
}

fn preview(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    &token[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_header_wins_over_cookie_and_body() {
        let map = headers(&[
            ("set-cookie", "DSPACE-XSRF-COOKIE=from-cookie; Path=/server"),
            ("dspace-xsrf-token", "from-header"),
        ]);
        let token = extract_token(&map, br#"{"token":"from-body"}"#).unwrap();
        assert_eq!(token.value, "from-header");
        assert_eq!(token.source, TokenSource::Header("DSPACE-XSRF-TOKEN"));
    }

    #[test]
    fn test_header_priority_order() {
        let map = headers(&[("x-xsrf-token", "third"), ("xsrf-token", "second")]);
        assert_eq!(extract_token(&map, b"").unwrap().value, "second");
    }

    #[test]
    fn test_cookie_priority_order() {
        let map = headers(&[
            ("set-cookie", "XSRF-TOKEN=low; Path=/"),
            ("set-cookie", "JSESSIONID=abc; HttpOnly"),
            ("set-cookie", "DSPACE-XSRF-COOKIE=high; Path=/server; SameSite=Lax"),
        ]);
        let token = extract_token(&map, b"").unwrap();
        assert_eq!(token.value, "high");
        assert_eq!(token.source, TokenSource::Cookie("DSPACE-XSRF-COOKIE"));
    }

    #[test]
    fn test_body_keys() {
        let map = HeaderMap::new();
        let token = extract_token(&map, br#"{"csrfToken":"b1","xsrfToken":"b2"}"#).unwrap();
        assert_eq!(token.value, "b1");
        assert_eq!(token.source, TokenSource::Body("csrfToken"));

        assert!(extract_token(&map, b"not json").is_none());
        assert!(extract_token(&map, br#"["token"]"#).is_none());
        assert!(extract_token(&map, br#"{"token":""}"#).is_none());
    }

    #[test]
    fn test_observe_rotates_only_on_change() {
        let mut store = TokenStore::new();
        assert!(store.observe(&headers(&[("dspace-xsrf-token", "t1")]), b""));
        assert!(!store.observe(&headers(&[("dspace-xsrf-token", "t1")]), b""));
        assert!(!store.observe(&HeaderMap::new(), b""));
        assert_eq!(store.csrf(), Some("t1"));

        assert!(store.observe(&headers(&[("dspace-xsrf-token", "t2")]), b""));
        assert_eq!(store.csrf(), Some("t2"));
        assert_eq!(store.rotations(), 2);
    }

    #[test]
    fn test_bearer_extraction() {
        let map = headers(&[("authorization", "Bearer eyJhbGciOi")]);
        assert_eq!(extract_bearer(&map).as_deref(), Some("Bearer eyJhbGciOi"));
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }

    #[test]
    fn test_apply_sets_both_csrf_headers_and_bearer() {
        let mut store = TokenStore::new();
        store.observe(&headers(&[("dspace-xsrf-token", "abc")]), b"");
        store.set_bearer("Bearer xyz".to_string());

        let request = store
            .apply(reqwest::Client::new().get("http://localhost/"))
            .build()
            .unwrap();
        assert_eq!(request.headers()["X-XSRF-TOKEN"], "abc");
        assert_eq!(request.headers()["DSPACE-XSRF-TOKEN"], "abc");
        assert_eq!(request.headers()["Authorization"], "Bearer xyz");
    }
}
