//! Core HTTP operations with rate limiting and token rotation
//!
//! Every request of a session goes through [`HttpHandler::execute`], which
//! waits on the rate limiter, attaches the current tokens, reads the whole
//! response and feeds it to the token store before returning.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::tokens::TokenStore;
use crate::constants::limits;
use crate::errors::{AuthError, AuthResult};

/// A fully-read DSpace response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// 401 or 403, the statuses that trigger a re-login
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self.status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        )
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Body as text, truncated for error messages
    pub fn body_preview(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        if text.chars().count() <= limits::ERROR_BODY_PREVIEW {
            text.into_owned()
        } else {
            let mut preview: String = text.chars().take(limits::ERROR_BODY_PREVIEW).collect();
            preview.push_str("...");
            preview
        }
    }
}

/// HTTP operations handler for one session
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>,
    tokens: TokenStore,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and rate limiting
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the rate limit is zero
    pub fn new(client: Client, rate_limit_rps: u32) -> AuthResult<Self> {
        let rate_limiter = Self::build_rate_limiter(rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
            tokens: TokenStore::new(),
        })
    }

    fn build_rate_limiter(
        rate_limit_rps: u32,
    ) -> AuthResult<RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| AuthError::InvalidClientConfig {
            reason: "Rate limit must be non-zero".to_string(),
        })?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Sends a request with the current tokens and returns the read response
    ///
    /// The response is passed through the token store before this returns,
    /// so the next request built on this handler sees any rotated token.
    pub async fn execute(&mut self, request: RequestBuilder) -> Result<ApiResponse, reqwest::Error> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(20)))
            .await;

        let request = self.tokens.apply(request).build()?;
        let method = request.method().clone();
        let url = request.url().clone();

        let response = self.client.execute(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        self.tokens.observe(&headers, &body);
        tracing::debug!("{} {} -> {}", method, url, status);

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn tokens_mut(&mut self) -> &mut TokenStore {
        &mut self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::client::config::ClientConfig;

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_rate_limiter_creation() {
        let rate_limiter = HttpHandler::build_rate_limiter(5).unwrap();
        rate_limiter.until_ready().await;
    }

    #[test]
    fn test_rate_limiter_zero_fails() {
        assert!(HttpHandler::build_rate_limiter(0).is_err());
    }

    #[test]
    fn test_http_handler_creation() {
        let config = ClientConfig::default();
        let client = config.build_http_client().unwrap();
        let handler = HttpHandler::new(client, 5).unwrap();
        assert!(handler.tokens().csrf().is_none());
        assert!(handler.tokens().bearer().is_none());
    }

    #[test]
    fn test_auth_failure_statuses() {
        assert!(response(401, "").is_auth_failure());
        assert!(response(403, "").is_auth_failure());
        assert!(!response(404, "").is_auth_failure());
        assert!(!response(422, "").is_auth_failure());
    }

    #[test]
    fn test_body_preview_truncates() {
        let long = "x".repeat(limits::ERROR_BODY_PREVIEW + 50);
        let preview = response(500, &long).body_preview();
        assert_eq!(preview.len(), limits::ERROR_BODY_PREVIEW + 3);
        assert!(preview.ends_with("..."));

        assert_eq!(response(400, "short").body_preview(), "short");
    }

    #[test]
    fn test_json_body() {
        let parsed: serde_json::Value = response(201, r#"{"id": 42}"#).json().unwrap();
        assert_eq!(parsed["id"], 42);
    }
}
