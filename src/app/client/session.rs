//! DSpace session: CSRF acquisition, login and authenticated requests
//!
//! A session owns one cookie-enabled HTTP client and the tokens that go with
//! it. Sessions are never shared; the bulk dispatcher gives every worker its
//! own. All request methods take `&mut self`, so a rotated CSRF token is always
//! installed before the next request can be built.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use url::Url;

use super::config::ClientConfig;
use super::http::{ApiResponse, HttpHandler};
use super::tokens;
use crate::app::models::CollectionSummary;
use crate::auth::Credentials;
use crate::constants::dspace;
use crate::errors::{AuthError, AuthResult};

/// One authenticated conversation with a DSpace server
#[derive(Debug)]
pub struct DspaceSession {
    http: HttpHandler,
    api_root: Url,
    credentials: Option<Credentials>,
    authenticated: bool,
}

impl DspaceSession {
    /// Creates an unauthenticated session
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the server URL is invalid or the HTTP client
    /// cannot be built
    pub fn new(config: &ClientConfig) -> AuthResult<Self> {
        let api_root = config.api_root()?;
        let client = config.build_http_client()?;
        let http = HttpHandler::new(client, config.rate_limit_rps)?;

        Ok(Self {
            http,
            api_root,
            credentials: None,
            authenticated: false,
        })
    }

    /// Creates a session and authenticates it
    ///
    /// Probes the API, acquires a CSRF token and logs in.
    pub async fn connect(config: &ClientConfig, credentials: Credentials) -> AuthResult<Self> {
        let mut session = Self::new(config)?;
        session.test_connection().await?;
        session.acquire_csrf().await?;
        session.login(credentials).await?;
        Ok(session)
    }

    /// Resolve an endpoint path relative to the API root
    pub fn endpoint(&self, path: &str) -> AuthResult<Url> {
        self.api_root.join(path).map_err(|e| AuthError::InvalidUrl {
            url: format!("{}{}", self.api_root, path),
            reason: e.to_string(),
        })
    }

    /// Checks that the REST API answers at all
    ///
    /// Any HTTP answer counts as reachable; only transport failures are errors.
    pub async fn test_connection(&mut self) -> AuthResult<StatusCode> {
        let url = self.endpoint(dspace::COLLECTIONS_ENDPOINT)?;
        tracing::debug!("Testing connection to {}", url);

        let request = self.http.client().get(url);
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|source| AuthError::ConnectionUnreachable {
                url: self.api_root.to_string(),
                source,
            })?;

        if !response.is_success() {
            tracing::warn!(
                "Connectivity probe answered HTTP {} at {}",
                response.status,
                self.api_root
            );
        }
        Ok(response.status)
    }

    /// Fetches a CSRF token from the security endpoint
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoTokenFound` if the endpoint answers with an
    /// unexpected status or without a token in headers, cookies or body
    pub async fn acquire_csrf(&mut self) -> AuthResult<String> {
        let url = self.endpoint(dspace::CSRF_ENDPOINT)?;
        let request = self.http.client().get(url);
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|source| AuthError::ConnectionUnreachable {
                url: self.api_root.to_string(),
                source,
            })?;

        if !matches!(response.status, StatusCode::OK | StatusCode::NO_CONTENT) {
            tracing::warn!("CSRF endpoint answered HTTP {}", response.status);
            return Err(AuthError::NoTokenFound);
        }

        let token = tokens::extract_token(&response.headers, &response.body)
            .ok_or(AuthError::NoTokenFound)?;
        tracing::debug!("Acquired CSRF token via {:?}", token.source);
        Ok(token.value)
    }

    /// Logs in with form-encoded credentials
    ///
    /// On success the bearer token from the `Authorization` header is used for
    /// every later request of this session.
    pub async fn login(&mut self, credentials: Credentials) -> AuthResult<()> {
        if self.http.tokens().csrf().is_none() {
            self.acquire_csrf().await?;
        }
        self.http.tokens_mut().clear_bearer();
        self.authenticated = false;

        tracing::info!("Logging in to DSpace as {}", credentials.email);
        let url = self.endpoint(dspace::LOGIN_ENDPOINT)?;
        let request = self.http.client().post(url).form(&[
            ("user", credentials.email.as_str()),
            ("password", credentials.password.as_str()),
        ]);
        let response = self.http.execute(request).await?;

        if response.status != StatusCode::OK {
            tracing::warn!("DSpace login rejected with HTTP {}", response.status);
            return Err(AuthError::AuthRejected {
                status: response.status_code(),
                body: response.body_preview(),
            });
        }

        match tokens::extract_bearer(&response.headers) {
            Some(bearer) => self.http.tokens_mut().set_bearer(bearer),
            None => tracing::warn!("Login succeeded without an Authorization header"),
        }

        self.credentials = Some(credentials);
        self.authenticated = true;
        tracing::info!("Authenticated with DSpace");
        Ok(())
    }

    async fn relogin(&mut self) -> AuthResult<()> {
        let credentials = self.credentials.clone().ok_or(AuthError::MissingCredentials)?;
        self.acquire_csrf().await?;
        self.login(credentials).await
    }

    /// Sends an authenticated request, re-logging in once on 401/403
    ///
    /// `build` is called again for the replay, so it must produce the same
    /// request each time. A second 401/403 is returned to the caller as-is.
    pub async fn send<F>(&mut self, build: F) -> AuthResult<ApiResponse>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let request = build(self.http.client());
        let response = self.http.execute(request).await?;

        if !response.is_auth_failure() || self.credentials.is_none() {
            return Ok(response);
        }

        tracing::warn!(
            "DSpace answered HTTP {}, re-authenticating once",
            response.status
        );
        self.relogin().await?;

        let request = build(self.http.client());
        Ok(self.http.execute(request).await?)
    }

    /// Lists all collections as (uuid, name) pairs
    pub async fn list_collections(&mut self) -> AuthResult<Vec<CollectionSummary>> {
        let mut collections = Vec::new();
        let mut page = 0u32;

        loop {
            let mut url = self.endpoint(dspace::COLLECTIONS_ENDPOINT)?;
            url.query_pairs_mut()
                .append_pair("page", &page.to_string())
                .append_pair("size", &dspace::COLLECTION_PAGE_SIZE.to_string());

            let response = self.send(|client| client.get(url.clone())).await?;
            if !response.is_success() {
                return Err(AuthError::UnexpectedResponse {
                    endpoint: url.to_string(),
                    reason: format!("HTTP {} - {}", response.status, response.body_preview()),
                });
            }

            let listing: CollectionPage =
                response.json().map_err(|e| AuthError::UnexpectedResponse {
                    endpoint: url.to_string(),
                    reason: e.to_string(),
                })?;
            collections.extend(listing.embedded.collections);

            match listing.page {
                Some(info) if info.number + 1 < info.total_pages => page += 1,
                _ => break,
            }
        }

        Ok(collections)
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.http.tokens().csrf()
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.http.tokens().bearer()
    }

    pub fn api_root(&self) -> &Url {
        &self.api_root
    }
}

#[derive(Debug, Deserialize)]
struct CollectionPage {
    #[serde(rename = "_embedded", default)]
    embedded: EmbeddedCollections,
    page: Option<PageInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddedCollections {
    #[serde(default)]
    collections: Vec<CollectionSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    number: u32,
    total_pages: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_unauthenticated() {
        let session = DspaceSession::new(&ClientConfig::default()).unwrap();
        assert!(!session.is_authenticated());
        assert!(session.csrf_token().is_none());
        assert!(session.bearer_token().is_none());
        assert_eq!(
            session.api_root().as_str(),
            "http://localhost:8080/server/api/"
        );
    }

    #[test]
    fn test_endpoint_resolution() {
        let session =
            DspaceSession::new(&ClientConfig::for_server("https://repo.example.org")).unwrap();
        assert_eq!(
            session.endpoint(dspace::CSRF_ENDPOINT).unwrap().as_str(),
            "https://repo.example.org/server/api/security/csrf"
        );
    }

    #[test]
    fn test_collection_page_parsing() {
        let body = r#"{
            "_embedded": {"collections": [
                {"uuid": "c1", "name": "Theses", "handle": "123/4"},
                {"uuid": "c2", "name": "Scans"}
            ]},
            "page": {"size": 100, "totalElements": 2, "totalPages": 1, "number": 0}
        }"#;
        let page: CollectionPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.embedded.collections.len(), 2);
        assert_eq!(page.embedded.collections[1].name, "Scans");
        assert_eq!(page.page.unwrap().total_pages, 1);

        let empty: CollectionPage = serde_json::from_str("{}").unwrap();
        assert!(empty.embedded.collections.is_empty());
    }
}
