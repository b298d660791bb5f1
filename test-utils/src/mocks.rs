//! Test doubles for the identity provider and the HTTP transport.

use crate::fixtures::sample_credentials;
use async_trait::async_trait;
use duokey::{Credentials, HttpTransport, TransportError};
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the stub token endpoint.
pub const TOKEN_PATH: &str = "/connect/token";

/// Token response served by [`MockIdentityProvider`].
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// HTTP status of the token endpoint
    pub status: u16,
    /// Access token
    pub access_token: String,
    /// Token type
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: i64,
    /// Refresh token, if any
    pub refresh_token: Option<String>,
}

impl Default for TokenGrant {
    fn default() -> Self {
        Self {
            status: 200,
            access_token: uuid::Uuid::new_v4().simple().to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            refresh_token: None,
        }
    }
}

impl TokenGrant {
    /// Serve the given token type.
    #[must_use]
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    /// Serve the given lifetime.
    #[must_use]
    pub const fn with_expires_in(mut self, expires_in: i64) -> Self {
        self.expires_in = expires_in;
        self
    }

    /// Reject the grant with `status` and an OAuth2 error body.
    #[must_use]
    pub const fn rejected(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Also issue a refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    fn response(&self) -> ResponseTemplate {
        if self.status >= 300 {
            return ResponseTemplate::new(self.status).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "invalid username or password",
            }));
        }

        let mut body = json!({
            "access_token": self.access_token,
            "token_type": self.token_type,
            "expires_in": self.expires_in,
        });
        if let Some(refresh_token) = &self.refresh_token {
            body["refresh_token"] = json!(refresh_token);
        }
        ResponseTemplate::new(self.status).set_body_json(body)
    }
}

/// Stub OIDC provider serving discovery and a password grant.
pub struct MockIdentityProvider {
    server: MockServer,
    grant: TokenGrant,
}

impl MockIdentityProvider {
    /// Start a provider issuing a one-hour bearer token.
    pub async fn start() -> Self {
        Self::start_with(TokenGrant::default()).await
    }

    /// Start a provider answering grants with `grant`.
    pub async fn start_with(grant: TokenGrant) -> Self {
        let server = MockServer::start().await;
        mount_discovery(&server, &server.uri()).await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(grant.response())
            .mount(&server)
            .await;

        Self { server, grant }
    }

    /// Issuer URL, which is also the server's base URL.
    #[must_use]
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    /// The underlying server, for mounting operation stubs.
    #[must_use]
    pub const fn server(&self) -> &MockServer {
        &self.server
    }

    /// The grant served by the token endpoint.
    #[must_use]
    pub const fn grant(&self) -> &TokenGrant {
        &self.grant
    }

    /// Sample credentials pointing at this provider.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        sample_credentials(self.issuer())
    }

    /// Requests received by the token endpoint.
    pub async fn grant_requests(&self) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == TOKEN_PATH)
            .collect()
    }
}

/// Mount a discovery document for `issuer` whose token endpoint is on `server`.
pub async fn mount_discovery(server: &MockServer, issuer: &str) {
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path(duokey::credentials::DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{base}/connect/authorize"),
            "token_endpoint": format!("{base}{TOKEN_PATH}"),
            "jwks_uri": format!("{base}/.well-known/openid-configuration/jwks"),
            "grant_types_supported": ["password", "refresh_token", "client_credentials"],
        })))
        .mount(server)
        .await;
}

/// A request observed by [`CountingTransport`].
#[derive(Debug, Clone)]
pub struct SeenRequest {
    /// HTTP method
    pub method: Method,
    /// Full URL
    pub url: reqwest::Url,
    /// Headers
    pub headers: HeaderMap,
    /// Body bytes, if any
    pub body: Option<Vec<u8>>,
}

/// In-memory transport answering every request with the same response.
#[derive(Debug)]
pub struct CountingTransport {
    status: u16,
    body: Vec<u8>,
    calls: AtomicUsize,
    seen: Mutex<Vec<SeenRequest>>,
}

impl CountingTransport {
    /// Answer with `status` and `body`.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Answer 200 with `value` as JSON.
    #[must_use]
    pub fn ok_json(value: &Value) -> Self {
        Self::new(200, value.to_string())
    }

    /// Number of requests executed.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests executed so far.
    #[must_use]
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl HttpTransport for CountingTransport {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SeenRequest {
                method: request.method().clone(),
                url: request.url().clone(),
                headers: request.headers().clone(),
                body: request
                    .body()
                    .and_then(reqwest::Body::as_bytes)
                    .map(<[u8]>::to_vec),
            });

        let mut response = http::Response::new(self.body.clone());
        *response.status_mut() =
            http::StatusCode::from_u16(self.status).unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
        Ok(reqwest::Response::from(response))
    }
}
