//! OAuth2 access tokens and the authorized transport.
//!
//! The token endpoint speaks the password and refresh-token grants. The
//! [`TokenSource`] caches the current token and refreshes it single-flight;
//! [`AuthorizedTransport`] attaches it to every request.

use crate::error::{DuoKeyError, DuoKeyResult, TransportError};
use crate::transport::HttpTransport;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

/// Tokens are treated as expired this many seconds before their actual expiry.
pub const EXPIRY_DELTA_SECS: i64 = 10;

/// An OAuth2 access token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    secret: SecretString,
    token_type: String,
    refresh_token: Option<SecretString>,
    expiry: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Create a token. `token_type` is normalized so any casing of "bearer" becomes "Bearer".
    #[must_use]
    pub fn new(
        secret: impl Into<SecretString>,
        token_type: impl Into<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Self {
        let token_type = token_type.into();
        let token_type = if token_type.eq_ignore_ascii_case("bearer") {
            "Bearer".to_string()
        } else {
            token_type
        };
        Self {
            secret: secret.into(),
            token_type,
            refresh_token: None,
            expiry,
        }
    }

    /// Attach a refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<SecretString>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Token type, normalized.
    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Expiry time, if the server sent one.
    #[must_use]
    pub const fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    /// Whether a refresh token was issued.
    #[must_use]
    pub const fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Whether the token is within [`EXPIRY_DELTA_SECS`] of its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .is_some_and(|expiry| expiry - TimeDelta::seconds(EXPIRY_DELTA_SECS) <= now)
    }

    /// Whether the token is non-empty and not expired.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.secret.expose_secret().is_empty() && !self.is_expired_at(Utc::now())
    }

    /// Check the token is usable as a bearer credential.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::TokenValidation`] if the token is empty, expired,
    /// or not of type "Bearer".
    pub fn validate(self) -> DuoKeyResult<Self> {
        if !self.is_valid() {
            return Err(DuoKeyError::TokenValidation(
                "failed to check the token: empty or expired".to_string(),
            ));
        }
        if self.token_type != "Bearer" {
            return Err(DuoKeyError::TokenValidation(format!(
                "bad token: expected 'Bearer', got '{}'",
                self.token_type
            )));
        }
        Ok(self)
    }

    /// `Authorization` header value for this token.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::TokenValidation`] if the token contains bytes not
    /// allowed in a header.
    pub fn authorization(&self) -> DuoKeyResult<HeaderValue> {
        let mut value = HeaderValue::from_str(&format!(
            "{} {}",
            self.token_type,
            self.secret.expose_secret()
        ))
        .map_err(|e| DuoKeyError::TokenValidation(format!("token is not a valid header: {e}")))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    expires_in: i64,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_token(self, now: DateTime<Utc>) -> DuoKeyResult<AccessToken> {
        let expiry = if self.expires_in == 0 {
            None
        } else {
            let lifetime = TimeDelta::try_seconds(self.expires_in).ok_or_else(|| {
                DuoKeyError::TokenValidation(format!("invalid expires_in: {}", self.expires_in))
            })?;
            Some(now.checked_add_signed(lifetime).ok_or_else(|| {
                DuoKeyError::TokenValidation(format!("invalid expires_in: {}", self.expires_in))
            })?)
        };

        let token = AccessToken::new(self.access_token, self.token_type, expiry);
        Ok(match self.refresh_token {
            Some(refresh) if !refresh.is_empty() => token.with_refresh_token(refresh),
            _ => token,
        })
    }
}

/// Client side of an OAuth2 token endpoint.
#[derive(Debug)]
pub struct TokenEndpoint<T> {
    transport: T,
    url: Url,
    client_id: String,
    client_secret: SecretString,
    username: String,
    password: SecretString,
    scope: String,
}

impl<T: HttpTransport> TokenEndpoint<T> {
    /// Create an endpoint client for password grants issued on behalf of `username`.
    pub const fn new(
        transport: T,
        url: Url,
        client_id: String,
        client_secret: SecretString,
        username: String,
        password: SecretString,
        scope: String,
    ) -> Self {
        Self {
            transport,
            url,
            client_id,
            client_secret,
            username,
            password,
            scope,
        }
    }

    /// Token endpoint URL.
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Exchange username and password for a token.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::Grant`] if the server rejects the grant or cannot
    /// be reached, and [`DuoKeyError::TokenValidation`] if the response is not a
    /// usable token.
    #[instrument(skip(self), fields(url = %self.url, username = %self.username))]
    pub async fn password_grant(&self) -> DuoKeyResult<AccessToken> {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "password")
            .append_pair("username", &self.username)
            .append_pair("password", self.password.expose_secret())
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", self.client_secret.expose_secret())
            .append_pair("scope", &self.scope)
            .finish();
        self.request_token(form).await
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The previous refresh token is kept if the server does not rotate it.
    ///
    /// # Errors
    ///
    /// Same as [`Self::password_grant`].
    #[instrument(skip_all, fields(url = %self.url))]
    pub async fn refresh_grant(&self, refresh_token: &SecretString) -> DuoKeyResult<AccessToken> {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", refresh_token.expose_secret())
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", self.client_secret.expose_secret())
            .finish();
        let token = self.request_token(form).await?;
        Ok(if token.has_refresh_token() {
            token
        } else {
            token.with_refresh_token(refresh_token.clone())
        })
    }

    async fn request_token(&self, form: String) -> DuoKeyResult<AccessToken> {
        let mut request = reqwest::Request::new(Method::POST, self.url.clone());
        let headers = request.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        *request.body_mut() = Some(form.into());

        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|e| DuoKeyError::Grant(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| DuoKeyError::Grant(format!("failed to read token response: {e}")))?;

        if !status.is_success() {
            let reason = match serde_json::from_slice::<TokenErrorResponse>(&body) {
                Ok(TokenErrorResponse {
                    error,
                    error_description: Some(description),
                }) => format!("{error}: {description}"),
                Ok(TokenErrorResponse { error, .. }) => error,
                Err(_) => String::from_utf8_lossy(&body).into_owned(),
            };
            return Err(DuoKeyError::Grant(format!("status {status}: {reason}")));
        }

        let parsed: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| DuoKeyError::Grant(format!("malformed token response: {e}")))?;
        debug!(token_type = %parsed.token_type, expires_in = parsed.expires_in, "Token issued");
        parsed.into_token(Utc::now())
    }
}

/// Caches the current access token and refreshes it when it expires.
///
/// At most one refresh runs at a time; callers holding a valid token never
/// wait for it.
#[derive(Debug)]
pub struct TokenSource<T> {
    endpoint: TokenEndpoint<T>,
    current: RwLock<AccessToken>,
    refresh_lock: Mutex<()>,
}

impl<T: HttpTransport> TokenSource<T> {
    /// Create a source seeded with an already issued token.
    pub fn new(endpoint: TokenEndpoint<T>, token: AccessToken) -> Self {
        Self {
            endpoint,
            current: RwLock::new(token),
            refresh_lock: Mutex::new(()),
        }
    }

    /// A valid token, refreshing first if the cached one expired.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Authentication`] if the refresh fails.
    pub async fn token(&self) -> Result<AccessToken, TransportError> {
        {
            let current = self.current.read().await;
            if current.is_valid() {
                return Ok(current.clone());
            }
        }

        let _guard = self.refresh_lock.lock().await;

        let stale = {
            let current = self.current.read().await;
            if current.is_valid() {
                return Ok(current.clone());
            }
            current.clone()
        };

        let fresh = self
            .refresh(&stale)
            .await
            .map_err(|e| TransportError::Authentication(e.to_string()))?;
        *self.current.write().await = fresh.clone();
        info!(expiry = ?fresh.expiry(), "Refreshed access token");
        Ok(fresh)
    }

    async fn refresh(&self, stale: &AccessToken) -> DuoKeyResult<AccessToken> {
        if let Some(refresh_token) = &stale.refresh_token {
            match self.endpoint.refresh_grant(refresh_token).await {
                Ok(token) => return token.validate(),
                Err(e) => warn!(error = %e, "Refresh grant failed, falling back to password grant"),
            }
        }
        self.endpoint.password_grant().await?.validate()
    }
}

/// Transport decorator attaching `Authorization: Bearer <token>` to every request.
#[derive(Debug, Clone)]
pub struct AuthorizedTransport<T> {
    inner: T,
    source: Arc<TokenSource<T>>,
}

impl<T: HttpTransport> AuthorizedTransport<T> {
    /// Send requests through `inner` with tokens from `source`.
    pub const fn new(inner: T, source: Arc<TokenSource<T>>) -> Self {
        Self { inner, source }
    }

    /// The token source.
    pub const fn token_source(&self) -> &Arc<TokenSource<T>> {
        &self.source
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for AuthorizedTransport<T> {
    async fn execute(
        &self,
        mut request: reqwest::Request,
    ) -> Result<reqwest::Response, TransportError> {
        let token = self.source.token().await?;
        let authorization = token
            .authorization()
            .map_err(|e| TransportError::Authentication(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, authorization);
        self.inner.execute(request).await
    }
}
