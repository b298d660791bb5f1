//! Tenant credentials and the credential resolver.
//!
//! The resolver runs OIDC discovery against the issuer, performs the password
//! grant, and hands back an [`AuthorizedTransport`] that keeps the token fresh.

use crate::error::{DuoKeyError, DuoKeyResult};
use crate::token::{AuthorizedTransport, TokenEndpoint, TokenSource};
use crate::transport::{DEFAULT_TENANT_HEADER, HttpTransport, TenantScope};
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Method, Url};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Path of the discovery document relative to the issuer.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Credentials of a DuoKey tenant user.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Application id, forwarded by callers in operation contexts
    pub app_id: String,
    /// OIDC issuer URL
    pub issuer: String,
    /// OAuth2 client id
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: SecretString,
    /// Resource owner username
    pub username: String,
    /// Resource owner password
    pub password: SecretString,
    /// Requested scope
    pub scope: String,
    /// Name of the header carrying the tenant id
    pub tenant_header: String,
    /// Tenant id
    pub tenant_id: u32,
}

impl Credentials {
    /// Create credentials for tenant 0 under the default tenant header.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<SecretString>,
        username: impl Into<String>,
        password: impl Into<SecretString>,
    ) -> Self {
        Self {
            app_id: String::new(),
            issuer: issuer.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            username: username.into(),
            password: password.into(),
            scope: String::new(),
            tenant_header: DEFAULT_TENANT_HEADER.to_string(),
            tenant_id: 0,
        }
    }

    /// Set the requested scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set the tenant id.
    #[must_use]
    pub const fn with_tenant_id(mut self, tenant_id: u32) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    /// Override the tenant header name.
    #[must_use]
    pub fn with_tenant_header(mut self, header: impl Into<String>) -> Self {
        self.tenant_header = header.into();
        self
    }

    /// Set the application id.
    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Tenant header and value derived from these credentials.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidConfig`] if the header name is invalid.
    pub fn tenant_scope(&self) -> DuoKeyResult<TenantScope> {
        TenantScope::new(&self.tenant_header, self.tenant_id)
    }

    /// URL of the issuer's discovery document.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::Discovery`] if the issuer is not a valid URL.
    pub fn discovery_url(&self) -> DuoKeyResult<Url> {
        let raw = format!("{}{DISCOVERY_PATH}", self.issuer.trim_end_matches('/'));
        Url::parse(&raw)
            .map_err(|e| DuoKeyError::discovery(&self.issuer, format!("invalid issuer URL: {e}")))
    }
}

/// Subset of the OIDC provider metadata the client needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier
    pub issuer: String,
    /// Authorization endpoint
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    /// Token endpoint
    pub token_endpoint: String,
    /// JWKS endpoint
    #[serde(default)]
    pub jwks_uri: Option<String>,
    /// Supported grant types, when advertised
    #[serde(default)]
    pub grant_types_supported: Vec<String>,
}

/// Turns [`Credentials`] into an authenticated transport.
#[derive(Debug, Clone)]
pub struct CredentialResolver<T> {
    transport: T,
}

impl<T: HttpTransport + Clone> CredentialResolver<T> {
    /// Create a resolver sending discovery and grant requests through `transport`.
    ///
    /// `transport` should already be tenant scoped.
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Fetch and check the issuer's discovery document.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::Discovery`] if the document cannot be fetched,
    /// parsed, or names a different issuer.
    #[instrument(skip(self, credentials), fields(issuer = %credentials.issuer))]
    pub async fn discover(&self, credentials: &Credentials) -> DuoKeyResult<ProviderMetadata> {
        let issuer = credentials.issuer.as_str();
        let mut request = reqwest::Request::new(Method::GET, credentials.discovery_url()?);
        request
            .headers_mut()
            .insert(ACCEPT, HeaderValue::from_static("application/json"));

        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|e| DuoKeyError::discovery(issuer, e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| DuoKeyError::discovery(issuer, e.to_string()))?;

        if !status.is_success() {
            return Err(DuoKeyError::discovery(
                issuer,
                format!("status {status}: {}", String::from_utf8_lossy(&body)),
            ));
        }

        let metadata: ProviderMetadata = serde_json::from_slice(&body).map_err(|e| {
            DuoKeyError::discovery(issuer, format!("malformed discovery document: {e}"))
        })?;

        if metadata.issuer.trim_end_matches('/') != issuer.trim_end_matches('/') {
            return Err(DuoKeyError::discovery(
                issuer,
                format!(
                    "issuer did not match the issuer returned by provider, got {:?}",
                    metadata.issuer
                ),
            ));
        }

        debug!(token_endpoint = %metadata.token_endpoint, "Discovered provider");
        Ok(metadata)
    }

    /// Discover the token endpoint, run the password grant, and wrap the
    /// transport so every request carries the resulting token.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::Discovery`], [`DuoKeyError::Grant`] or
    /// [`DuoKeyError::TokenValidation`]; no transport is returned on failure.
    #[instrument(skip_all, fields(issuer = %credentials.issuer, tenant_id = credentials.tenant_id))]
    pub async fn resolve(self, credentials: &Credentials) -> DuoKeyResult<AuthorizedTransport<T>> {
        let metadata = self.discover(credentials).await?;
        let token_url = Url::parse(&metadata.token_endpoint).map_err(|e| {
            DuoKeyError::discovery(
                &credentials.issuer,
                format!("invalid token endpoint {:?}: {e}", metadata.token_endpoint),
            )
        })?;

        let endpoint = TokenEndpoint::new(
            self.transport.clone(),
            token_url,
            credentials.client_id.clone(),
            credentials.client_secret.clone(),
            credentials.username.clone(),
            credentials.password.clone(),
            credentials.scope.clone(),
        );

        let token = endpoint.password_grant().await?.validate()?;
        info!(expiry = ?token.expiry(), "Authenticated with DuoKey");

        let source = Arc::new(TokenSource::new(endpoint, token));
        Ok(AuthorizedTransport::new(self.transport, source))
    }
}
