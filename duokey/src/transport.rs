//! Composable HTTP transports.
//!
//! [`HttpTransport`] is the seam every outbound request goes through. Decorators
//! wrap another transport, adjust the request, and forward it.

use crate::error::{DuoKeyError, DuoKeyResult, TransportError};
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Header carrying the tenant id unless the credentials name another one.
pub const DEFAULT_TENANT_HEADER: &str = "Abp.TenantId";

/// Something that can execute a fully built HTTP request.
///
/// Implementations must be safe to share across concurrent calls.
#[async_trait]
pub trait HttpTransport: Send + Sync + fmt::Debug {
    /// Execute the request and return the raw response.
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, TransportError>;
}

#[async_trait]
impl HttpTransport for reqwest::Client {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, TransportError> {
        Self::execute(self, request).await.map_err(TransportError::Http)
    }
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, TransportError> {
        (**self).execute(request).await
    }
}

/// Header name and value identifying a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantScope {
    name: HeaderName,
    value: HeaderValue,
}

impl TenantScope {
    /// Create a scope for `tenant_id` under the given header name.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidConfig`] if `header` is not a valid header name.
    pub fn new(header: &str, tenant_id: u32) -> DuoKeyResult<Self> {
        let name = HeaderName::from_bytes(header.as_bytes()).map_err(|e| {
            DuoKeyError::invalid_config(format!("invalid tenant header name {header:?}: {e}"))
        })?;
        Ok(Self {
            name,
            value: HeaderValue::from(tenant_id),
        })
    }

    /// Scope under [`DEFAULT_TENANT_HEADER`].
    #[must_use]
    pub fn with_default_header(tenant_id: u32) -> Self {
        Self {
            name: HeaderName::from_static("abp.tenantid"),
            value: HeaderValue::from(tenant_id),
        }
    }

    /// Header name.
    #[must_use]
    pub const fn header_name(&self) -> &HeaderName {
        &self.name
    }

    /// Header value (the decimal tenant id).
    #[must_use]
    pub const fn header_value(&self) -> &HeaderValue {
        &self.value
    }

    /// Set the tenant header on `request`, replacing any previous value.
    pub fn apply(&self, request: &mut reqwest::Request) {
        request
            .headers_mut()
            .insert(self.name.clone(), self.value.clone());
    }
}

/// Transport decorator stamping every request with the tenant header.
#[derive(Debug, Clone)]
pub struct TenantTransport<T> {
    inner: T,
    scope: TenantScope,
}

impl<T: HttpTransport> TenantTransport<T> {
    /// Wrap `inner` so every request carries `scope`.
    pub const fn new(inner: T, scope: TenantScope) -> Self {
        Self { inner, scope }
    }

    /// The tenant scope applied by this transport.
    pub const fn scope(&self) -> &TenantScope {
        &self.scope
    }

    /// The wrapped transport.
    pub const fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for TenantTransport<T> {
    async fn execute(
        &self,
        mut request: reqwest::Request,
    ) -> Result<reqwest::Response, TransportError> {
        self.scope.apply(&mut request);
        trace!(
            header = %self.scope.name,
            url = %request.url(),
            "Applied tenant header"
        );
        self.inner.execute(request).await
    }
}
