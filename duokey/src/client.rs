//! Authenticated, tenant-scoped request factory.

use crate::credentials::{CredentialResolver, Credentials};
use crate::error::{DuoKeyError, DuoKeyResult};
use crate::http::{HttpConfig, build_http_client};
use crate::operation::Operation;
use crate::request::Request;
use crate::transport::{HttpTransport, TenantScope, TenantTransport};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Entry point shared by every service facade.
///
/// Cloning is cheap; clones share the transport and its cached token.
#[derive(Debug, Clone)]
pub struct Client {
    transport: Arc<dyn HttpTransport>,
    tenant: TenantScope,
}

impl Client {
    /// Authenticate with the default HTTP settings.
    ///
    /// # Errors
    ///
    /// See [`Self::connect_with`].
    pub async fn connect(credentials: &Credentials) -> DuoKeyResult<Self> {
        Self::connect_with(credentials, &HttpConfig::default()).await
    }

    /// Authenticate using a reqwest client built from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::InvalidConfig`] if the HTTP client or tenant
    /// header cannot be built, and the resolver's errors otherwise.
    pub async fn connect_with(credentials: &Credentials, config: &HttpConfig) -> DuoKeyResult<Self> {
        let http = build_http_client(config)
            .map_err(|e| DuoKeyError::invalid_config(format!("failed to build HTTP client: {e}")))?;
        Self::connect_via(credentials, http).await
    }

    /// Authenticate over a caller-supplied base transport.
    ///
    /// The tenant and authorization decorators are layered on top of `base`.
    ///
    /// # Errors
    ///
    /// Returns [`DuoKeyError::Discovery`], [`DuoKeyError::Grant`] or
    /// [`DuoKeyError::TokenValidation`] if authentication fails.
    #[instrument(skip_all, fields(issuer = %credentials.issuer))]
    pub async fn connect_via<T>(credentials: &Credentials, base: T) -> DuoKeyResult<Self>
    where
        T: HttpTransport + Clone + 'static,
    {
        let tenant = credentials.tenant_scope()?;
        let scoped = TenantTransport::new(base, tenant.clone());
        let authorized = CredentialResolver::new(scoped).resolve(credentials).await?;

        Ok(Self {
            transport: Arc::new(authorized),
            tenant,
        })
    }

    /// Wrap an already authorized transport without any network call.
    #[must_use]
    pub fn with_transport(tenant: TenantScope, transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport, tenant }
    }

    /// The tenant this client acts for.
    #[must_use]
    pub const fn tenant(&self) -> &TenantScope {
        &self.tenant
    }

    /// The transport requests are sent through.
    #[must_use]
    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        Arc::clone(&self.transport)
    }

    /// Build a request for `operation`. Build errors surface on send.
    pub fn new_request<P: Serialize>(&self, operation: &Operation, params: Option<P>) -> Request<P> {
        Request::new(self.transport(), &self.tenant, operation, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CallContext;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use reqwest::Method;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct EchoTransport {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HttpTransport for EchoTransport {
        async fn execute(
            &self,
            request: reqwest::Request,
        ) -> Result<reqwest::Response, TransportError> {
            self.urls.lock().unwrap().push(request.url().to_string());
            let body = request
                .body()
                .and_then(reqwest::Body::as_bytes)
                .map(<[u8]>::to_vec)
                .unwrap_or_else(|| b"null".to_vec());
            let response = http::Response::builder().status(200).body(body).unwrap();
            Ok(reqwest::Response::from(response))
        }
    }

    #[tokio::test]
    async fn test_requests_from_one_operation_are_independent() {
        let transport = Arc::new(EchoTransport::default());
        let client = Client::with_transport(TenantScope::with_default_header(1), transport.clone());
        let op = Operation::post("Echo", "https://kms.example.com", "/echo");

        let first = client.new_request(&op, Some(json!({"n": 1})));
        let mut second = client.new_request(&op, Some(json!({"n": 2})));
        *second.parameters_mut().unwrap() = json!({"n": 3});

        let ctx = CallContext::background();
        let a: Value = first.send(&ctx).await.unwrap();
        let b: Value = second.send(&ctx).await.unwrap();

        assert_eq!(a, json!({"n": 1}));
        assert_eq!(b, json!({"n": 3}));
        assert_eq!(transport.urls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_build_errors_stay_on_their_request() {
        let client = Client::with_transport(
            TenantScope::with_default_header(1),
            Arc::new(EchoTransport::default()),
        );
        let bad = Operation::new("Bad", Method::PATCH, "https://kms.example.com", "/x");
        let good = Operation::post("Good", "https://kms.example.com", "/x");

        assert!(client.new_request(&bad, None::<Value>).build_error().is_some());
        assert!(client.new_request(&good, None::<Value>).build_error().is_none());
    }
}
