//! Request builder and executor.
//!
//! Building never fails: errors found while assembling the HTTP request are
//! stored on the [`Request`] and returned by `send` before any network call.
//! Sending consumes the request, so each one goes out at most once.

use crate::context::CallContext;
use crate::error::{BuildError, DuoKeyError, DuoKeyResult, TransportError};
use crate::operation::{Operation, QueryEncoding, is_supported_method};
use crate::transport::{HttpTransport, TenantScope};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Failure a service reports inside an otherwise successful response.
///
/// The executor checks every decoded result; types without such a flag keep
/// the default implementation.
pub trait Outcome {
    /// Reason the server gave for failing, if it failed.
    fn failure(&self) -> Option<String> {
        None
    }
}

impl Outcome for Value {}

/// A single-use request for one operation.
#[derive(Debug)]
pub struct Request<P> {
    transport: Arc<dyn HttpTransport>,
    operation: &'static str,
    http: Result<reqwest::Request, BuildError>,
    params: Option<P>,
    query_encoded: bool,
}

struct Assembled {
    request: reqwest::Request,
    query_encoded: bool,
}

impl<P: Serialize> Request<P> {
    /// Assemble a request for `operation` carrying `params`.
    ///
    /// Query strings of GET operations are computed here; the JSON body is
    /// serialized when the request is sent.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tenant: &TenantScope,
        operation: &Operation,
        params: Option<P>,
    ) -> Self {
        let assembled = assemble(tenant, operation, params.as_ref());
        if let Err(e) = &assembled {
            debug!(operation = operation.name, error = %e, "Request build failed");
        }
        let query_encoded = assembled.as_ref().is_ok_and(|a| a.query_encoded);

        Self {
            transport,
            operation: operation.name,
            http: assembled.map(|a| a.request),
            params,
            query_encoded,
        }
    }

    /// Name of the operation this request performs.
    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    /// Error recorded while building, if any.
    pub fn build_error(&self) -> Option<&BuildError> {
        self.http.as_ref().err()
    }

    /// The assembled HTTP request, without its body.
    pub fn http_request(&self) -> Option<&reqwest::Request> {
        self.http.as_ref().ok()
    }

    /// Input parameters.
    pub const fn parameters(&self) -> Option<&P> {
        self.params.as_ref()
    }

    /// Mutable input parameters.
    ///
    /// Changes reach the JSON body at send time. Query-encoded GET requests
    /// fix their query string at build time, so edits made here are not sent
    /// for them; build a new request instead.
    pub const fn parameters_mut(&mut self) -> Option<&mut P> {
        self.params.as_mut()
    }

    /// Send the request and decode the response into `R`.
    ///
    /// # Errors
    ///
    /// - [`DuoKeyError::BadRequest`] if building failed; nothing is sent.
    /// - [`DuoKeyError::Serialization`] if the parameters cannot be encoded.
    /// - [`DuoKeyError::Transport`] on network failure, cancellation or deadline.
    /// - [`DuoKeyError::Remote`] on status >= 300 or when `R` reports a failure.
    /// - [`DuoKeyError::Decode`] if the body does not match `R`.
    #[instrument(skip_all, fields(operation = self.operation))]
    pub async fn send<R>(self, ctx: &CallContext) -> DuoKeyResult<R>
    where
        R: DeserializeOwned + Outcome,
    {
        let operation = self.operation;
        let (status, body) = self.execute(ctx).await?;

        let result: R = serde_json::from_slice(&body).map_err(DuoKeyError::Decode)?;
        if let Some(reason) = result.failure() {
            warn!(operation, %status, reason = %reason, "Server reported failure");
            return Err(DuoKeyError::Remote {
                status: status.as_u16(),
                body: reason,
            });
        }
        Ok(result)
    }

    /// Send the request and ignore the response body.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send`], except that no decoding happens.
    #[instrument(skip_all, fields(operation = self.operation))]
    pub async fn send_discarding(self, ctx: &CallContext) -> DuoKeyResult<()> {
        self.execute(ctx).await.map(|_| ())
    }

    async fn execute(self, ctx: &CallContext) -> DuoKeyResult<(StatusCode, Vec<u8>)> {
        let mut request = self.http?;

        if !self.query_encoded {
            if let Some(params) = &self.params {
                let body = serde_json::to_vec(params).map_err(DuoKeyError::Serialization)?;
                *request.body_mut() = Some(body.into());
            }
        }

        debug!(method = %request.method(), url = %request.url(), "Sending request");
        let response = ctx.run(self.transport.execute(request)).await??;

        let status = response.status();
        let body = ctx
            .run(response.bytes())
            .await?
            .map_err(TransportError::Http)?
            .to_vec();
        debug!(%status, bytes = body.len(), "Received response");

        if status.as_u16() >= 300 {
            warn!(operation = self.operation, %status, "Request rejected");
            return Err(DuoKeyError::Remote {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok((status, body))
    }
}

fn assemble<P: Serialize>(
    tenant: &TenantScope,
    operation: &Operation,
    params: Option<&P>,
) -> Result<Assembled, BuildError> {
    let method = checked_method(&operation.method)?;
    let (url, query_encoded) = endpoint_url(operation, params)?;

    let mut request = reqwest::Request::new(method, url);
    request
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    tenant.apply(&mut request);

    Ok(Assembled {
        request,
        query_encoded,
    })
}

fn checked_method(method: &Method) -> Result<Method, BuildError> {
    if is_supported_method(method) {
        Ok(method.clone())
    } else {
        Err(BuildError::UnsupportedMethod(method.clone()))
    }
}

fn endpoint_url<P: Serialize>(
    operation: &Operation,
    params: Option<&P>,
) -> Result<(Url, bool), BuildError> {
    let raw = operation.raw_url();
    let mut url = Url::parse(&raw).map_err(|source| BuildError::InvalidEndpointUrl {
        url: raw.clone(),
        source,
    })?;

    match params {
        Some(params)
            if operation.method == Method::GET && operation.query == QueryEncoding::UrlEncoded =>
        {
            append_query(&mut url, params)?;
            Ok((url, true))
        }
        _ => Ok((url, false)),
    }
}

fn append_query<P: Serialize>(url: &mut Url, params: &P) -> Result<(), BuildError> {
    let Value::Object(fields) = serde_json::to_value(params).map_err(BuildError::QueryEncoding)?
    else {
        return Err(BuildError::QueryEncoding(serde::ser::Error::custom(
            "query parameters must serialize to an object",
        )));
    };

    let pairs: Vec<(String, String)> = fields
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect();

    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct NoopTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpTransport for NoopTransport {
        async fn execute(
            &self,
            _request: reqwest::Request,
        ) -> Result<reqwest::Response, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = http::Response::builder().status(200).body("{}").unwrap();
            Ok(reqwest::Response::from(response))
        }
    }

    #[derive(Debug, Clone, Serialize)]
    struct Lookup {
        #[serde(rename = "externalId")]
        external_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        version: Option<u32>,
        tags: Vec<&'static str>,
    }

    fn tenant() -> TenantScope {
        TenantScope::with_default_header(1)
    }

    fn build<P: Serialize>(op: &Operation, params: Option<P>) -> Request<P> {
        Request::new(Arc::new(NoopTransport::default()), &tenant(), op, params)
    }

    #[test]
    fn test_supported_methods_build_cleanly() {
        for method in [Method::GET, Method::POST, Method::PUT, Method::DELETE] {
            let op = Operation::new("Op", method.clone(), "https://kms.example.com", "/op");
            let req = build::<Value>(&op, None);
            assert!(req.build_error().is_none(), "{method} should build");
            assert_eq!(*req.http_request().unwrap().method(), method);
        }
    }

    #[test]
    fn test_unsupported_method_recorded() {
        let op = Operation::new("Op", Method::PATCH, "https://kms.example.com", "/op");
        let req = build::<Value>(&op, None);
        assert!(matches!(
            req.build_error(),
            Some(BuildError::UnsupportedMethod(m)) if *m == Method::PATCH
        ));
        assert!(req.http_request().is_none());
    }

    #[test]
    fn test_invalid_url_recorded() {
        let op = Operation::post("Encrypt", "", "/api/encrypt");
        let req = build(&op, Some(serde_json::json!({"a": 1})));
        assert!(matches!(
            req.build_error(),
            Some(BuildError::InvalidEndpointUrl { url, .. }) if url == "/api/encrypt"
        ));
    }

    #[test]
    fn test_headers_applied() {
        let op = Operation::post("Encrypt", "https://kms.example.com", "/api/encrypt");
        let req = build::<Value>(&op, None);
        let headers = req.http_request().unwrap().headers();
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers["abp.tenantid"], "1");
    }

    #[test]
    fn test_get_parameters_encoded_in_query() {
        let op = Operation::get("GetKeyId", "https://kms.example.com", "/api/keys");
        let params = Lookup {
            external_id: "key one".to_string(),
            version: None,
            tags: vec!["a", "b"],
        };
        let req = build(&op, Some(params));
        let url = req.http_request().unwrap().url();

        let query: BTreeMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query["externalId"], "key one");
        assert_eq!(query["tags"], r#"["a","b"]"#);
        assert!(!query.contains_key("version"));
        assert!(req.query_encoded);
    }

    #[test]
    fn test_get_without_parameters_has_no_query() {
        let op = Operation::get("GetKeyId", "https://kms.example.com", "/api/keys");
        let req = build::<Value>(&op, None);
        assert_eq!(req.http_request().unwrap().url().query(), None);
    }

    #[test]
    fn test_non_object_query_parameters_rejected() {
        let op = Operation::get("GetKeyId", "https://kms.example.com", "/api/keys");
        let req = build(&op, Some(vec![1, 2, 3]));
        assert!(matches!(
            req.build_error(),
            Some(BuildError::QueryEncoding(_))
        ));
    }

    #[test]
    fn test_query_fixed_at_build_time() {
        let op = Operation::get("GetKeyId", "https://kms.example.com", "/api/keys");
        let mut req = build(&op, Some(serde_json::json!({"externalId": "before"})));
        req.parameters_mut().unwrap()["externalId"] = "after".into();

        assert_eq!(req.parameters().unwrap()["externalId"], "after");
        assert_eq!(
            req.http_request().unwrap().url().query(),
            Some("externalId=before")
        );
    }

    #[test]
    fn test_post_parameters_not_in_query() {
        let op = Operation::post("Encrypt", "https://kms.example.com", "/api/encrypt");
        let req = build(&op, Some(serde_json::json!({"keyid": "k"})));
        assert_eq!(req.http_request().unwrap().url().query(), None);
        assert!(!req.query_encoded);
    }

    #[tokio::test]
    async fn test_build_error_skips_network() {
        let transport = Arc::new(NoopTransport::default());
        let op = Operation::new("Op", Method::PATCH, "https://kms.example.com", "/op");
        let req = Request::new(transport.clone(), &tenant(), &op, Some(1u8));

        let err = req.send::<Value>(&CallContext::background()).await.unwrap_err();

        assert!(matches!(err, DuoKeyError::BadRequest(BuildError::UnsupportedMethod(_))));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_discarding_makes_one_call() {
        let transport = Arc::new(NoopTransport::default());
        let op = Operation::new("Delete", Method::DELETE, "https://kms.example.com", "/keys/1");
        let req = Request::new(transport.clone(), &tenant(), &op, None::<Value>);

        req.send_discarding(&CallContext::background()).await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
