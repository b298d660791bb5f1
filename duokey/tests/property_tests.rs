//! Property-based tests for the request builder and executor.
//!
//! Tests validate:
//! - Supported methods with well-formed URLs always build cleanly
//! - Unsupported methods fail on send without touching the transport
//! - The tenant header always carries the decimal tenant id

use duokey::{BuildError, CallContext, DuoKeyError, Operation, Request, TenantScope};
use duokey_test_utils::generators::{
    base_url_strategy, route_strategy, supported_method_strategy, tenant_header_strategy,
    tenant_id_strategy, unsupported_method_strategy,
};
use duokey_test_utils::mocks::CountingTransport;
use proptest::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_supported_methods_build(
        method in supported_method_strategy(),
        base_url in base_url_strategy(),
        route in route_strategy(),
        tenant_id in tenant_id_strategy(),
    ) {
        let op = Operation::new("Op", method.clone(), base_url.clone(), route.clone());
        let request = Request::new(
            Arc::new(CountingTransport::ok_json(&json!({}))),
            &TenantScope::with_default_header(tenant_id),
            &op,
            Some(json!({"n": tenant_id})),
        );

        prop_assert!(request.build_error().is_none());
        let http = request.http_request().unwrap();
        prop_assert_eq!(http.method(), &method);
        prop_assert!(http.url().as_str().starts_with(&base_url));
        prop_assert!(http.url().path().ends_with(&route));
    }

    #[test]
    fn prop_unsupported_methods_never_sent(method in unsupported_method_strategy()) {
        let transport = Arc::new(CountingTransport::ok_json(&json!({})));
        let op = Operation::new("Op", method, "https://kms.example.com", "/api/op");
        let request = Request::new(
            transport.clone(),
            &TenantScope::with_default_header(1),
            &op,
            Some(json!({})),
        );

        let result = runtime().block_on(request.send::<Value>(&CallContext::background()));

        prop_assert!(matches!(
            result,
            Err(DuoKeyError::BadRequest(BuildError::UnsupportedMethod(_)))
        ));
        prop_assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn prop_tenant_header_on_every_request(
        header in tenant_header_strategy(),
        tenant_id in tenant_id_strategy(),
    ) {
        let transport = Arc::new(CountingTransport::ok_json(&json!({})));
        let scope = TenantScope::new(&header, tenant_id).unwrap();
        let op = Operation::post("Encrypt", "https://kms.example.com", "/api/encrypt");
        let request = Request::new(transport.clone(), &scope, &op, Some(json!({})));

        runtime()
            .block_on(request.send_discarding(&CallContext::background()))
            .unwrap();

        let seen = transport.requests();
        prop_assert_eq!(seen.len(), 1);
        let value = seen[0].headers.get(header.as_str()).unwrap().to_str().unwrap();
        prop_assert_eq!(value, tenant_id.to_string());
    }
}
