//! Proptest generators for SDK inputs.

use proptest::prelude::*;
use reqwest::Method;

/// Any tenant id.
pub fn tenant_id_strategy() -> impl Strategy<Value = u32> {
    any::<u32>()
}

/// Valid tenant header names.
pub fn tenant_header_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(duokey::DEFAULT_TENANT_HEADER.to_string()),
        "X-[A-Z][a-z]{2,10}-Id",
    ]
}

/// HTTPS base URLs without a trailing slash.
pub fn base_url_strategy() -> impl Strategy<Value = String> {
    ("[a-z]{3,10}", prop::option::of(1024u16..65535)).prop_map(|(host, port)| match port {
        Some(port) => format!("https://{host}.example.com:{port}"),
        None => format!("https://{host}.example.com"),
    })
}

/// Absolute routes of one to four segments.
pub fn route_strategy() -> impl Strategy<Value = String> {
    "(/[A-Za-z][A-Za-z0-9_-]{0,12}){1,4}"
}

/// Methods the request builder accepts.
pub fn supported_method_strategy() -> impl Strategy<Value = Method> {
    prop_oneof![
        Just(Method::GET),
        Just(Method::POST),
        Just(Method::PUT),
        Just(Method::DELETE),
    ]
}

/// Methods the request builder rejects.
pub fn unsupported_method_strategy() -> impl Strategy<Value = Method> {
    prop_oneof![
        Just(Method::PATCH),
        Just(Method::HEAD),
        Just(Method::OPTIONS),
        Just(Method::TRACE),
        Just(Method::CONNECT),
    ]
}

/// Key identifiers.
pub fn key_id_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{2,30}"
}

/// Arbitrary binary payloads.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}
