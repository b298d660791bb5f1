//! Integration tests for credential resolution against a stub identity provider.

use duokey::{CallContext, Client, DuoKeyError, ErrorKind, Operation};
use duokey_test_utils::fixtures::{PASSWORD, USERNAME, sample_credentials};
use duokey_test_utils::mocks::{MockIdentityProvider, TokenGrant, mount_discovery};
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn form_body(request: &wiremock::Request) -> String {
    String::from_utf8_lossy(&request.body).into_owned()
}

#[tokio::test]
async fn test_connect_runs_password_grant_with_tenant_header() {
    let idp = MockIdentityProvider::start().await;

    Client::connect(&idp.credentials()).await.unwrap();

    let grants = idp.grant_requests().await;
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].headers.get("abp.tenantid").unwrap(), "1");

    let body = form_body(&grants[0]);
    assert!(body.contains("grant_type=password"));
    assert!(body.contains(&format!("username={USERNAME}")));
    assert!(body.contains("scope=key"));
    assert!(!body.contains(PASSWORD), "password must be form encoded");
}

#[tokio::test]
async fn test_discovery_also_carries_tenant_header() {
    let idp = MockIdentityProvider::start().await;

    Client::connect(&idp.credentials()).await.unwrap();

    let requests = idp.server().received_requests().await.unwrap();
    let discovery = requests
        .iter()
        .find(|r| r.url.path() == duokey::credentials::DISCOVERY_PATH)
        .unwrap();
    assert_eq!(discovery.headers.get("abp.tenantid").unwrap(), "1");
}

#[tokio::test]
async fn test_operation_calls_carry_bearer_and_tenant() {
    let idp = MockIdentityProvider::start().await;
    let token = idp.grant().access_token.clone();

    Mock::given(method("POST"))
        .and(path("/api/echo"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .and(header("Abp.TenantId", "1"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(idp.server())
        .await;

    let client = Client::connect(&idp.credentials()).await.unwrap();
    let op = Operation::post("Echo", idp.issuer(), "/api/echo");
    let reply: Value = client
        .new_request(&op, Some(json!({"ping": 1})))
        .send(&CallContext::background())
        .await
        .unwrap();

    assert_eq!(reply, json!({"ok": true}));
}

#[tokio::test]
async fn test_missing_discovery_document() {
    let server = MockServer::start().await;

    let err = Client::connect(&sample_credentials(server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, DuoKeyError::Discovery { .. }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

#[tokio::test]
async fn test_issuer_mismatch_rejected() {
    let server = MockServer::start().await;
    mount_discovery(&server, "https://impostor.example.com").await;

    let err = Client::connect(&sample_credentials(server.uri()))
        .await
        .unwrap_err();

    match err {
        DuoKeyError::Discovery { reason, .. } => assert!(reason.contains("impostor")),
        other => panic!("expected discovery error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_grant() {
    let idp = MockIdentityProvider::start_with(TokenGrant::default().rejected(401)).await;

    let err = Client::connect(&idp.credentials()).await.unwrap_err();

    match err {
        DuoKeyError::Grant(reason) => assert!(reason.contains("invalid_grant")),
        other => panic!("expected grant error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_bearer_token_rejected() {
    let idp = MockIdentityProvider::start_with(TokenGrant::default().with_token_type("mac")).await;

    let err = Client::connect(&idp.credentials()).await.unwrap_err();

    assert!(matches!(err, DuoKeyError::TokenValidation(_)), "got {err:?}");
}

#[tokio::test]
async fn test_lowercase_bearer_accepted() {
    let idp =
        MockIdentityProvider::start_with(TokenGrant::default().with_token_type("bearer")).await;

    assert!(Client::connect(&idp.credentials()).await.is_ok());
}

#[tokio::test]
async fn test_token_inside_expiry_delta_rejected() {
    let idp = MockIdentityProvider::start_with(TokenGrant::default().with_expires_in(5)).await;

    let err = Client::connect(&idp.credentials()).await.unwrap_err();

    assert!(matches!(err, DuoKeyError::TokenValidation(_)), "got {err:?}");
}

#[tokio::test]
async fn test_expired_token_refreshed_with_refresh_grant() {
    let idp = MockIdentityProvider::start_with(
        TokenGrant::default()
            .with_expires_in(11)
            .with_refresh_token("refresh-1"),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(idp.server())
        .await;

    let client = Client::connect(&idp.credentials()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let op = Operation::get("ListKeys", idp.issuer(), "/api/keys");
    client
        .new_request(&op, None::<Value>)
        .send_discarding(&CallContext::background())
        .await
        .unwrap();

    let grants = idp.grant_requests().await;
    assert_eq!(grants.len(), 2);
    let refresh = form_body(&grants[1]);
    assert!(refresh.contains("grant_type=refresh_token"));
    assert!(refresh.contains("refresh_token=refresh-1"));
}
