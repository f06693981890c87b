//! Token Lifecycle Tests
//!
//! Tests for bearer-token renewal including:
//! - Login on first use
//! - Reuse of a valid token
//! - Renewal after the lease runs out
//! - Single-flight renewal under concurrent callers
//! - Failed logins leaving the cached token untouched

use ctrlx_sdk::{ClientConfig, CtrlxClient};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGIN_PATH: &str = "/identity-manager/api/v2/auth/token";

async fn mount_node(server: &MockServer, times: u64) {
    Mock::given(method("GET"))
        .and(path("/automation/api/v2/nodes/plc%2Fapp%2Fcounter"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"type": "int32", "value": 7})))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_first_operation_logs_in_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "first"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/automation/api/v2/nodes/plc%2Fapp%2Fcounter"))
        .and(header("Authorization", "Bearer first"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": 7})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = CtrlxClient::new(ClientConfig::new(mock_server.uri())).unwrap();
    assert!(!client.is_token_valid());

    client.read_node("plc/app/counter", None).await.unwrap();
    assert!(client.is_token_valid());

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method.as_str(), "POST");
    assert_eq!(requests[1].method.as_str(), "GET");
}

#[tokio::test]
async fn test_valid_token_is_reused() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "reused"})))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_node(&mock_server, 3).await;

    let client = CtrlxClient::new(ClientConfig::new(mock_server.uri())).unwrap();

    client.ensure_valid_token().await.unwrap();
    for _ in 0..3 {
        client.read_node("plc/app/counter", None).await.unwrap();
    }
}

#[tokio::test]
async fn test_expired_token_is_renewed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "short"})))
        .expect(2)
        .mount(&mock_server)
        .await;
    mount_node(&mock_server, 2).await;

    let config = ClientConfig::new(mock_server.uri()).with_token_lifetime(Duration::from_millis(400));
    let client = CtrlxClient::new(config).unwrap();

    client.read_node("plc/app/counter", None).await.unwrap();
    let first_expiry = client.token_expires_at().unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!client.is_token_valid());

    client.read_node("plc/app/counter", None).await.unwrap();
    assert!(client.is_token_valid());
    assert!(client.token_expires_at().unwrap() > first_expiry);
}

#[tokio::test]
async fn test_invalidate_token_forces_login() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "again"})))
        .expect(2)
        .mount(&mock_server)
        .await;
    mount_node(&mock_server, 2).await;

    let client = CtrlxClient::new(ClientConfig::new(mock_server.uri())).unwrap();

    client.read_node("plc/app/counter", None).await.unwrap();
    client.invalidate_token();
    assert!(!client.is_token_valid());
    client.read_node("plc/app/counter", None).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_callers_share_one_login() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "shared"}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_node(&mock_server, 8).await;

    let client = CtrlxClient::new(ClientConfig::new(mock_server.uri())).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.read_node("plc/app/counter", None).await })
        })
        .collect();

    for handle in handles {
        let node = handle.await.unwrap().unwrap();
        assert_eq!(node["value"], 7);
    }
}

#[tokio::test]
async fn test_failed_renewal_keeps_stale_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "stale"})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ClientConfig::new(mock_server.uri()).with_token_lifetime(Duration::from_millis(400));
    let client = CtrlxClient::new(config).unwrap();

    client.login(None, None).await.unwrap();
    let expiry = client.token_expires_at();

    tokio::time::sleep(Duration::from_millis(500)).await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("identity manager restarting"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let error = client.read_node("plc/app/counter", None).await.unwrap_err();

    assert!(error.is_auth_failure());
    assert_eq!(error.status(), Some(503));
    assert!(!client.is_token_valid());
    assert_eq!(client.token_expires_at(), expiry);
}

#[tokio::test]
async fn test_login_without_token_fails_guarded_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "Bearer"})))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_node(&mock_server, 0).await;

    let client = CtrlxClient::new(ClientConfig::new(mock_server.uri())).unwrap();
    let error = client.read_node("plc/app/counter", None).await.unwrap_err();

    assert!(error.is_auth_failure());
    assert!(error.to_string().contains("access_token"));
}
