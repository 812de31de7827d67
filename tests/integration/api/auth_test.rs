//! Authentication client integration tests
//!
//! Login, registration, logout and profile flows against a wiremock server,
//! with the session persisted into a temporary directory.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wachat::client::{AuthClient, AuthError, RegisterRequest, StoredSession, TokenStore};

use crate::common::config_with_session_dir;
use crate::{assert_err, assert_ok};

fn user_json() -> Value {
    json!({
        "_id": "u1",
        "username": "ravi",
        "email": "ravi@example.com",
        "profile": { "name": "Ravi Kumar", "avatar": "", "status": "Available" },
        "isOnline": true,
        "lastSeen": "2024-01-01T00:00:00Z",
        "wa_id": "919937320320"
    })
}

fn auth_client(server: &MockServer, dir: &TempDir) -> AuthClient {
    AuthClient::from_config(config_with_session_dir(&server.uri(), dir.path())).unwrap()
}

fn session_store(dir: &TempDir) -> TokenStore {
    TokenStore::new(dir.path().join("session.json"))
}

#[tokio::test]
async fn test_login_persists_session() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_partial_json(json!({ "email": "ravi@example.com", "password": "secret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "user": user_json(), "token": "jwt-abc" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut auth = auth_client(&server, &dir);
    let user = assert_ok!(auth.login("ravi@example.com", "secret").await);

    assert_eq!(user.username, "ravi");
    assert_eq!(auth.token(), Some("jwt-abc"));
    let saved = session_store(&dir).load().unwrap();
    assert_eq!(saved.token, "jwt-abc");
    assert_eq!(saved.user.unwrap().wa_id, "919937320320");
}

#[tokio::test]
async fn test_login_rejected_stores_nothing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "message": "Invalid credentials"
        })))
        .mount(&server)
        .await;

    let mut auth = auth_client(&server, &dir);
    assert_err!(auth.login("ravi@example.com", "wrong").await, AuthError::InvalidCredentials);
    assert!(!auth.is_authenticated());
    assert!(session_store(&dir).load().is_none());
}

#[tokio::test]
async fn test_register_sends_form() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .and(body_partial_json(json!({
            "username": "ravi",
            "email": "ravi@example.com",
            "name": "Ravi Kumar",
            "wa_id": "919937320320"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "data": { "user": user_json(), "token": "jwt-new" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut auth = auth_client(&server, &dir);
    let request = RegisterRequest {
        username: "ravi".into(),
        email: "ravi@example.com".into(),
        password: "secret".into(),
        name: "Ravi Kumar".into(),
        wa_id: "919937320320".into(),
    };
    assert_ok!(auth.register(&request).await);
    assert_eq!(auth.token(), Some("jwt-new"));
}

#[tokio::test]
async fn test_logout_clears_session_even_when_server_fails() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    session_store(&dir)
        .save(&StoredSession::new("jwt-old", None))
        .unwrap();
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(header("authorization", "Bearer jwt-old"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let mut auth = auth_client(&server, &dir);
    assert!(auth.restore().is_some());
    assert_ok!(auth.logout().await);

    assert!(!auth.is_authenticated());
    assert!(session_store(&dir).load().is_none());
}

#[tokio::test]
async fn test_profile_with_rejected_token_clears_session() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    session_store(&dir)
        .save(&StoredSession::new("jwt-expired", None))
        .unwrap();
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut auth = auth_client(&server, &dir);
    auth.restore();
    assert_err!(auth.profile().await, AuthError::NotAuthenticated);
    assert!(!auth.is_authenticated());
    assert!(session_store(&dir).load().is_none());
}

#[tokio::test]
async fn test_profile_refreshes_stored_user() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    session_store(&dir)
        .save(&StoredSession::new("jwt-abc", None))
        .unwrap();
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer jwt-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": user_json()
        })))
        .mount(&server)
        .await;

    let mut auth = auth_client(&server, &dir);
    auth.restore();
    let user = assert_ok!(auth.profile().await);
    assert_eq!(user.profile.status, "Available");
    assert_eq!(session_store(&dir).load().unwrap().user, Some(user));
}

#[tokio::test]
async fn test_profile_without_session_makes_no_request() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut auth = auth_client(&server, &dir);
    assert_err!(auth.profile().await, AuthError::NotAuthenticated);
}
