use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use sproutly_rust_auth::{
    AuthClient, AuthError, AuthEvent, MemoryStore, TokenStore, ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn auth_with_store(uri: &str) -> (AuthClient, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let auth = AuthClient::new(uri, Client::new(), store.clone());
    (auth, store)
}

#[tokio::test]
async fn login_stores_both_tokens_and_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_partial_json(json!({ "phone": "9999999999" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "accessToken": "a",
            "refreshToken": "b",
            "user": {
                "id": 1,
                "name": "Asha",
                "phone": "9999999999",
                "role": "parent",
                "children": [{ "id": 5, "name": "Kiran", "className": "Nursery A" }]
            }
        })))
        .mount(&mock_server)
        .await;

    let (auth, store) = auth_with_store(&mock_server.uri());
    let result = auth.login("9999999999", "goodpass").await.unwrap();

    assert_eq!(result.user.name, "Asha");
    assert_eq!(result.session.access_token, "a");
    assert_eq!(
        store.retrieve(ACCESS_TOKEN_KEY).await.unwrap(),
        Some("a".to_string())
    );
    assert_eq!(
        store.retrieve(REFRESH_TOKEN_KEY).await.unwrap(),
        Some("b".to_string())
    );

    let restored = auth.restore_session().await.unwrap();
    assert_eq!(restored.user.children[0].id, 5);
}

#[tokio::test]
async fn login_accepts_legacy_token_field() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "token": "legacy-access",
            "user": { "id": 2, "name": "Ravi", "phone": "8888888888", "role": "teacher" }
        })))
        .mount(&mock_server)
        .await;

    let (auth, store) = auth_with_store(&mock_server.uri());
    let result = auth.login("8888888888", "pw").await.unwrap();

    assert_eq!(result.session.access_token, "legacy-access");
    assert_eq!(
        store.retrieve(ACCESS_TOKEN_KEY).await.unwrap(),
        Some("legacy-access".to_string())
    );
    assert_eq!(store.retrieve(REFRESH_TOKEN_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn rejected_login_surfaces_server_message_and_stores_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "error": "Invalid credentials"
        })))
        .mount(&mock_server)
        .await;

    let (auth, store) = auth_with_store(&mock_server.uri());
    let err = auth.login("9999999999", "badpass").await.unwrap_err();

    match err {
        AuthError::Rejected(message) => assert_eq!(message, "Invalid credentials"),
        other => panic!("expected Rejected, got {other:?}"),
    }
    assert_eq!(store.retrieve(ACCESS_TOKEN_KEY).await.unwrap(), None);
    assert_eq!(store.retrieve(REFRESH_TOKEN_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn non_json_login_body_yields_descriptive_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(502)
                .set_body_string("<html><body>Bad Gateway</body></html>"),
        )
        .mount(&mock_server)
        .await;

    let (auth, _) = auth_with_store(&mock_server.uri());
    let err = auth.login("9999999999", "pw").await.unwrap_err();

    match err {
        AuthError::InvalidResponse { status, snippet } => {
            assert_eq!(status, 502);
            assert!(snippet.contains("Bad Gateway"));
        }
        other => panic!("expected InvalidResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn change_password_posts_and_reports_rejection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/change-password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/change-password-staff"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "error": { "message": "Old password does not match" }
        })))
        .mount(&mock_server)
        .await;

    let (auth, _) = auth_with_store(&mock_server.uri());

    auth.change_password("9999999999", "newpass").await.unwrap();

    let err = auth
        .change_password_staff("8888888888", "old", "new")
        .await
        .unwrap_err();
    match err {
        AuthError::Rejected(message) => assert_eq!(message, "Old password does not match"),
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_unauthorized_handling_is_single_flight() {
    let store = Arc::new(MemoryStore::new());
    store.store(ACCESS_TOKEN_KEY, "stale").await.unwrap();
    store.store(REFRESH_TOKEN_KEY, "stale").await.unwrap();

    let auth = Arc::new(AuthClient::new_with_debounce(
        "http://localhost",
        Client::new(),
        store.clone(),
        Duration::from_secs(3),
    ));
    let mut events = auth.subscribe();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let auth = auth.clone();
        handles.push(tokio::spawn(async move { auth.handle_unauthorized().await }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    events.changed().await.unwrap();
    assert_eq!(*events.borrow(), AuthEvent::SessionExpired);
    assert_eq!(store.retrieve(ACCESS_TOKEN_KEY).await.unwrap(), None);
    assert_eq!(store.retrieve(REFRESH_TOKEN_KEY).await.unwrap(), None);
}
