//! End-to-end tests against the full router with an in-memory database.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use parley_api::{AppState, AppStateInner};

fn app_with(session_ttl_hours: i64, allow_self_send: bool) -> Router {
    let state: AppState = Arc::new(AppStateInner {
        db: parley_db::Database::open_in_memory().unwrap(),
        cookie_secure: false,
        session_ttl_hours,
        allow_self_send,
    });
    parley_api::router(state)
}

fn app() -> Router {
    app_with(168, false)
}

/// Fire one request, returning (status, session cookie from Set-Cookie if
/// any, parsed JSON body or Null).
async fn request(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Option<String>, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    let req = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap().to_string());
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, set_cookie, json)
}

/// Register a user; returns (user id, session cookie).
async fn register(app: &Router, username: &str) -> (String, String) {
    let (status, cookie, body) = request(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "username": username,
            "displayName": username,
            "password": "correct-horse-battery",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    (
        body["id"].as_str().unwrap().to_string(),
        cookie.expect("register must set the session cookie"),
    )
}

async fn send_text(
    app: &Router,
    cookie: &str,
    recipient: &str,
    text: &str,
) -> (StatusCode, Value) {
    let (status, _, body) = request(
        app,
        Method::POST,
        &format!("/send/{recipient}"),
        Some(cookie),
        Some(json!({ "text": text })),
    )
    .await;
    (status, body)
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let app = app();
    let some_id = "00000000-0000-0000-0000-000000000001";

    for (method, uri) in [
        (Method::GET, "/users".to_string()),
        (Method::GET, format!("/{some_id}")),
        (Method::POST, format!("/send/{some_id}")),
    ] {
        let body = (method == Method::POST).then(|| json!({"text": "hi"}));
        let (status, _, resp) = request(&app, method.clone(), &uri, None, body.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(resp["error"], "unauthenticated");

        // Garbage token fails identically
        let (status, _, resp) =
            request(&app, method, &uri, Some("parley_session=bogus"), body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(resp["error"], "unauthenticated");
    }
}

#[tokio::test]
async fn session_resolves_same_identity_across_requests() {
    let app = app();
    let (alice_id, cookie) = register(&app, "alice").await;
    let (bob_id, _) = register(&app, "bob").await;

    for _ in 0..3 {
        let (status, _, body) = request(&app, Method::GET, "/users", Some(&cookie), None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["id"].as_str().unwrap())
            .collect();
        assert!(!ids.contains(&alice_id.as_str()));
        assert_eq!(ids, vec![bob_id.as_str()]);
    }
}

#[tokio::test]
async fn directory_is_ordered_by_registration() {
    let app = app();
    let (_, cookie) = register(&app, "alice").await;
    let (bob_id, _) = register(&app, "bob").await;
    let (carol_id, _) = register(&app, "carol").await;

    let (status, _, body) = request(&app, Method::GET, "/users", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![bob_id.as_str(), carol_id.as_str()]);
}

#[tokio::test]
async fn expired_session_is_rejected() {
    // TTL of zero hours: the session is already expired when first used
    let app = app_with(0, false);
    let (_, cookie) = register(&app, "alice").await;

    let (status, _, body) = request(&app, Method::GET, "/users", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn logout_invalidates_session() {
    let app = app();
    let (_, cookie) = register(&app, "alice").await;

    let (status, _, _) =
        request(&app, Method::POST, "/auth/logout", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) = request(&app, Method::GET, "/users", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_flow() {
    let app = app();
    let (alice_id, _) = register(&app, "alice").await;

    let (status, _, body) = request(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"username": "alice", "password": "wrong-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let (status, cookie, body) = request(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"username": "alice", "password": "correct-horse-battery"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], alice_id.as_str());

    let cookie = cookie.expect("login must set the session cookie");
    let (status, _, _) = request(&app, Method::GET, "/users", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn register_validation() {
    let app = app();
    register(&app, "alice").await;

    // Duplicate username
    let (status, _, body) = request(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"username": "alice", "displayName": "Alice Two", "password": "correct-horse-battery"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "username_taken");

    // Short password
    let (status, _, body) = request(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"username": "bob", "displayName": "Bob", "password": "short"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "weak_password");

    // Username too short
    let (status, _, body) = request(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"username": "ab", "displayName": "Ab", "password": "correct-horse-battery"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_username");
}

#[tokio::test]
async fn send_rejects_bad_input() {
    let app = app();
    let (alice_id, alice) = register(&app, "alice").await;
    let (bob_id, _) = register(&app, "bob").await;

    // Whitespace-only body
    let (status, body) = send_text(&app, &alice, &bob_id, "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "empty_body");

    // Self-send
    let (status, body) = send_text(&app, &alice, &alice_id, "hi me").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "self_send");

    // Unknown recipient
    let (status, body) = send_text(
        &app,
        &alice,
        "99999999-9999-4999-8999-999999999999",
        "anyone there?",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn self_send_can_be_enabled() {
    let app = app_with(168, true);
    let (alice_id, alice) = register(&app, "alice").await;

    let (status, body) = send_text(&app, &alice, &alice_id, "note to self").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["senderId"], alice_id.as_str());
    assert_eq!(body["recipientId"], alice_id.as_str());
}

#[tokio::test]
async fn thread_scenario_hi_yo() {
    let app = app();
    let (alice_id, alice) = register(&app, "alice").await;
    let (bob_id, bob) = register(&app, "bob").await;

    let (status, sent) = send_text(&app, &alice, &bob_id, "hi").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["senderId"], alice_id.as_str());
    assert_eq!(sent["recipientId"], bob_id.as_str());
    assert_eq!(sent["body"], "hi");

    let (status, _) = send_text(&app, &bob, &alice_id, "yo").await;
    assert_eq!(status, StatusCode::CREATED);

    // Both directions see the same thread, oldest first, each message once
    for (cookie, other) in [(&alice, &bob_id), (&bob, &alice_id)] {
        let (status, _, body) =
            request(&app, Method::GET, &format!("/{other}"), Some(cookie), None).await;
        assert_eq!(status, StatusCode::OK);

        let thread = body.as_array().unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0]["senderId"], alice_id.as_str());
        assert_eq!(thread[0]["body"], "hi");
        assert_eq!(thread[1]["senderId"], bob_id.as_str());
        assert_eq!(thread[1]["body"], "yo");
        assert!(thread[0]["sentAt"].as_str().unwrap() <= thread[1]["sentAt"].as_str().unwrap());
    }
}

#[tokio::test]
async fn thread_with_unknown_user_is_not_found() {
    let app = app();
    let (_, alice) = register(&app, "alice").await;

    let (status, _, body) = request(
        &app,
        Method::GET,
        "/99999999-9999-4999-8999-999999999999",
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn user_profile_lookup() {
    let app = app();
    let (_, alice) = register(&app, "alice").await;
    let (bob_id, _) = register(&app, "bob").await;

    let (status, _, body) = request(
        &app,
        Method::GET,
        &format!("/users/{bob_id}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], bob_id.as_str());
    assert_eq!(body["displayName"], "bob");

    let (status, _, _) = request(
        &app,
        Method::GET,
        "/users/99999999-9999-4999-8999-999999999999",
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
