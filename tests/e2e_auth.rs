//! E2E tests for Google OAuth and session endpoints

mod common;

use common::{FRONTEND_URL, PROVIDER_AUTH_URL, TestServer, location, session_cookie, state_param};

#[tokio::test]
async fn test_login_redirects_to_provider_with_state() {
    let server = TestServer::new().await;

    let response = server.get("/auth/google/login", None).await;

    assert_eq!(response.status(), 307);
    let location = location(&response);
    assert!(location.starts_with(PROVIDER_AUTH_URL));
    let state = state_param(location);
    assert!(!state.is_empty());
    assert!(!state.contains(':'));
}

#[tokio::test]
async fn test_login_states_are_unique() {
    let server = TestServer::new().await;

    let first = server.get("/auth/google/login", None).await;
    let second = server.get("/auth/google/login", None).await;
    assert_ne!(
        state_param(location(&first)),
        state_param(location(&second))
    );
}

#[tokio::test]
async fn test_signup_state_carries_handle() {
    let server = TestServer::new().await;

    let response = server.get("/auth/google/signup?username=bob", None).await;

    assert_eq!(response.status(), 307);
    assert!(state_param(location(&response)).ends_with(":bob"));
}

#[tokio::test]
async fn test_signup_with_bad_username_returns_error_envelope() {
    let server = TestServer::new().await;

    for handle in ["x", "api", "abcdefghijklmnopq"] {
        let response = server
            .get(&format!("/auth/google/signup?username={handle}"), None)
            .await;

        assert_eq!(response.status(), 400);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["errorMessage"], "bad username");
        assert_eq!(body["errorCode"], 400);
        assert_eq!(body["errorData"]["username"], handle);
    }
}

#[tokio::test]
async fn test_callback_rejects_forged_state() {
    let server = TestServer::new().await;
    server.provider.register("code-1", "a@x.com");

    let response = server.callback("forged", "code-1", None).await;

    assert_eq!(response.status(), 401);
    assert!(session_cookie(&response).is_none());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["errorCode"], 401);
}

#[tokio::test]
async fn test_callback_state_is_single_use() {
    let server = TestServer::new().await;
    server.sign_up("alice", "a@x.com").await;
    server.provider.register("again", "a@x.com");

    let response = server.get("/auth/google/login", None).await;
    let state = state_param(location(&response));

    let first = server.callback(&state, "again", None).await;
    assert_eq!(first.status(), 307);
    let replay = server.callback(&state, "again", None).await;
    assert_eq!(replay.status(), 401);
}

#[tokio::test]
async fn test_signup_then_get_login() {
    let server = TestServer::new().await;

    let cookie = server.sign_up("bob", "b@x.com").await;

    let response = server.get("/api/get_login", Some(&cookie)).await;
    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_login_without_session_is_unauthorized() {
    let server = TestServer::new().await;

    let response = server.get("/api/get_login", None).await;
    assert_eq!(response.status(), 401);

    let response = server.get("/api/get_login", Some("bogus")).await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_login_of_known_email_redirects_to_editor() {
    let server = TestServer::new().await;
    server.sign_up("alice", "a@x.com").await;

    let response = server.log_in("a@x.com").await;

    assert_eq!(response.status(), 307);
    assert_eq!(location(&response), format!("{FRONTEND_URL}/editor"));
    let cookie = session_cookie(&response).expect("rotated session cookie");
    assert_eq!(server.get("/api/get_login", Some(&cookie)).await.status(), 200);
}

#[tokio::test]
async fn test_login_of_unknown_email_asks_to_finish_signup() {
    let server = TestServer::new().await;

    let response = server.log_in("c@x.com").await;

    assert_eq!(location(&response), format!("{FRONTEND_URL}/signup?finish=true"));
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn test_signup_with_registered_email_logs_into_existing_account() {
    let server = TestServer::new().await;
    server.sign_up("alice", "a@x.com").await;
    server.provider.register("second", "a@x.com");

    let response = server.get("/auth/google/signup?username=alice2", None).await;
    let state = state_param(location(&response));
    let response = server.callback(&state, "second", None).await;

    assert_eq!(
        location(&response),
        format!("{FRONTEND_URL}/editor?existing_login=alice")
    );
    let response = server.get("/api/check_username?username=alice2", None).await;
    assert!(response.json::<bool>().await.unwrap());
}

#[tokio::test]
async fn test_handle_claimed_during_handshake() {
    let server = TestServer::new().await;
    server.provider.register("late", "late@x.com");

    let response = server.get("/auth/google/signup?username=bob", None).await;
    let state = state_param(location(&response));

    server.sign_up("bob", "b@x.com").await;

    let response = server.callback(&state, "late", None).await;
    assert_eq!(location(&response), format!("{FRONTEND_URL}/signup?error=true"));
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn test_failed_code_exchange_redirects_home() {
    let server = TestServer::new().await;

    let response = server.get("/auth/google/login", None).await;
    let state = state_param(location(&response));
    let response = server.callback(&state, "unknown-code", None).await;

    assert_eq!(response.status(), 307);
    assert_eq!(location(&response), format!("{FRONTEND_URL}/"));
}

#[tokio::test]
async fn test_login_rotates_session_token() {
    let server = TestServer::new().await;
    let first = server.sign_up("alice", "a@x.com").await;

    server.provider.register("again", "a@x.com");
    let response = server.get("/auth/google/login", None).await;
    let state = state_param(location(&response));
    let response = server.callback(&state, "again", Some(&first)).await;

    let second = session_cookie(&response).expect("rotated session cookie");
    assert_ne!(first, second);
    assert_eq!(server.get("/api/get_login", Some(&first)).await.status(), 401);
    assert_eq!(server.get("/api/get_login", Some(&second)).await.status(), 200);
}

#[tokio::test]
async fn test_logout_rotates_and_unbinds() {
    let server = TestServer::new().await;
    let cookie = server.sign_up("alice", "a@x.com").await;

    let response = server.get("/api/logout", Some(&cookie)).await;

    assert_eq!(response.status(), 307);
    assert_eq!(location(&response), format!("{FRONTEND_URL}/"));
    let after = session_cookie(&response).expect("rotated session cookie");
    assert_ne!(after, cookie);

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(set_cookie.contains("HttpOnly"));

    assert_eq!(server.get("/api/get_login", Some(&cookie)).await.status(), 401);
    assert_eq!(server.get("/api/get_login", Some(&after)).await.status(), 401);
}

#[tokio::test]
async fn test_deleted_identity_session_self_heals() {
    let server = TestServer::new().await;
    let cookie = server.sign_up("alice", "a@x.com").await;

    let alice = server
        .state
        .db
        .find_identity_by_handle("alice")
        .await
        .unwrap()
        .unwrap();
    server.state.db.delete_identity(&alice.id).await.unwrap();

    assert_eq!(server.get("/api/get_login", Some(&cookie)).await.status(), 401);
    assert_eq!(server.get("/api/get_login", Some(&cookie)).await.status(), 401);
}

#[tokio::test]
async fn test_signup_records_provenance() {
    let server = TestServer::new().await;
    server.sign_up("bob", "b@x.com").await;

    let bob = server
        .state
        .db
        .find_identity_by_handle("bob")
        .await
        .unwrap()
        .unwrap();
    assert!(bob.signup_ip.as_deref().unwrap().starts_with("127.0.0.1:"));
}
