//! Account and persistent-session integration tests
//!
//! Drives `src/auth` against the fake tree backend plus mocked identity
//! endpoints on the same server:
//!
//! - Registration writes the `users/{uid}` record; upstream failures
//!   surface with the provider's own message.
//! - Login merges the stored account record with fresh tokens and always
//!   returns an email.
//! - The persistent-session lifecycle: create, resume with refresh-token
//!   rotation, delete. Resume distinguishes a missing record, a
//!   corrupted record, and a record with no refresh token.
//! - Deleting an unknown or already-deleted session reports `false`.

mod common;

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quillbase::QuillbaseError;

async fn mock_identity(server: &MockServer, endpoint: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(format!("/v1/accounts:{endpoint}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_register_writes_account_record() {
    let (server, fake, client) = common::backend().await;
    mock_identity(
        &server,
        "signUp",
        json!({"localId": "u1", "idToken": "tok", "refreshToken": "rt"}),
    )
    .await;

    client
        .auth()
        .register("Author@Example.com", "secret123")
        .await
        .expect("register");

    let record = fake.value_at(&["users", "u1"]);
    assert_eq!(record["email"], json!("author@example.com"));
    assert_eq!(record["auth_provider"], json!("email"));
    assert_eq!(record["last_login"], json!(null));
    assert!(record["created_at"].is_i64());
}

#[tokio::test]
async fn test_register_surfaces_provider_message() {
    let (server, _fake, client) = common::backend().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signUp"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": {"code": 400, "message": "EMAIL_EXISTS"}})),
        )
        .mount(&server)
        .await;

    let err = client
        .auth()
        .register("a@example.com", "secret123")
        .await
        .unwrap_err();
    assert!(matches!(err, QuillbaseError::Auth(_)));
    assert_eq!(err.to_string(), "Registration failed: EMAIL_EXISTS");
}

#[tokio::test]
async fn test_login_merges_stored_record_with_fresh_tokens() {
    let (server, fake, client) = common::backend().await;
    fake.seed(
        &["users", "u1"],
        json!({"email": "a@example.com", "created_at": 5, "auth_provider": "email"}),
    );
    mock_identity(
        &server,
        "signInWithPassword",
        json!({"localId": "u1", "idToken": "fresh-id", "refreshToken": "fresh-rt"}),
    )
    .await;

    let user = client
        .auth()
        .login("a@example.com", "secret123")
        .await
        .expect("login");

    assert_eq!(user.uid, "u1");
    assert_eq!(user.email.as_deref(), Some("a@example.com"));
    assert_eq!(user.id_token.as_deref(), Some("fresh-id"));
    assert_eq!(user.refresh_token.as_deref(), Some("fresh-rt"));
    assert_eq!(user.auth_provider.as_deref(), Some("email"));
    assert!(user.last_login.is_some());

    // The stored record was touched, not replaced.
    let stored = fake.value_at(&["users", "u1"]);
    assert_eq!(stored["created_at"], json!(5));
    assert!(stored["last_login"].is_i64());
}

#[tokio::test]
async fn test_login_fills_email_for_legacy_records() {
    let (server, fake, client) = common::backend().await;
    fake.seed(&["users", "u1"], json!({"created_at": 5}));
    mock_identity(
        &server,
        "signInWithPassword",
        json!({"localId": "u1", "idToken": "tok"}),
    )
    .await;

    let user = client
        .auth()
        .login("Mixed@Example.com", "secret123")
        .await
        .expect("login");
    assert_eq!(user.email.as_deref(), Some("mixed@example.com"));
    assert_eq!(
        fake.value_at(&["users", "u1", "email"]),
        json!("mixed@example.com")
    );
}

#[tokio::test]
async fn test_persistent_session_lifecycle_rotates_refresh_token() {
    let (server, fake, client) = common::backend().await;
    fake.seed(&["users", "u1"], json!({"email": "a@example.com"}));
    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt-original"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_id": "u1",
            "id_token": "fresh-id",
            "refresh_token": "rt-rotated",
            "expires_in": "3600"
        })))
        .mount(&server)
        .await;

    let token = client
        .auth()
        .create_persistent_session("u1", "rt-original", None)
        .await
        .expect("create session");
    assert_eq!(
        fake.value_at(&["auth_sessions", &token, "refresh_token"]),
        json!("rt-original")
    );

    let user = client.auth().resume_session(&token).await.expect("resume");
    assert_eq!(user.uid, "u1");
    assert_eq!(user.id_token.as_deref(), Some("fresh-id"));
    assert_eq!(user.refresh_token.as_deref(), Some("rt-rotated"));
    assert_eq!(user.email.as_deref(), Some("a@example.com"));

    // The stored session now carries the rotated token.
    let session = fake.value_at(&["auth_sessions", &token]);
    assert_eq!(session["refresh_token"], json!("rt-rotated"));
    assert_eq!(session["expires_in"], json!("3600"));

    assert!(client.auth().delete_persistent_session(&token).await);
    assert_eq!(fake.value_at(&["auth_sessions", &token]), json!(null));
    // A second delete of the same token is a no-op reporting false.
    assert!(!client.auth().delete_persistent_session(&token).await);
}

#[tokio::test]
async fn test_resume_unknown_session_is_not_found() {
    let (_server, _fake, client) = common::backend().await;
    let err = client.auth().resume_session("no-such-token").await.unwrap_err();
    assert!(matches!(err, QuillbaseError::NotFound(_)));
    assert_eq!(err.to_string(), "Session not found.");
}

#[tokio::test]
async fn test_resume_corrupted_session_is_rejected() {
    let (_server, fake, client) = common::backend().await;
    fake.seed(&["auth_sessions", "tok"], json!("not an object"));

    let err = client.auth().resume_session("tok").await.unwrap_err();
    assert!(matches!(err, QuillbaseError::Validation(_)));
    assert_eq!(err.to_string(), "Session data is corrupted.");
}

#[tokio::test]
async fn test_resume_session_without_refresh_token_is_rejected() {
    let (_server, fake, client) = common::backend().await;
    fake.seed(
        &["auth_sessions", "tok"],
        json!({"user_id": "u1", "created_at": 1, "updated_at": 1}),
    );

    let err = client.auth().resume_session("tok").await.unwrap_err();
    assert_eq!(err.to_string(), "Session missing refresh token.");
}

#[tokio::test]
async fn test_resume_surfaces_upstream_refresh_failure() {
    let (server, fake, client) = common::backend().await;
    fake.seed(
        &["auth_sessions", "tok"],
        json!({"user_id": "u1", "refresh_token": "rt-stale", "created_at": 1, "updated_at": 1}),
    );
    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": {"code": 400, "message": "TOKEN_EXPIRED"}})),
        )
        .mount(&server)
        .await;

    let err = client.auth().resume_session("tok").await.unwrap_err();
    assert!(matches!(err, QuillbaseError::Auth(_)));
    assert_eq!(err.to_string(), "TOKEN_EXPIRED");
    // The stored token is left untouched for a later retry.
    assert_eq!(
        fake.value_at(&["auth_sessions", "tok", "refresh_token"]),
        json!("rt-stale")
    );
}

#[tokio::test]
async fn test_resume_falls_back_to_metadata_email() {
    let (server, fake, client) = common::backend().await;
    fake.seed(
        &["auth_sessions", "tok"],
        json!({
            "user_id": "u1",
            "refresh_token": "rt",
            "created_at": 1,
            "updated_at": 1,
            "metadata": {"email": "stash@example.com"}
        }),
    );
    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_id": "u1",
            "id_token": "fresh-id",
            "refresh_token": "rt2"
        })))
        .mount(&server)
        .await;

    let user = client.auth().resume_session("tok").await.expect("resume");
    assert_eq!(user.email.as_deref(), Some("stash@example.com"));
}

#[tokio::test]
async fn test_google_sign_in_result_with_local_id_writes_account() {
    let (_server, fake, client) = common::backend().await;

    let mut payload = serde_json::Map::new();
    payload.insert("localId".to_string(), json!("g1"));
    payload.insert("email".to_string(), json!("Person@Gmail.com"));
    payload.insert("idToken".to_string(), json!("g-id-token"));
    payload.insert("refreshToken".to_string(), json!("g-rt"));

    let user = client
        .auth()
        .login_with_google(quillbase::GoogleCredential::SignInResult(payload))
        .await
        .expect("google login");

    assert_eq!(user.uid, "g1");
    assert_eq!(user.email.as_deref(), Some("person@gmail.com"));
    assert_eq!(user.auth_provider.as_deref(), Some("google"));
    assert_eq!(
        fake.value_at(&["users", "g1", "auth_provider"]),
        json!("google")
    );
}

#[tokio::test]
async fn test_google_id_token_is_exchanged_via_idp_endpoint() {
    let (server, fake, client) = common::backend().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithIdp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "localId": "g2",
            "email": "idp@example.com",
            "idToken": "exchanged-token"
        })))
        .mount(&server)
        .await;

    let user = client
        .auth()
        .login_with_google(quillbase::GoogleCredential::IdToken("raw-token".to_string()))
        .await
        .expect("google login");
    assert_eq!(user.uid, "g2");
    assert_eq!(
        fake.value_at(&["users", "g2", "email"]),
        json!("idp@example.com")
    );
}
