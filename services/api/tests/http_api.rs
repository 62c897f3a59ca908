//! HTTP-level scenarios driven through the full router with in-memory adapters.

use std::sync::Arc;

use api_lib::config::Config;
use api_lib::web::{jwt::TokenKeys, router, state::AppState};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use writing_coach_core::testing::{MemoryDatabase, ScriptedOracle, WhitespaceSegmenter, SAMPLE_REPORT};
use writing_coach_core::{
    CritiqueClient, DatabaseService, HskDictionary, PasswordResetToken, StoredTimestamp,
    SubmissionWorkflow, VocabularyScorer,
};

const ESSAY: &str = "我 很 喜欢 学习 中文 。 中文 是 一门 很 有意思 的 语言 。\n学习 中文 有 很多 好处 。";

struct TestApp {
    router: Router,
    db: Arc<MemoryDatabase>,
    oracle: Arc<ScriptedOracle>,
}

fn config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().expect("socket address"),
        database_url: "postgres://unused".to_string(),
        log_level: tracing::Level::INFO,
        openai_api_key: None,
        openai_model: "test-model".to_string(),
        jwt_secret: "integration-secret".to_string(),
        access_token_expire_minutes: 30,
        hsk_vocabulary_path: "./missing.json".into(),
        frontend_url: "http://localhost:5173".to_string(),
        password_reset_ttl_minutes: 60,
    }
}

fn app_with(oracle: ScriptedOracle) -> TestApp {
    let db = Arc::new(MemoryDatabase::new());
    let oracle = Arc::new(oracle);
    let config = Arc::new(config());

    let store: Arc<dyn DatabaseService> = db.clone();
    let vocabulary = Arc::new(VocabularyScorer::new(
        Arc::new(HskDictionary::default()),
        Box::new(WhitespaceSegmenter),
    ));
    let state = Arc::new(AppState {
        db: store.clone(),
        tokens: TokenKeys::new(&config.jwt_secret, config.access_token_expire_minutes),
        submissions: SubmissionWorkflow::new(store, vocabulary, CritiqueClient::new(oracle.clone())),
        config,
    });

    TestApp {
        router: router(state),
        db,
        oracle,
    }
}

fn app() -> TestApp {
    app_with(ScriptedOracle::replying(SAMPLE_REPORT))
}

async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.router.clone().oneshot(request).await.expect("router dispatch");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    (status, bytes.to_vec())
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("json payload")
}

/// Registers a user and returns its access token and id.
async fn register(app: &TestApp, email: &str, username: &str) -> (String, Uuid) {
    let (status, body) = send(
        app,
        "POST",
        "/api/users/register",
        None,
        Some(json!({ "email": email, "username": username, "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let payload = json_body(&body);
    let token = payload["access_token"].as_str().expect("token").to_string();
    let id = payload["user"]["id"].as_str().expect("id").parse().expect("uuid");
    (token, id)
}

async fn submit(app: &TestApp, token: &str) -> (StatusCode, Vec<u8>) {
    send(
        app,
        "POST",
        "/api/essays/submit",
        Some(token),
        Some(json!({ "title": "我的中文学习", "content": ESSAY, "theme": "学习" })),
    )
    .await
}

#[tokio::test]
async fn health_and_banner_are_public() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({ "status": "healthy" }));

    let (status, body) = send(&app, "GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "running");
}

#[tokio::test]
async fn register_then_login_then_read_profile() {
    let app = app();
    let (token, id) = register(&app, "li@example.com", "xiaoli").await;

    let (status, body) = send(&app, "GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let me = json_body(&body);
    assert_eq!(me["id"], id.to_string());
    assert_eq!(me["target_level"], 3);
    assert_eq!(me["preferred_language"], "en");

    let (status, body) = send(
        &app,
        "POST",
        "/api/users/login",
        None,
        Some(json!({ "email": "li@example.com", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["token_type"], "bearer");

    let (status, body) = send(
        &app,
        "POST",
        "/api/users/login",
        None,
        Some(json!({ "email": "li@example.com", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(String::from_utf8_lossy(&body), "Incorrect email or password");
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = app();
    register(&app, "li@example.com", "xiaoli").await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/users/register",
        None,
        Some(json!({ "email": "li@example.com", "username": "other", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(String::from_utf8_lossy(&body), "Email already registered");

    let (status, body) = send(
        &app,
        "POST",
        "/api/users/register",
        None,
        Some(json!({ "email": "wang@example.com", "username": "xiaoli", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(String::from_utf8_lossy(&body), "Username already taken");
}

#[tokio::test]
async fn invalid_registration_is_unprocessable() {
    let app = app();
    let (status, _) = send(
        &app,
        "POST",
        "/api/users/register",
        None,
        Some(json!({ "email": "nope", "username": "li", "password": "short", "target_level": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = app();
    let (status, _) = send(&app, "GET", "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/essays", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let foreign = TokenKeys::new("some-other-secret", 30)
        .issue(Uuid::new_v4())
        .expect("token");
    let (status, _) = send(&app, "GET", "/api/drafts", Some(&foreign), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn settings_update_is_partial_and_validated() {
    let app = app();
    let (token, _) = register(&app, "li@example.com", "xiaoli").await;

    let (status, body) = send(
        &app,
        "PUT",
        "/api/users/me/settings",
        Some(&token),
        Some(json!({ "target_level": 5, "dark_mode": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let user = json_body(&body);
    assert_eq!(user["target_level"], 5);
    assert_eq!(user["dark_mode"], true);
    assert_eq!(user["preferred_language"], "en");

    let (status, _) = send(
        &app,
        "PUT",
        "/api/users/me/settings",
        Some(&token),
        Some(json!({ "target_level": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn submitted_essay_is_scored_listed_and_readable() {
    let app = app();
    let (token, _) = register(&app, "li@example.com", "xiaoli").await;

    let (status, body) = submit(&app, &token).await;
    assert_eq!(status, StatusCode::CREATED);
    let analysis = json_body(&body);
    let essay_id = analysis["essay_id"].as_str().expect("essay id").to_string();
    assert_eq!(analysis["analysis_language"], "en");
    assert_eq!(analysis["grammar_score"], 81);
    assert!(!analysis["recommendations"].as_array().expect("array").is_empty());
    assert_eq!(app.oracle.calls(), 1);

    let (status, body) = send(&app, "GET", "/api/essays", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let list = json_body(&body);
    assert_eq!(list.as_array().expect("array").len(), 1);
    assert_eq!(list[0]["overall_score"], analysis["overall_score"]);

    let (status, body) = send(&app, "GET", &format!("/api/essays/{}", essay_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["title"], "我的中文学习");

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/essays/{}/analysis", essay_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["overall_score"], analysis["overall_score"]);
}

#[tokio::test]
async fn provider_failure_is_a_gateway_error_and_stores_nothing() {
    let app = app_with(ScriptedOracle::failing("connection reset"));
    let (token, _) = register(&app, "li@example.com", "xiaoli").await;

    let (status, body) = submit(&app, &token).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!String::from_utf8_lossy(&body).contains("connection reset"));
    assert_eq!(app.db.essay_count(), 0);
    assert_eq!(app.db.analysis_count(), 0);

    let (_, body) = send(&app, "GET", "/api/essays", Some(&token), None).await;
    assert_eq!(json_body(&body), json!([]));
}

#[tokio::test]
async fn short_essay_is_unprocessable() {
    let app = app();
    let (token, _) = register(&app, "li@example.com", "xiaoli").await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/essays/submit",
        Some(&token),
        Some(json!({ "title": "短", "content": "太短了" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.oracle.calls(), 0);
}

#[tokio::test]
async fn paging_bounds_are_checked() {
    let app = app();
    let (token, _) = register(&app, "li@example.com", "xiaoli").await;
    let (status, _) = send(&app, "GET", "/api/essays?limit=0", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, "GET", "/api/essays?limit=5&offset=-1", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn essays_are_private_to_their_owner() {
    let app = app();
    let (owner, _) = register(&app, "li@example.com", "xiaoli").await;
    let (intruder, _) = register(&app, "wang@example.com", "xiaowang").await;

    let (_, body) = submit(&app, &owner).await;
    let essay_id = json_body(&body)["essay_id"].as_str().expect("id").to_string();

    for uri in [
        format!("/api/essays/{}", essay_id),
        format!("/api/essays/{}/analysis", essay_id),
    ] {
        let (status, _) = send(&app, "GET", &uri, Some(&intruder), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
    let (status, _) = send(&app, "DELETE", &format!("/api/essays/{}", essay_id), Some(&intruder), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.db.essay_count(), 1);

    let (status, _) = send(&app, "DELETE", &format!("/api/essays/{}", essay_id), Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.db.essay_count(), 0);
    assert_eq!(app.db.analysis_count(), 0);

    let (status, _) = send(&app, "GET", &format!("/api/essays/{}", essay_id), Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn drafts_round_trip_through_crud() {
    let app = app();
    let (token, _) = register(&app, "li@example.com", "xiaoli").await;
    let (other, _) = register(&app, "wang@example.com", "xiaowang").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/drafts",
        Some(&token),
        Some(json!({ "title": "草稿", "content": "还没写完", "char_count": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let draft_id = json_body(&body)["id"].as_str().expect("id").to_string();
    let uri = format!("/api/drafts/{}", draft_id);

    let (status, body) = send(
        &app,
        "PUT",
        &uri,
        Some(&token),
        Some(json!({ "title": "新标题", "target_level": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let updated = json_body(&body);
    assert_eq!(updated["title"], "新标题");
    assert_eq!(updated["content"], "还没写完");
    assert_eq!(updated["target_level"], 4);

    let (status, _) = send(&app, "GET", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = send(&app, "GET", "/api/drafts", Some(&token), None).await;
    assert_eq!(json_body(&body).as_array().expect("array").len(), 1);
    let (_, body) = send(&app, "GET", "/api/drafts", Some(&other), None).await;
    assert_eq!(json_body(&body), json!([]));

    let (status, _) = send(&app, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn negative_draft_char_count_is_unprocessable() {
    let app = app();
    let (token, _) = register(&app, "li@example.com", "xiaoli").await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/drafts",
        Some(&token),
        Some(json!({ "char_count": -1 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn password_reset_flow() {
    let app = app();
    let (_, user_id) = register(&app, "li@example.com", "xiaoli").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/users/forgot-password",
        None,
        Some(json!({ "email": "li@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let known_message = json_body(&body)["message"].clone();

    let (status, body) = send(
        &app,
        "POST",
        "/api/users/forgot-password",
        None,
        Some(json!({ "email": "nobody@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["message"], known_message);

    let tokens = app.db.reset_tokens_for(user_id);
    assert_eq!(tokens.len(), 1);
    let token = tokens[0].token.clone();
    assert_eq!(token.len(), 64);

    let (status, body) = send(&app, "GET", &format!("/api/users/verify-reset-token/{}", token), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["valid"], true);

    let (status, _) = send(
        &app,
        "POST",
        "/api/users/reset-password",
        None,
        Some(json!({ "token": token, "new_password": "brand-new-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        "/api/users/login",
        None,
        Some(json!({ "email": "li@example.com", "password": "brand-new-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        "/api/users/reset-password",
        None,
        Some(json!({ "token": token, "new_password": "another-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_timezone_naive_token_is_rejected() {
    let app = app();
    let (_, user_id) = register(&app, "li@example.com", "xiaoli").await;
    let token = "ab".repeat(32);
    app.db.insert_reset_token(PasswordResetToken {
        id: Uuid::new_v4(),
        user_id,
        token: token.clone(),
        expires_at: StoredTimestamp::Naive((Utc::now() - Duration::minutes(5)).naive_utc()),
        used: false,
        created_at: Utc::now() - Duration::hours(1),
    });

    let (status, _) = send(&app, "GET", &format!("/api/users/verify-reset-token/{}", token), None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let before = app.db.password_hash_for(user_id);
    let (status, _) = send(
        &app,
        "POST",
        "/api/users/reset-password",
        None,
        Some(json!({ "token": token, "new_password": "brand-new-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.db.password_hash_for(user_id), before);
}

#[tokio::test]
async fn deleting_the_account_removes_its_essays() {
    let app = app();
    let (token, _) = register(&app, "li@example.com", "xiaoli").await;
    submit(&app, &token).await;
    assert_eq!(app.db.essay_count(), 1);

    let (status, _) = send(&app, "DELETE", "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.db.essay_count(), 0);

    let (status, _) = send(&app, "GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
