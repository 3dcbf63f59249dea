use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;
use smartbudget::services::email::EmailKind;

use crate::common::{test_password, TestContext};

const NEW_PASSWORD: &str = "N3wSecret!";

async fn request_reset(ctx: &TestContext, email: &str) -> String {
    ctx.server
        .post("/auth/forgot-password")
        .json(&json!({ "email": email }))
        .await
        .assert_status_ok();
    ctx.mailer
        .last_token(EmailKind::PasswordReset, email)
        .expect("reset email")
}

async fn reset(ctx: &TestContext, token: &str, password: &str) -> axum_test::TestResponse {
    ctx.server
        .post("/auth/reset-password")
        .json(&json!({ "token": token, "newPassword": password }))
        .await
}

#[tokio::test]
async fn reset_password_changes_the_password() {
    let ctx = TestContext::new().await;
    let email = ctx.create_verified_user().await;
    let token = request_reset(&ctx, &email).await;

    reset(&ctx, &token, NEW_PASSWORD).await.assert_status_ok();

    ctx.login(&email, test_password())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    ctx.login(&email, NEW_PASSWORD).await.assert_status_ok();
}

#[tokio::test]
async fn reset_token_is_single_use() {
    let ctx = TestContext::new().await;
    let email = ctx.create_verified_user().await;
    let token = request_reset(&ctx, &email).await;

    reset(&ctx, &token, NEW_PASSWORD).await.assert_status_ok();

    let second = reset(&ctx, &token, "An0therOne!").await;
    second.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = second.json();
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn expired_reset_token_is_rejected() {
    let ctx = TestContext::new().await;
    let email = ctx.create_verified_user().await;
    let token = request_reset(&ctx, &email).await;

    let id = ctx.user_id(&email).await;
    ctx.users
        .update(&id, |u| u.reset_token_expiry = Some(Utc::now() - Duration::minutes(1)))
        .await;

    reset(&ctx, &token, NEW_PASSWORD)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    ctx.login(&email, test_password()).await.assert_status_ok();
}

#[tokio::test]
async fn reset_with_weak_password_is_rejected() {
    let ctx = TestContext::new().await;
    let email = ctx.create_verified_user().await;
    let token = request_reset(&ctx, &email).await;

    let response = reset(&ctx, &token, "weak").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn reset_password_ends_existing_sessions() {
    let ctx = TestContext::new().await;
    let (email, _, refresh) = ctx.create_logged_in_user().await;
    let token = request_reset(&ctx, &email).await;

    reset(&ctx, &token, NEW_PASSWORD).await.assert_status_ok();

    ctx.server
        .post("/auth/refresh-token")
        .add_cookie(cookie::Cookie::new("refreshToken", refresh))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}
