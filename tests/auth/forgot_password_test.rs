use serde_json::json;
use smartbudget::modules::auth::interface::UserRepository;
use smartbudget::services::email::EmailKind;

use crate::common::{test_email, TestContext, TestOptions};

const GENERIC: &str = "If an account exists with that email, a password reset link has been sent.";

#[tokio::test]
async fn forgot_password_for_known_email_sends_reset_link() {
    let ctx = TestContext::new().await;
    let email = ctx.create_verified_user().await;

    let response = ctx
        .server
        .post("/auth/forgot-password")
        .json(&json!({ "email": &email }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], GENERIC);

    let token = ctx
        .mailer
        .last_token(EmailKind::PasswordReset, &email)
        .expect("reset email");
    let user = ctx.users.find_by_email(&email).await.unwrap().unwrap();
    assert!(user.reset_token.is_some());
    assert_ne!(user.reset_token.as_deref(), Some(token.as_str()));
    assert!(user.reset_token_expiry.is_some());
}

#[tokio::test]
async fn forgot_password_for_unknown_email_looks_the_same() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/auth/forgot-password")
        .json(&json!({ "email": test_email() }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], GENERIC);
    assert!(ctx.mailer.sent().is_empty());
}

#[tokio::test]
async fn forgot_password_hides_delivery_failure() {
    let ctx = TestContext::with_options(TestOptions {
        failing_mailer: true,
        ..TestOptions::default()
    })
    .await;
    let email = test_email();
    ctx.register(&email, &crate::common::test_username()).await;

    let response = ctx
        .server
        .post("/auth/forgot-password")
        .json(&json!({ "email": &email }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], GENERIC);
}

#[tokio::test]
async fn forgot_password_with_malformed_email_still_gets_generic_answer() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/auth/forgot-password")
        .json(&json!({ "email": "not-an-email" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], GENERIC);
    assert!(ctx.mailer.sent().is_empty());
}
