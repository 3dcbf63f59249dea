use axum::http::{HeaderName, HeaderValue, StatusCode};
use serde_json::json;
use smartbudget::services::rate_limit::RateLimitConfig;
use std::time::Duration;

use crate::common::{test_email, test_password, TestContext, TestOptions};

const FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

async fn limited_context() -> TestContext {
    TestContext::with_options(TestOptions {
        rate_limit: RateLimitConfig {
            max_requests: 3,
            window: Duration::from_secs(15 * 60),
            trust_forwarded_for: true,
        },
        ..TestOptions::default()
    })
    .await
}

async fn login_from(ctx: &TestContext, ip: &'static str) -> axum_test::TestResponse {
    ctx.server
        .post("/auth/login")
        .add_header(FORWARDED_FOR, HeaderValue::from_static(ip))
        .json(&json!({ "email": test_email(), "password": test_password() }))
        .await
}

#[tokio::test]
async fn login_is_throttled_per_client_ip() {
    let ctx = limited_context().await;

    for _ in 0..3 {
        login_from(&ctx, "203.0.113.7")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    let blocked = login_from(&ctx, "203.0.113.7").await;
    blocked.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: serde_json::Value = blocked.json();
    assert_eq!(body["error"]["code"], "TOO_MANY_REQUESTS");

    // another client still gets through
    login_from(&ctx, "198.51.100.4")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forgot_password_shares_the_login_budget() {
    let ctx = limited_context().await;

    for _ in 0..3 {
        login_from(&ctx, "203.0.113.9").await;
    }

    ctx.server
        .post("/auth/forgot-password")
        .add_header(FORWARDED_FOR, HeaderValue::from_static("203.0.113.9"))
        .json(&json!({ "email": test_email() }))
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn other_auth_routes_are_not_throttled() {
    let ctx = limited_context().await;

    for _ in 0..5 {
        ctx.server
            .post("/auth/refresh-token")
            .add_header(FORWARDED_FOR, HeaderValue::from_static("203.0.113.11"))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
