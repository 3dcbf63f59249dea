use axum::http::StatusCode;
use chrono::Utc;
use cookie::Cookie;

use crate::common::TestContext;

#[tokio::test]
async fn logout_revokes_refresh_token_and_clears_cookie() {
    let ctx = TestContext::new().await;
    let (email, _, refresh) = ctx.create_logged_in_user().await;
    let user_id = ctx.user_id(&email).await;

    let response = ctx
        .server
        .post("/auth/logout")
        .add_cookie(Cookie::new("refreshToken", refresh.clone()))
        .await;

    response.assert_status_ok();
    assert_eq!(response.cookie("refreshToken").value(), "");
    assert_eq!(ctx.refresh_tokens.active_for_user(&user_id, Utc::now()).await, 0);

    let refresh_after = ctx
        .server
        .post("/auth/refresh-token")
        .add_cookie(Cookie::new("refreshToken", refresh))
        .await;
    refresh_after.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn logout_without_cookie_succeeds() {
    let ctx = TestContext::new().await;

    let response = ctx.server.post("/auth/logout").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn logout_twice_is_not_an_error() {
    let ctx = TestContext::new().await;
    let (_, _, refresh) = ctx.create_logged_in_user().await;

    for _ in 0..2 {
        ctx.server
            .post("/auth/logout")
            .add_cookie(Cookie::new("refreshToken", refresh.clone()))
            .await
            .assert_status_ok();
    }
}
