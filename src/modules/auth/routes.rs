use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::controller;
use crate::services::rate_limit::{IpRateLimiter, RateLimitLayer};
use crate::AppState;

/// Login and forgot-password share one per-IP budget.
pub fn auth_routes(limiter: IpRateLimiter, trust_forwarded_for: bool) -> Router<Arc<AppState>> {
    let throttled = Router::new()
        .route("/login", post(controller::login))
        .route("/forgot-password", post(controller::forgot_password))
        .layer(RateLimitLayer::new(limiter, trust_forwarded_for));

    Router::new()
        .route("/register", post(controller::register))
        .route("/logout", post(controller::logout))
        .route("/refresh-token", post(controller::refresh_token))
        .route("/verify-email", get(controller::verify_email))
        .route("/reset-password", post(controller::reset_password))
        .route("/2fa/enable", post(controller::enable_2fa))
        .route("/2fa/verify", post(controller::verify_2fa))
        .route("/2fa/disable", post(controller::disable_2fa))
        .route("/me", get(controller::me))
        .merge(throttled)
}
