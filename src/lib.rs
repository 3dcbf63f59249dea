pub mod config;
pub mod modules;
pub mod services;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use modules::auth::{auth_routes, AuthService};
use services::rate_limit::IpRateLimiter;
use services::security::{no_store, security_headers};

pub struct AppState {
    pub auth: AuthService,
    /// Mark the refresh cookie `Secure`. On in production.
    pub cookie_secure: bool,
}

/// Router-level settings that are not part of the auth state itself.
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    pub trust_forwarded_for: bool,
    /// Empty means same-origin only.
    pub allowed_origins: Vec<String>,
}

pub fn create_app(state: AppState, limiter: IpRateLimiter, options: HttpOptions) -> Router {
    let state = Arc::new(state);

    let auth = auth_routes(limiter, options.trust_forwarded_for)
        .layer(middleware::from_fn(no_store));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/auth", auth)
        .layer(middleware::from_fn(security_headers))
        .layer(RequestBodyLimitLayer::new(1024 * 100)) // 100KB max body
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&options.allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn root() -> &'static str {
    "SmartBudget API"
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
