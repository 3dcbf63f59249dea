use chrono::Utc;
use smartbudget::config::{init_db, Config};
use smartbudget::modules::auth::{
    crud::{RefreshTokenCrud, UserCrud},
    AuthRepositories, AuthService,
};
use smartbudget::modules::category::crud::CategoryCrud;
use smartbudget::services::{
    email::LogMailer, hashing::PasswordHasher, jwt::JwtService, rate_limit::create_rate_limiter,
    rate_limit::IpRateLimiter, session::SessionIssuer,
};
use smartbudget::{AppState, HttpOptions};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smartbudget=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let db = init_db(&config.database_url).await?;
    tracing::info!("Connected to MySQL");

    sqlx::migrate!().run(&db).await?;
    tracing::info!("Migrations applied");

    let repos = AuthRepositories {
        users: Arc::new(UserCrud::new(db.clone())),
        refresh_tokens: Arc::new(RefreshTokenCrud::new(db.clone())),
        categories: Arc::new(CategoryCrud::new(db)),
    };
    let auth = AuthService::new(
        repos,
        JwtService::new(&config.jwt_secret),
        PasswordHasher::new(config.password_cost)?,
        Arc::new(LogMailer),
        config.email_links.clone(),
    )
    .with_policy(config.lockout);

    let limiter = create_rate_limiter(&config.rate_limit);
    tokio::spawn(housekeeping(auth.sessions().clone(), limiter.clone()));

    let app = smartbudget::create_app(
        AppState {
            auth,
            cookie_secure: config.production,
        },
        limiter,
        HttpOptions {
            trust_forwarded_for: config.rate_limit.trust_forwarded_for,
            allowed_origins: config.allowed_origins.clone(),
        },
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server running on http://{}", config.bind_addr);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Drops expired refresh tokens and idle rate-limit buckets.
async fn housekeeping(sessions: SessionIssuer, limiter: IpRateLimiter) {
    let mut interval = tokio::time::interval(HOUSEKEEPING_INTERVAL);
    loop {
        interval.tick().await;

        match sessions.purge_expired(Utc::now()).await {
            Ok(0) => {}
            Ok(purged) => tracing::info!(purged, "expired refresh tokens removed"),
            Err(e) => tracing::error!(error = %e, "refresh token cleanup failed"),
        }

        limiter.retain_recent();
        limiter.shrink_to_fit();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
