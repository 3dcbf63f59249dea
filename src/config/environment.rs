use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use crate::modules::auth::service::LockoutPolicy;
use crate::services::email::EmailLinks;
use crate::services::hashing::PasswordCost;
use crate::services::rate_limit::RateLimitConfig;

/// Environment configuration
/// Loads and validates environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub production: bool,
    pub password_cost: PasswordCost,
    pub rate_limit: RateLimitConfig,
    pub lockout: LockoutPolicy,
    pub allowed_origins: Vec<String>,
    pub email_links: EmailLinks,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL must be set".to_string())?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| "JWT_SECRET must be set".to_string())?;
        if jwt_secret.trim().is_empty() {
            return Err("JWT_SECRET must not be empty".to_string());
        }

        let bind_addr = parse_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?;

        let production = env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let default_cost = PasswordCost::default();
        let password_cost = PasswordCost::new(
            parse_or("ARGON2_MEMORY_KIB", default_cost.memory_kib)?,
            parse_or("ARGON2_ITERATIONS", default_cost.iterations)?,
            parse_or("ARGON2_PARALLELISM", default_cost.parallelism)?,
        );

        let default_limit = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            max_requests: parse_or("AUTH_RATE_LIMIT_MAX", default_limit.max_requests)?,
            window: Duration::from_secs(parse_or(
                "AUTH_RATE_LIMIT_WINDOW_SECS",
                default_limit.window.as_secs(),
            )?),
            trust_forwarded_for: parse_or("TRUST_PROXY", false)?,
        };

        let default_lockout = LockoutPolicy::default();
        let lockout = LockoutPolicy {
            max_failed_attempts: parse_or("LOGIN_MAX_FAILED_ATTEMPTS", default_lockout.max_failed_attempts)?
                .max(1),
            lockout_duration: chrono::Duration::minutes(parse_or(
                "LOGIN_LOCKOUT_MINUTES",
                default_lockout.lockout_duration.num_minutes(),
            )?),
            reset_token_ttl: chrono::Duration::minutes(parse_or(
                "PASSWORD_RESET_TTL_MINUTES",
                default_lockout.reset_token_ttl.num_minutes(),
            )?),
        };

        let allowed_origins = parse_allowed_origins(&env::var("ALLOWED_ORIGINS").unwrap_or_default())?;

        let defaults = EmailLinks::default();
        let email_links = EmailLinks {
            api_url: env::var("API_URL").unwrap_or(defaults.api_url),
            frontend_url: env::var("FRONTEND_URL").unwrap_or(defaults.frontend_url),
        };

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr,
            production,
            password_cost,
            rate_limit,
            lockout,
            allowed_origins,
            email_links,
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| format!("{} is invalid: {}", key, e)),
        _ => Ok(default),
    }
}

/// Comma separated origins. The refresh cookie needs credentialed CORS, which
/// cannot be combined with a `*` origin.
fn parse_allowed_origins(raw: &str) -> Result<Vec<String>, String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if origins.iter().any(|o| o == "*") {
        return Err("ALLOWED_ORIGINS cannot contain '*'; list the allowed origins explicitly".to_string());
    }
    Ok(origins)
}
