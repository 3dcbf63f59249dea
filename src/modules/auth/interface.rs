use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use super::model::{RefreshToken, TwoFactorState, User};
use crate::services::{hashing::HashingError, totp::TotpError};

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

pub type Result<T> = std::result::Result<T, AuthError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with [`AuthError::UserExists`] when email or username is taken.
    async fn create(&self, user: &User) -> Result<()>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn exists_by_email_or_username(&self, email: &str, username: &str) -> Result<bool>;
    /// Consumes a verification token digest. Returns false if no user holds it.
    async fn verify_email(&self, token_digest: &str) -> Result<bool>;
    async fn record_failed_login(
        &self,
        user_id: &str,
        attempts: i32,
        lockout_until: Option<DateTime<Utc>>,
    ) -> Result<()>;
    /// Clears the failure counter and lockout and stamps `last_login`.
    async fn record_successful_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<()>;
    async fn set_reset_token(&self, user_id: &str, token_digest: &str, expires_at: DateTime<Utc>) -> Result<()>;
    async fn find_by_reset_token(&self, token_digest: &str, now: DateTime<Utc>) -> Result<Option<User>>;
    /// Stores the new hash and clears the reset token, but only while the
    /// user still holds `token_digest`. Returns false if it was already used.
    async fn complete_password_reset(&self, user_id: &str, token_digest: &str, password_hash: &str) -> Result<bool>;
    async fn set_two_factor(&self, user_id: &str, state: &TwoFactorState) -> Result<()>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn create(&self, token: &RefreshToken) -> Result<()>;
    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>>;
    /// Idempotent.
    async fn revoke(&self, token_hash: &str) -> Result<()>;
    /// Revokes `old_hash` and stores `new_token` as one unit. Returns false,
    /// storing nothing, when `old_hash` was no longer usable at `now`.
    async fn rotate(&self, old_hash: &str, new_token: &RefreshToken, now: DateTime<Utc>) -> Result<bool>;
    async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64>;
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

// =============================================================================
// SERVICE RESULT TYPES
// =============================================================================

#[derive(Debug)]
pub enum LoginResult {
    Success(Box<SessionGrant>),
    Requires2fa,
}

/// What a successful login or refresh hands back to the client.
#[derive(Debug)]
pub struct SessionGrant {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Identity attached to requests that passed bearer authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid input")]
    Validation(Vec<FieldError>),

    #[error("Email or username already exists")]
    UserExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Please verify your email first.")]
    EmailNotVerified,

    #[error("Account is temporarily locked. Please try again later.")]
    AccountLocked,

    #[error("2FA code required")]
    TwoFactorRequired,

    #[error("Invalid 2FA code")]
    InvalidTwoFactorCode,

    #[error("Invalid 2FA code")]
    InvalidTwoFactorSetupCode,

    #[error("2FA setup not initiated or secret missing")]
    NoSecret,

    #[error("2FA is already enabled")]
    TwoFactorAlreadyEnabled,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("No refresh token")]
    NoToken,

    #[error("Invalid token")]
    InvalidRefreshToken,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Too many attempts. Please try again in 15 minutes.")]
    RateLimited,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Hashing(#[from] HashingError),

    #[error(transparent)]
    Totp(#[from] TotpError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UserExists => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::EmailNotVerified => StatusCode::FORBIDDEN,
            Self::AccountLocked => StatusCode::LOCKED,
            Self::TwoFactorRequired => StatusCode::UNAUTHORIZED,
            Self::InvalidTwoFactorCode => StatusCode::UNAUTHORIZED,
            Self::InvalidTwoFactorSetupCode => StatusCode::UNAUTHORIZED,
            Self::NoSecret => StatusCode::BAD_REQUEST,
            Self::TwoFactorAlreadyEnabled => StatusCode::BAD_REQUEST,
            Self::InvalidToken => StatusCode::BAD_REQUEST,
            Self::NoToken => StatusCode::UNAUTHORIZED,
            Self::InvalidRefreshToken => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Database(_)
            | Self::Hashing(_)
            | Self::Totp(_)
            | Self::Token(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UserExists => "USER_EXISTS",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            Self::AccountLocked => "ACCOUNT_LOCKED",
            Self::TwoFactorRequired => "TWO_FACTOR_REQUIRED",
            Self::InvalidTwoFactorCode => "INVALID_2FA",
            Self::InvalidTwoFactorSetupCode => "INVALID_2FA_CODE",
            Self::NoSecret => "NO_SECRET",
            Self::TwoFactorAlreadyEnabled => "TWO_FACTOR_ALREADY_ENABLED",
            Self::InvalidToken | Self::InvalidRefreshToken => "INVALID_TOKEN",
            Self::NoToken => "NO_TOKEN",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::RateLimited => "TOO_MANY_REQUESTS",
            Self::Database(_)
            | Self::Hashing(_)
            | Self::Totp(_)
            | Self::Token(_)
            | Self::Internal(_) => "SERVER_ERROR",
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let Self::TwoFactorRequired = self {
            return (
                status,
                Json(json!({
                    "success": false,
                    "requires2FA": true,
                    "message": self.to_string(),
                })),
            )
                .into_response();
        }

        let message = if self.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "An unexpected error occurred".to_string()
        } else {
            self.to_string()
        };

        let mut error = json!({
            "code": self.code(),
            "message": message,
        });
        if let Self::Validation(details) = &self {
            error["details"] = json!(details);
        }

        (status, Json(json!({ "success": false, "error": error }))).into_response()
    }
}
