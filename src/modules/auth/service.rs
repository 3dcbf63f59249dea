//! Account lifecycle and login decisions.
//!
//! Account state is not stored as an enum. It falls out of the user row:
//! `is_email_verified`, `lockout_until`, `is_active` and the two-factor
//! columns (see [`User::status`]). Every check-then-write here relies on the
//! repository for atomicity; there are no in-process locks.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::interface::{
    AuthError, AuthUser, LoginResult, RefreshTokenRepository, Result, SessionGrant, TokenPair,
    UserRepository,
};
use super::model::{AccountStatus, TwoFactorState, User};
use super::schema::{LoginRequest, RegisterRequest};
use crate::modules::category::model::{default_categories_for, CategoryRepository};
use crate::services::email::{EmailLinks, Mailer};
use crate::services::hashing::PasswordHasher;
use crate::services::jwt::{AccessTokenError, JwtService};
use crate::services::session::{RefreshLookup, SessionIssuer};
use crate::services::tokens::{random_token, token_digest, ONE_TIME_TOKEN_BYTES};
use crate::services::totp::{TotpEnrollment, TotpService};

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_failed_attempts: i32,
    pub lockout_duration: Duration,
    pub reset_token_ttl: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_duration: Duration::minutes(15),
            reset_token_ttl: Duration::hours(1),
        }
    }
}

pub struct AuthRepositories {
    pub users: Arc<dyn UserRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    pub categories: Arc<dyn CategoryRepository>,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    categories: Arc<dyn CategoryRepository>,
    sessions: SessionIssuer,
    hasher: PasswordHasher,
    totp: TotpService,
    mailer: Arc<dyn Mailer>,
    links: EmailLinks,
    policy: LockoutPolicy,
}

impl AuthService {
    pub fn new(
        repos: AuthRepositories,
        jwt: JwtService,
        hasher: PasswordHasher,
        mailer: Arc<dyn Mailer>,
        links: EmailLinks,
    ) -> Self {
        Self {
            users: repos.users,
            categories: repos.categories,
            sessions: SessionIssuer::new(jwt, repos.refresh_tokens),
            hasher,
            totp: TotpService::default(),
            mailer,
            links,
            policy: LockoutPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: LockoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }

    pub fn totp(&self) -> &TotpService {
        &self.totp
    }

    // -------------------------------------------------------------------------
    // Registration and verification
    // -------------------------------------------------------------------------

    pub async fn register(&self, req: RegisterRequest) -> Result<User> {
        if self
            .users
            .exists_by_email_or_username(&req.email, &req.username)
            .await?
        {
            return Err(AuthError::UserExists);
        }

        let password_hash = self.hasher.hash(&req.password).await?;
        let verify_token = random_token(ONE_TIME_TOKEN_BYTES);
        let now = Utc::now();

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: req.email,
            username: req.username,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            is_active: true,
            is_email_verified: false,
            email_verify_token: Some(token_digest(&verify_token)),
            reset_token: None,
            reset_token_expiry: None,
            failed_login_attempts: 0,
            lockout_until: None,
            two_factor_enabled: false,
            two_factor_secret: None,
            last_login: None,
            created_at: now,
            updated_at: now,
        };

        self.users.create(&user).await?;
        self.categories
            .create_batch(&default_categories_for(&user.id, now))
            .await?;

        // Delivery failure must not undo the account
        let message = self.links.verification(&user.email, &verify_token);
        if let Err(e) = self.mailer.send(message).await {
            tracing::warn!(user_id = %user.id, error = %e, "verification email not sent");
        }

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn verify_email(&self, token: &str) -> Result<()> {
        if token.is_empty() || !self.users.verify_email(&token_digest(token)).await? {
            return Err(AuthError::InvalidToken);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Login
    // -------------------------------------------------------------------------

    pub async fn login(&self, req: &LoginRequest) -> Result<LoginResult> {
        self.login_at(req, Utc::now()).await
    }

    /// Login with an explicit clock. The order of checks is part of the
    /// contract: existence, verification, lockout, password, second factor.
    pub async fn login_at(&self, req: &LoginRequest, now: DateTime<Utc>) -> Result<LoginResult> {
        let Some(user) = self.users.find_by_email(&req.email).await? else {
            self.hasher.verify_dummy(&req.password).await;
            return Err(AuthError::InvalidCredentials);
        };

        match user.status(now) {
            AccountStatus::Disabled => {
                self.hasher.verify_dummy(&req.password).await;
                return Err(AuthError::InvalidCredentials);
            }
            AccountStatus::Unverified => return Err(AuthError::EmailNotVerified),
            AccountStatus::Locked => return Err(AuthError::AccountLocked),
            AccountStatus::Active => {}
        }

        if !self.hasher.verify(&req.password, &user.password_hash).await? {
            self.record_failure(&user, now).await?;
            return Err(AuthError::InvalidCredentials);
        }

        if let TwoFactorState::Enabled(secret) = user.two_factor() {
            let Some(code) = req.totp_token.as_deref().filter(|c| !c.trim().is_empty()) else {
                return Ok(LoginResult::Requires2fa);
            };
            if !self.totp.verify(&secret, code)? {
                tracing::info!(user_id = %user.id, "invalid 2FA code at login");
                return Err(AuthError::InvalidTwoFactorCode);
            }
        }

        self.users.record_successful_login(&user.id, now).await?;
        let tokens = self.sessions.issue(&user, now).await?;

        let mut user = user;
        user.failed_login_attempts = 0;
        user.lockout_until = None;
        user.last_login = Some(now);

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(LoginResult::Success(Box::new(SessionGrant {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
        })))
    }

    async fn record_failure(&self, user: &User, now: DateTime<Utc>) -> Result<()> {
        // A lapsed lockout starts a fresh count
        let previous = if user.lockout_until.is_some() {
            0
        } else {
            user.failed_login_attempts
        };
        let attempts = previous + 1;
        let lockout_until =
            (attempts >= self.policy.max_failed_attempts).then(|| now + self.policy.lockout_duration);

        self.users
            .record_failed_login(&user.id, attempts, lockout_until)
            .await?;

        if lockout_until.is_some() {
            tracing::warn!(user_id = %user.id, attempts, "account locked after failed logins");
        } else {
            tracing::info!(user_id = %user.id, attempts, "failed login attempt");
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    pub async fn refresh(&self, presented: &str) -> Result<TokenPair> {
        let now = Utc::now();

        let record = match self.sessions.lookup(presented, now).await? {
            RefreshLookup::Usable(record) => record,
            RefreshLookup::Revoked(record) => {
                let revoked = self.sessions.revoke_all(&record.user_id).await?;
                tracing::warn!(
                    user_id = %record.user_id,
                    revoked,
                    "revoked refresh token presented again; all sessions revoked"
                );
                return Err(AuthError::InvalidRefreshToken);
            }
            RefreshLookup::Expired | RefreshLookup::Unknown => {
                return Err(AuthError::InvalidRefreshToken)
            }
        };

        let user = match self.users.find_by_id(&record.user_id).await? {
            Some(user) if user.is_active => user,
            _ => {
                self.sessions.revoke(presented).await?;
                return Err(AuthError::InvalidRefreshToken);
            }
        };

        self.sessions.rotate(presented, &user, now).await
    }

    pub async fn logout(&self, presented: Option<&str>) -> Result<()> {
        if let Some(token) = presented {
            self.sessions.revoke(token).await?;
        }
        Ok(())
    }

    /// Bearer check for protected routes. A missing header is 401; a token
    /// that is present but bad or expired is 403; a token for a user that is
    /// gone or deactivated is 401.
    pub async fn authenticate(&self, bearer: Option<&str>) -> Result<AuthUser> {
        let token = bearer
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthorized("Access token required"))?;

        let claims = self
            .sessions
            .jwt()
            .verify_access_token(token)
            .map_err(|e| match e {
                AccessTokenError::Expired => AuthError::Forbidden("Access token expired"),
                AccessTokenError::Invalid => AuthError::Forbidden("Invalid access token"),
            })?
            .claims;

        match self.users.find_by_id(&claims.user_id).await? {
            Some(user) if user.is_active => Ok(AuthUser {
                id: user.id,
                email: user.email,
            }),
            _ => Err(AuthError::Unauthorized("Invalid or inactive user")),
        }
    }

    pub async fn current_user(&self, identity: &AuthUser) -> Result<User> {
        self.users
            .find_by_id(&identity.id)
            .await?
            .ok_or(AuthError::Unauthorized("Invalid or inactive user"))
    }

    // -------------------------------------------------------------------------
    // Two-factor enrollment
    // -------------------------------------------------------------------------

    /// Stores a new pending secret. 2FA stays off until [`Self::verify_2fa`].
    pub async fn enable_2fa(&self, identity: &AuthUser) -> Result<TotpEnrollment> {
        let user = self.current_user(identity).await?;
        if user.two_factor().is_enabled() {
            return Err(AuthError::TwoFactorAlreadyEnabled);
        }

        let enrollment = self.totp.generate_secret(&user.email)?;
        self.users
            .set_two_factor(&user.id, &TwoFactorState::Pending(enrollment.secret.clone()))
            .await?;

        tracing::info!(user_id = %user.id, "2FA enrollment started");
        Ok(enrollment)
    }

    pub async fn verify_2fa(&self, identity: &AuthUser, code: &str) -> Result<()> {
        let user = self.current_user(identity).await?;
        let secret = match user.two_factor() {
            TwoFactorState::Disabled => return Err(AuthError::NoSecret),
            TwoFactorState::Pending(secret) | TwoFactorState::Enabled(secret) => secret,
        };

        if !self.totp.verify(&secret, code)? {
            return Err(AuthError::InvalidTwoFactorSetupCode);
        }

        self.users
            .set_two_factor(&user.id, &TwoFactorState::Enabled(secret))
            .await?;

        tracing::info!(user_id = %user.id, "2FA enabled");
        Ok(())
    }

    /// No step-up challenge: a valid access token is enough.
    pub async fn disable_2fa(&self, identity: &AuthUser) -> Result<()> {
        self.users
            .set_two_factor(&identity.id, &TwoFactorState::Disabled)
            .await?;
        tracing::info!(user_id = %identity.id, "2FA disabled");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Password reset
    // -------------------------------------------------------------------------

    /// Same outcome whether or not the email exists.
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let Some(user) = self.users.find_by_email(email).await? else {
            return Ok(());
        };

        let token = random_token(ONE_TIME_TOKEN_BYTES);
        let expires_at = Utc::now() + self.policy.reset_token_ttl;
        self.users
            .set_reset_token(&user.id, &token_digest(&token), expires_at)
            .await?;

        // A delivery failure must look the same as an unknown address
        let message = self.links.password_reset(&user.email, &token);
        if let Err(e) = self.mailer.send(message).await {
            tracing::error!(user_id = %user.id, error = %e, "password reset email not sent");
        }
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        let digest = token_digest(token);
        let user = self
            .users
            .find_by_reset_token(&digest, Utc::now())
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let password_hash = self.hasher.hash(new_password).await?;
        if !self
            .users
            .complete_password_reset(&user.id, &digest, &password_hash)
            .await?
        {
            return Err(AuthError::InvalidToken);
        }

        let revoked = self.sessions.revoke_all(&user.id).await?;
        tracing::info!(user_id = %user.id, revoked, "password reset");
        Ok(())
    }
}
