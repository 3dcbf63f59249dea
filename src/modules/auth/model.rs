use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub is_email_verified: bool,
    /// SHA-256 digest of the pending verification token.
    pub email_verify_token: Option<String>,
    /// SHA-256 digest of the pending reset token.
    pub reset_token: Option<String>,
    pub reset_token_expiry: Option<DateTime<Utc>>,
    pub failed_login_attempts: i32,
    pub lockout_until: Option<DateTime<Utc>>,
    pub two_factor_enabled: bool,
    pub two_factor_secret: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Login-relevant state, derived from the stored flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Unverified,
    Active,
    Locked,
    Disabled,
}

/// Second-factor state. `Pending` is a stored secret the user has not yet
/// confirmed with a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TwoFactorState {
    Disabled,
    Pending(String),
    Enabled(String),
}

impl TwoFactorState {
    pub fn secret(&self) -> Option<&str> {
        match self {
            TwoFactorState::Disabled => None,
            TwoFactorState::Pending(s) | TwoFactorState::Enabled(s) => Some(s),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, TwoFactorState::Enabled(_))
    }
}

impl User {
    /// A lockout whose deadline has passed no longer counts; it is cleared
    /// lazily by the next login attempt.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lockout_until.is_some_and(|until| until > now)
    }

    pub fn status(&self, now: DateTime<Utc>) -> AccountStatus {
        if !self.is_active {
            AccountStatus::Disabled
        } else if !self.is_email_verified {
            AccountStatus::Unverified
        } else if self.is_locked(now) {
            AccountStatus::Locked
        } else {
            AccountStatus::Active
        }
    }

    pub fn two_factor(&self) -> TwoFactorState {
        match (&self.two_factor_secret, self.two_factor_enabled) {
            (Some(secret), true) => TwoFactorState::Enabled(secret.clone()),
            (Some(secret), false) => TwoFactorState::Pending(secret.clone()),
            // enabled without a secret breaks the storage invariant; treat as off
            (None, _) => TwoFactorState::Disabled,
        }
    }

    pub fn reset_token_valid(&self, digest: &str, now: DateTime<Utc>) -> bool {
        self.reset_token.as_deref() == Some(digest)
            && self.reset_token_expiry.is_some_and(|expiry| expiry > now)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Usable until the first of expiry or revocation.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}
