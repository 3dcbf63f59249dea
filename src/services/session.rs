//! Access/refresh token issuance and rotation.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::modules::auth::interface::{AuthError, RefreshTokenRepository, Result, TokenPair};
use crate::modules::auth::model::{RefreshToken, User};
use crate::services::jwt::JwtService;
use crate::services::tokens::{random_token, token_digest, REFRESH_TOKEN_BYTES};

pub const REFRESH_TOKEN_DAYS: i64 = 7;

/// Outcome of looking up a presented refresh token.
#[derive(Debug)]
pub enum RefreshLookup {
    Usable(RefreshToken),
    /// Already revoked: someone is replaying a rotated or logged-out token.
    Revoked(RefreshToken),
    Expired,
    Unknown,
}

#[derive(Clone)]
pub struct SessionIssuer {
    jwt: JwtService,
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
    refresh_ttl: Duration,
}

impl SessionIssuer {
    pub fn new(jwt: JwtService, refresh_tokens: Arc<dyn RefreshTokenRepository>) -> Self {
        Self {
            jwt,
            refresh_tokens,
            refresh_ttl: Duration::days(REFRESH_TOKEN_DAYS),
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Fresh access + refresh pair for a user that just authenticated.
    pub async fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<TokenPair> {
        let (refresh_token, record) = self.new_refresh_token(&user.id, now);
        self.refresh_tokens.create(&record).await?;
        self.pair(user, refresh_token)
    }

    pub async fn lookup(&self, presented: &str, now: DateTime<Utc>) -> Result<RefreshLookup> {
        let record = self
            .refresh_tokens
            .find_by_token_hash(&token_digest(presented))
            .await?;

        Ok(match record {
            None => RefreshLookup::Unknown,
            Some(t) if t.revoked => RefreshLookup::Revoked(t),
            Some(t) if t.expires_at <= now => RefreshLookup::Expired,
            Some(t) => RefreshLookup::Usable(t),
        })
    }

    /// Revokes `presented` and issues a replacement in one unit. Losing the
    /// race to a concurrent rotation counts as an invalid token.
    pub async fn rotate(&self, presented: &str, user: &User, now: DateTime<Utc>) -> Result<TokenPair> {
        let (refresh_token, record) = self.new_refresh_token(&user.id, now);

        if !self
            .refresh_tokens
            .rotate(&token_digest(presented), &record, now)
            .await?
        {
            return Err(AuthError::InvalidRefreshToken);
        }

        self.pair(user, refresh_token)
    }

    pub async fn revoke(&self, presented: &str) -> Result<()> {
        self.refresh_tokens.revoke(&token_digest(presented)).await
    }

    pub async fn revoke_all(&self, user_id: &str) -> Result<u64> {
        self.refresh_tokens.revoke_all_for_user(user_id).await
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        self.refresh_tokens.delete_expired(now).await
    }

    fn new_refresh_token(&self, user_id: &str, now: DateTime<Utc>) -> (String, RefreshToken) {
        let token = random_token(REFRESH_TOKEN_BYTES);
        let record = RefreshToken {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            token_hash: token_digest(&token),
            expires_at: now + self.refresh_ttl,
            revoked: false,
            created_at: now,
        };
        (token, record)
    }

    fn pair(&self, user: &User, refresh_token: String) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.jwt.create_access_token(&user.id, &user.email)?,
            refresh_token,
            expires_in: self.jwt.access_token_duration_secs(),
        })
    }
}
