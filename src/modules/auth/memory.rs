//! In-process repositories.
//!
//! Same contracts as the MySQL ones, including the uniqueness and
//! compare-and-set guarantees, with each operation applied under one lock.
//! State lives for the lifetime of the value.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::interface::{AuthError, RefreshTokenRepository, Result, UserRepository};
use super::model::{RefreshToken, TwoFactorState, User};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `f` to the stored user. Returns false if the id is unknown.
    pub async fn update<F>(&self, user_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut User),
    {
        match self.users.write().await.get_mut(user_id) {
            Some(user) => {
                f(user);
                user.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserRepository for MemoryUserStore {
    async fn create(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.email == user.email || u.username == user.username)
        {
            return Err(AuthError::UserExists);
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn exists_by_email_or_username(&self, email: &str, username: &str) -> Result<bool> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .any(|u| u.email == email || u.username == username))
    }

    async fn verify_email(&self, token_digest: &str) -> Result<bool> {
        let mut users = self.users.write().await;
        match users
            .values_mut()
            .find(|u| u.email_verify_token.as_deref() == Some(token_digest))
        {
            Some(user) => {
                user.is_email_verified = true;
                user.email_verify_token = None;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_failed_login(
        &self,
        user_id: &str,
        attempts: i32,
        lockout_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.update(user_id, |u| {
            u.failed_login_attempts = attempts;
            u.lockout_until = lockout_until;
        })
        .await;
        Ok(())
    }

    async fn record_successful_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.update(user_id, |u| {
            u.failed_login_attempts = 0;
            u.lockout_until = None;
            u.last_login = Some(at);
        })
        .await;
        Ok(())
    }

    async fn set_reset_token(&self, user_id: &str, token_digest: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.update(user_id, |u| {
            u.reset_token = Some(token_digest.to_string());
            u.reset_token_expiry = Some(expires_at);
        })
        .await;
        Ok(())
    }

    async fn find_by_reset_token(&self, token_digest: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.reset_token_valid(token_digest, now))
            .cloned())
    }

    async fn complete_password_reset(&self, user_id: &str, token_digest: &str, password_hash: &str) -> Result<bool> {
        let mut users = self.users.write().await;
        match users.get_mut(user_id) {
            Some(user) if user.reset_token.as_deref() == Some(token_digest) => {
                user.password_hash = password_hash.to_string();
                user.reset_token = None;
                user.reset_token_expiry = None;
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_two_factor(&self, user_id: &str, state: &TwoFactorState) -> Result<()> {
        self.update(user_id, |u| {
            u.two_factor_enabled = state.is_enabled();
            u.two_factor_secret = state.secret().map(str::to_string);
        })
        .await;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    tokens: RwLock<HashMap<String, RefreshToken>>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn active_for_user(&self, user_id: &str, now: DateTime<Utc>) -> usize {
        self.tokens
            .read()
            .await
            .values()
            .filter(|t| t.user_id == user_id && t.is_usable(now))
            .count()
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryRefreshTokenStore {
    async fn create(&self, token: &RefreshToken) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(&token.token_hash) {
            return Err(AuthError::Internal("duplicate refresh token".into()));
        }
        tokens.insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        Ok(self.tokens.read().await.get(token_hash).cloned())
    }

    async fn revoke(&self, token_hash: &str) -> Result<()> {
        if let Some(token) = self.tokens.write().await.get_mut(token_hash) {
            token.revoked = true;
        }
        Ok(())
    }

    async fn rotate(&self, old_hash: &str, new_token: &RefreshToken, now: DateTime<Utc>) -> Result<bool> {
        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(old_hash) {
            Some(old) if old.is_usable(now) => old.revoked = true,
            _ => return Ok(false),
        }
        tokens.insert(new_token.token_hash.clone(), new_token.clone());
        Ok(true)
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64> {
        let mut count = 0;
        for token in self.tokens.write().await.values_mut() {
            if token.user_id == user_id && !token.revoked {
                token.revoked = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| t.expires_at > now);
        Ok((before - tokens.len()) as u64)
    }
}
