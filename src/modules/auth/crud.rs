use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::DbPool;
use crate::modules::auth::interface::{AuthError, RefreshTokenRepository, Result, UserRepository};
use crate::modules::auth::model::{RefreshToken, TwoFactorState, User};

const USER_COLUMNS: &str = "id, email, username, password_hash, first_name, last_name, is_active, \
    is_email_verified, email_verify_token, reset_token, reset_token_expiry, failed_login_attempts, \
    lockout_until, two_factor_enabled, two_factor_secret, last_login, created_at, updated_at";

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

pub struct UserCrud {
    pool: DbPool,
}

impl UserCrud {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, filter: &str, value: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, filter);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl UserRepository for UserCrud {
    async fn create(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, username, password_hash, first_name, last_name, is_active,
                is_email_verified, email_verify_token, failed_login_attempts, two_factor_enabled,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_active)
        .bind(user.is_email_verified)
        .bind(&user.email_verify_token)
        .bind(user.failed_login_attempts)
        .bind(user.two_factor_enabled)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            // The unique indexes are the real guard; the pre-check can race
            Err(e) if is_unique_violation(&e) => Err(AuthError::UserExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        self.find_one("id", id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_one("email", email).await
    }

    async fn exists_by_email_or_username(&self, email: &str, username: &str) -> Result<bool> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ? OR username = ?")
            .bind(email)
            .bind(username)
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0 > 0)
    }

    async fn verify_email(&self, token_digest: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET is_email_verified = TRUE, email_verify_token = NULL WHERE email_verify_token = ?",
        )
        .bind(token_digest)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_failed_login(
        &self,
        user_id: &str,
        attempts: i32,
        lockout_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query("UPDATE users SET failed_login_attempts = ?, lockout_until = ? WHERE id = ?")
            .bind(attempts)
            .bind(lockout_until)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_successful_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE users SET failed_login_attempts = 0, lockout_until = NULL, last_login = ? WHERE id = ?",
        )
        .bind(at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_reset_token(&self, user_id: &str, token_digest: &str, expires_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET reset_token = ?, reset_token_expiry = ? WHERE id = ?")
            .bind(token_digest)
            .bind(expires_at)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_reset_token(&self, token_digest: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE reset_token = ? AND reset_token_expiry > ?",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(token_digest)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn complete_password_reset(&self, user_id: &str, token_digest: &str, password_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, reset_token = NULL, reset_token_expiry = NULL
            WHERE id = ? AND reset_token = ?
            "#,
        )
        .bind(password_hash)
        .bind(user_id)
        .bind(token_digest)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_two_factor(&self, user_id: &str, state: &TwoFactorState) -> Result<()> {
        sqlx::query("UPDATE users SET two_factor_enabled = ?, two_factor_secret = ? WHERE id = ?")
            .bind(state.is_enabled())
            .bind(state.secret())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct RefreshTokenCrud {
    pool: DbPool,
}

impl RefreshTokenCrud {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const INSERT_REFRESH_TOKEN: &str = r#"
    INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, revoked, created_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

#[async_trait]
impl RefreshTokenRepository for RefreshTokenCrud {
    async fn create(&self, token: &RefreshToken) -> Result<()> {
        sqlx::query(INSERT_REFRESH_TOKEN)
            .bind(&token.id)
            .bind(&token.user_id)
            .bind(&token.token_hash)
            .bind(token.expires_at)
            .bind(token.revoked)
            .bind(token.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        let token = sqlx::query_as::<_, RefreshToken>(
            "SELECT id, user_id, token_hash, expires_at, revoked, created_at FROM refresh_tokens WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    async fn revoke(&self, token_hash: &str) -> Result<()> {
        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rotate(&self, old_hash: &str, new_token: &RefreshToken, now: DateTime<Utc>) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // Conditional revoke: of two concurrent refreshes only one sees a row
        let revoked = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE token_hash = ? AND revoked = FALSE AND expires_at > ?",
        )
        .bind(old_hash)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if revoked.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(INSERT_REFRESH_TOKEN)
            .bind(&new_token.id)
            .bind(&new_token.user_id)
            .bind(&new_token.token_hash)
            .bind(new_token.expires_at)
            .bind(new_token.revoked)
            .bind(new_token.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64> {
        let result = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = ? AND revoked = FALSE")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
