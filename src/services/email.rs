//! Outgoing account emails.
//!
//! Delivery is behind the [`Mailer`] trait. The bundled [`LogMailer`] writes
//! the message to the log, which is what development and tests run with.

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Verification,
    PasswordReset,
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub kind: EmailKind,
    pub to: String,
    pub subject: &'static str,
    pub link: String,
}

#[derive(Debug, thiserror::Error)]
#[error("email delivery failed: {0}")]
pub struct MailError(pub String);

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// Base URLs used to build the links inside emails.
#[derive(Debug, Clone)]
pub struct EmailLinks {
    pub api_url: String,
    pub frontend_url: String,
}

impl Default for EmailLinks {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
        }
    }
}

impl EmailLinks {
    pub fn verification(&self, to: &str, token: &str) -> EmailMessage {
        EmailMessage {
            kind: EmailKind::Verification,
            to: to.to_string(),
            subject: "Verify your account",
            link: format!(
                "{}/auth/verify-email?token={}",
                self.api_url.trim_end_matches('/'),
                token
            ),
        }
    }

    pub fn password_reset(&self, to: &str, token: &str) -> EmailMessage {
        EmailMessage {
            kind: EmailKind::PasswordReset,
            to: to.to_string(),
            subject: "Reset your password",
            link: format!(
                "{}/reset-password?token={}",
                self.frontend_url.trim_end_matches('/'),
                token
            ),
        }
    }
}

/// Mailer that only logs. The link is logged at debug level so it stays out
/// of production logs running at info.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        tracing::info!(kind = ?message.kind, subject = message.subject, "email queued");
        tracing::debug!(to = %message.to, link = %message.link, "email link");
        Ok(())
    }
}
