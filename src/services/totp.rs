//! Time-based one-time passwords for the second login factor.
//!
//! Google Authenticator compatible: SHA-1, 6 digits, 30 second step. One step
//! of clock skew is tolerated in either direction.

use totp_rs::{Algorithm, Secret, TOTP};

const TOTP_DIGITS: usize = 6;
const TOTP_STEP: u64 = 30;
const TOTP_SKEW: u8 = 1;
pub const TOTP_ISSUER: &str = "SmartBudget";

#[derive(Debug, thiserror::Error)]
pub enum TotpError {
    #[error("invalid TOTP secret")]
    InvalidSecret,
    #[error("failed to build TOTP: {0}")]
    Build(String),
    #[error("failed to render QR code: {0}")]
    Qr(String),
    #[error("system clock error")]
    Clock,
}

/// Material handed to the user during enrollment.
#[derive(Debug, Clone)]
pub struct TotpEnrollment {
    /// Base32 secret for manual entry.
    pub secret: String,
    pub otpauth_url: String,
    /// PNG QR code as a `data:` URL.
    pub qr_code: String,
}

#[derive(Debug, Clone)]
pub struct TotpService {
    issuer: String,
    skew: u8,
}

impl Default for TotpService {
    fn default() -> Self {
        Self::new(TOTP_ISSUER)
    }
}

impl TotpService {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            skew: TOTP_SKEW,
        }
    }

    pub fn generate_secret(&self, label: &str) -> Result<TotpEnrollment, TotpError> {
        let secret = Secret::generate_secret().to_encoded().to_string();
        let totp = self.build(&secret, label)?;
        let qr = totp.get_qr_base64().map_err(TotpError::Qr)?;

        Ok(TotpEnrollment {
            otpauth_url: totp.get_url(),
            qr_code: format!("data:image/png;base64,{}", qr),
            secret,
        })
    }

    /// Checks `code` against the current window. Malformed codes are simply
    /// not valid; only a broken secret or clock is an error.
    pub fn verify(&self, secret: &str, code: &str) -> Result<bool, TotpError> {
        let code = code.trim();
        if code.len() != TOTP_DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }
        let totp = self.build(secret, "verify")?;
        totp.check_current(code).map_err(|_| TotpError::Clock)
    }

    /// Current code for a secret. Used by clients and tests that need to act
    /// as the authenticator app.
    pub fn current_code(&self, secret: &str) -> Result<String, TotpError> {
        self.build(secret, "current")?
            .generate_current()
            .map_err(|_| TotpError::Clock)
    }

    fn build(&self, secret: &str, label: &str) -> Result<TOTP, TotpError> {
        let bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|_| TotpError::InvalidSecret)?;

        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            self.skew,
            TOTP_STEP,
            bytes,
            Some(self.issuer.clone()),
            label.to_string(),
        )
        .map_err(|e| TotpError::Build(e.to_string()))
    }
}
