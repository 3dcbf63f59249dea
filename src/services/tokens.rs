use rand::RngCore;
use sha2::{Digest, Sha256};

/// Entropy of email verification and password reset tokens.
pub const ONE_TIME_TOKEN_BYTES: usize = 32;
/// Entropy of refresh tokens.
pub const REFRESH_TOKEN_BYTES: usize = 40;

/// Hex-encoded random token of `len` bytes from the thread-local CSPRNG.
pub fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digest stored in place of a bearer secret. Tokens already carry 256+ bits
/// of entropy, so an unsalted SHA-256 is enough to make a leaked table useless.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
