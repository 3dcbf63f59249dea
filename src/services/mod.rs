pub mod email;
pub mod hashing;
pub mod jwt;
pub mod rate_limit;
pub mod security;
pub mod session;
pub mod tokens;
pub mod totp;
pub mod validation;
