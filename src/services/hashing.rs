use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Argon2id work factor.
///
/// Stored hashes carry their own parameters, so raising the cost only affects
/// newly hashed passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordCost {
    // m=19MiB, t=2, p=1: roughly the wall time of bcrypt at 12 rounds
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl PasswordCost {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>, argon2::Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HashingError {
    #[error("invalid argon2 parameters: {0}")]
    Params(#[from] argon2::Error),
    #[error("password hashing failed: {0}")]
    Hash(#[from] argon2::password_hash::Error),
}

pub fn hash_password(password: &str, cost: &PasswordCost) -> Result<String, HashingError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = cost.argon2()?.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, HashingError> {
    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Async front for the hashing functions. The work runs on the blocking pool
/// so a slow hash never stalls other requests.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: PasswordCost,
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(cost: PasswordCost) -> Result<Self, HashingError> {
        let dummy_hash = hash_password("smartbudget-timing-equalizer", &cost)?;
        Ok(Self { cost, dummy_hash })
    }

    pub async fn hash(&self, password: &str) -> Result<String, HashingError> {
        let password = password.to_owned();
        let cost = self.cost;
        run_blocking(move || hash_password(&password, &cost)).await
    }

    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, HashingError> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        run_blocking(move || verify_password(&password, &hash)).await
    }

    /// Burns one verification against a throwaway hash. Used when the account
    /// does not exist so both login paths cost about the same.
    pub async fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash.clone()).await;
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, HashingError>
where
    F: FnOnce() -> Result<T, HashingError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "password hashing task failed");
            Err(HashingError::Hash(argon2::password_hash::Error::Crypto))
        }
    }
}
