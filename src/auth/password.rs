use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier as _, Version,
};

use crate::config::AuthConfig;
use crate::error::AppError;

/// Argon2id hasher producing PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`).
///
/// Cloning is cheap; hashing and verification are CPU-bound and should be
/// run off the async executor.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    // Verified against when the email is unknown so both login failures
    // cost the same.
    dummy_hash: String,
}

impl PasswordHasher {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, AppError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AppError::HashingError(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut hasher = Self {
            argon2,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash("career-compass-timing-equaliser")?;
        Ok(hasher)
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AppError> {
        Self::new(
            config.hash_memory_kib,
            config.hash_iterations,
            config.hash_parallelism,
        )
    }

    /// Hashes `plaintext` under a fresh random salt.
    pub fn hash(&self, plaintext: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| AppError::HashingError(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Returns `false` on mismatch and on any hash string that does not
    /// parse. The comparison inside argon2 is constant time.
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Burns one verification against a fixed hash and always fails.
    pub fn verify_dummy(&self, plaintext: &str) -> bool {
        let _ = self.verify(plaintext, &self.dummy_hash);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_then_verify() {
        let hasher = hasher();
        let hash = hasher.hash("secret1").unwrap();

        assert!(hasher.verify("secret1", &hash));
        assert!(!hasher.verify("secret2", &hash));
        assert!(!hasher.verify("", &hash));
    }

    #[test]
    fn test_hash_is_not_plaintext_and_is_salted() {
        let hasher = hasher();
        let a = hasher.hash("secret1").unwrap();
        let b = hasher.hash("secret1").unwrap();

        assert_ne!(a, "secret1");
        assert!(!a.contains("secret1"));
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_false_not_error() {
        let hasher = hasher();
        assert!(!hasher.verify("secret1", ""));
        assert!(!hasher.verify("secret1", "not-a-phc-string"));
        assert!(!hasher.verify("secret1", "$2b$10$abcdefghijklmnopqrstuv"));
    }

    #[test]
    fn test_verify_dummy_always_fails() {
        let hasher = hasher();
        assert!(!hasher.verify_dummy("career-compass-timing-equaliser"));
    }

    #[test]
    fn test_invalid_work_factor_is_hashing_error() {
        let result = PasswordHasher::new(1, 0, 1);
        assert!(matches!(result, Err(AppError::HashingError(_))));
    }
}
