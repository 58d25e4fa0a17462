//! Password hashing and verification using Argon2id
//!
//! Hashes are PHC strings, so algorithm, parameters and the random salt
//! travel with the stored value and verification needs no extra state.

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Argon2, Params,
};
use thiserror::Error;

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),
}

/// Argon2 cost parameters
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub memory_cost: u32,
    /// Iterations (default: 3)
    pub time_cost: u32,
    /// Lanes (default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    /// Cheap parameters for tests and local tooling
    pub fn testing() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
            output_len: Some(32),
        }
    }

    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))
    }
}

/// One-way credential hasher
///
/// Cloning is cheap; the service layer moves clones onto blocking threads.
#[derive(Debug, Clone, Default)]
pub struct CredentialHasher {
    config: PasswordConfig,
}

impl CredentialHasher {
    pub fn new(config: PasswordConfig) -> Self {
        Self { config }
    }

    /// Hash a plaintext password with a fresh random salt.
    ///
    /// Hashing the same input twice yields different strings.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let params = self.config.to_params()?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        Ok(password_hash.to_string())
    }

    /// Check a plaintext password against a stored PHC hash.
    ///
    /// Mismatches and malformed hashes both return `false`.
    pub fn verify(&self, hash: &str, password: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        CredentialHasher::new(PasswordConfig::testing())
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("secret1").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify(&hash, "secret1"));
        assert!(!hasher.verify(&hash, "secret2"));
        assert!(!hasher.verify(&hash, ""));
    }

    #[test]
    fn test_same_password_different_hashes() {
        let hasher = hasher();
        let hash1 = hasher.hash("secret1").unwrap();
        let hash2 = hasher.hash("secret1").unwrap();

        assert_ne!(hash1, hash2);
        assert!(hasher.verify(&hash1, "secret1"));
        assert!(hasher.verify(&hash2, "secret1"));
    }

    #[test]
    fn test_malformed_hash_is_false() {
        let hasher = hasher();
        assert!(!hasher.verify("not-a-phc-string", "secret1"));
        assert!(!hasher.verify("", "secret1"));
    }

    #[test]
    fn test_default_params_embedded_in_hash() {
        let hash = CredentialHasher::default().hash("secret1").unwrap();
        assert!(hash.contains("m=65536,t=3,p=4"));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let hasher = CredentialHasher::new(PasswordConfig {
            memory_cost: 1,
            time_cost: 0,
            parallelism: 1,
            output_len: Some(32),
        });
        assert!(matches!(
            hasher.hash("secret1"),
            Err(PasswordError::InvalidParams(_))
        ));
    }
}
