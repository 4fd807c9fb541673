//! Password and reset-token hashing.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine as _, engine::general_purpose};
use rand::prelude::RngExt;
use rand::rng;

use crate::{config::PasswordConfig, errors::Error};

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None).map_err(|e| Error::Internal {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl From<&PasswordConfig> for Argon2Params {
    fn from(config: &PasswordConfig) -> Self {
        Self {
            memory_kib: config.argon2_memory_kib,
            iterations: config.argon2_iterations,
            parallelism: config.argon2_parallelism,
        }
    }
}

/// Hash a password or token with Argon2id, falling back to the default cost when `params` is None.
pub fn hash_string_with_params(input: &str, params: Option<Argon2Params>) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = params.unwrap_or_default().to_argon2()?;

    let hash = argon2.hash_password(input.as_bytes(), &salt).map_err(|e| Error::Internal {
        operation: format!("hash string: {e}"),
    })?;

    Ok(hash.to_string())
}

pub fn hash_string(input: &str) -> Result<String, Error> {
    hash_string_with_params(input, None)
}

/// Verify `input` against a PHC-format hash. Cost parameters are read from the hash itself.
pub fn verify_string(input: &str, hash: &str) -> Result<bool, Error> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| Error::Internal {
        operation: format!("parse hash: {e}"),
    })?;

    Ok(Argon2::default().verify_password(input.as_bytes(), &parsed_hash).is_ok())
}

/// Check a candidate password against the configured length bounds.
pub fn validate_password(password: &str, config: &PasswordConfig) -> Result<(), Error> {
    let length = password.chars().count();
    if length < config.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters long", config.min_length),
        });
    }
    if length > config.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be no more than {} characters long", config.max_length),
        });
    }
    Ok(())
}

/// 32 random bytes, base64url without padding (43 chars). Used for password reset links.
pub fn generate_reset_token() -> String {
    let mut token_bytes = [0u8; 32];
    rng().fill(&mut token_bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_params() -> Option<Argon2Params> {
        Some(Argon2Params {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
    }

    #[test]
    fn hash_verifies_only_the_original_input() {
        let hash = hash_string_with_params("correct horse battery", cheap_params()).unwrap();
        assert!(verify_string("correct horse battery", &hash).unwrap());
        assert!(!verify_string("wrong horse battery", &hash).unwrap());
    }

    #[test]
    fn same_input_hashes_differently_per_salt() {
        let first = hash_string_with_params("same_password", cheap_params()).unwrap();
        let second = hash_string_with_params("same_password", cheap_params()).unwrap();
        assert_ne!(first, second);
        assert!(verify_string("same_password", &first).unwrap());
        assert!(verify_string("same_password", &second).unwrap());
    }

    #[test]
    fn default_params_produce_argon2id_hashes() {
        let hash = hash_string("default-cost").unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn garbage_hash_is_an_internal_error() {
        assert!(matches!(verify_string("anything", "not-a-phc-string"), Err(Error::Internal { .. })));
    }

    #[test]
    fn password_length_bounds_are_enforced() {
        let config = PasswordConfig::default();
        assert!(validate_password("short", &config).is_err());
        assert!(validate_password(&"x".repeat(config.max_length + 1), &config).is_err());
        assert!(validate_password("long-enough-password", &config).is_ok());
    }

    #[test]
    fn reset_tokens_are_unique_base64url() {
        let first = generate_reset_token();
        let second = generate_reset_token();
        assert_ne!(first, second);
        assert_eq!(first.len(), 43);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
