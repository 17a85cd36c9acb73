//! Password hashing and verification with Argon2

use std::sync::OnceLock;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Hashing failed before a hash could be produced.
///
/// Only raised when salt generation or the Argon2 computation itself fails;
/// it is never a statement about the password.
#[derive(Debug, Error)]
#[error("Failed to hash password: {0}")]
pub struct HashError(String);

/// Hash a plaintext password into a PHC-encoded Argon2id string
pub fn hash_password(password: &SecretString) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HashError(e.to_string()))
}

/// Verify a plaintext password against an encoded hash.
///
/// A malformed hash and a wrong password both yield `false`.
pub fn verify_password(password: &SecretString, encoded_hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(encoded_hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.expose_secret().as_bytes(), &parsed_hash)
        .is_ok()
}

/// Burn one verification against a fixed hash.
///
/// Used when no stored hash exists so that an unknown account costs the same
/// as a wrong password.
pub fn verify_dummy(password: &SecretString) {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

    let dummy = DUMMY_HASH.get_or_init(|| {
        hash_password(&SecretString::from("dummy-password-for-timing".to_string())).ok()
    });

    if let Some(hash) = dummy {
        let _ = verify_password(password, hash);
    }
}
