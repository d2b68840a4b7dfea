//! Password hashing
//!
//! Argon2id with the crate defaults and a random salt per hash. Hashes are
//! stored in PHC string format, so parameters travel with the hash.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Shortest password accepted at registration and on change
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("Password hashing failed")
}

/// Check a password against a stored PHC hash.
///
/// A mismatch is `Ok(false)`. A malformed hash is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("Invalid password hash format")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e)),
    }
}

/// Length rule for new passwords, counted in characters
pub fn is_acceptable(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}
