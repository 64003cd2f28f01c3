//! Password hashing and verification with Argon2id.

use std::sync::LazyLock;

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::SaltString,
};
use rand_core::OsRng;
use tracing::warn;

use crate::CoreResult;

/// Verified against when the username is unknown, so both failure paths pay
/// for one Argon2 run.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("catbase-timing-equalizer").unwrap_or_default());

/// Hash a password into a PHC string (salt and cost parameters embedded).
pub fn hash_password(password: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("argon2 hash: {e}"))?
        .to_string();
    Ok(hash)
}

/// `true` iff `candidate` matches `stored_hash`. A mismatch is an ordinary
/// `false`; so is a stored hash that cannot be parsed.
pub fn verify_password(stored_hash: &str, candidate: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Stored password hash is not a valid PHC string: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}

/// Burn roughly the same time as a real verification.
pub(crate) fn verify_dummy(candidate: &str) {
    let _ = verify_password(&DUMMY_HASH, candidate);
}
