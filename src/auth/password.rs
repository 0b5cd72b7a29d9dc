use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

pub const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    // Verified when a login names no account, so that path costs one Argon2 run as well.
    static ref DUMMY_HASH: Option<String> = hash_password("accountd-dummy-credential").ok();
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Full Argon2 verification against a throwaway hash. The outcome is discarded.
pub fn verify_against_dummy(plain: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(plain, hash);
    }
}

/// Strength rule: minimum length, at least one letter and one digit.
/// Returns every failed requirement as a message.
pub fn password_problems(plain: &str) -> Vec<String> {
    let mut problems = Vec::new();
    if plain.chars().count() < MIN_PASSWORD_LEN {
        problems.push(format!(
            "Ensure this field has at least {MIN_PASSWORD_LEN} characters."
        ));
    }
    if !plain.chars().any(|c| c.is_ascii_alphabetic()) {
        problems.push("Password must contain at least one letter".into());
    }
    if !plain.chars().any(|c| c.is_ascii_digit()) {
        problems.push("Password must contain at least one number".into());
    }
    problems
}
