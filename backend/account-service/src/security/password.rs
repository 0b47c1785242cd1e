/// Password hashing and verification using Argon2id
use crate::error::{AccountError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use zxcvbn::zxcvbn;

/// Hash a password using Argon2id algorithm
///
/// ## Security
///
/// - Algorithm: Argon2id (default configuration)
/// - Salt: Random 16-byte salt generated per password
/// - Password strength: Enforces composition rules and zxcvbn score >= 3
///
/// ## Errors
///
/// - `AccountError::Validation` on the `password` field if the password is weak
/// - `AccountError::Internal` if hashing fails
pub fn hash_password(password: &str) -> Result<String> {
    validate_password_strength(password)?;

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AccountError::Internal(format!("Password hashing failed: {}", e)))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against its PHC-formatted hash in constant time
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| AccountError::Internal(format!("Invalid password hash format: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AccountError::Internal(format!(
            "Password verification failed: {}",
            e
        ))),
    }
}

/// Password and its confirmation must be identical
pub fn ensure_passwords_match(password: &str, confirm: &str) -> Result<()> {
    if password != confirm {
        return Err(AccountError::BadRequest("Passwords do not match".to_string()));
    }
    Ok(())
}

fn weak(message: &str) -> AccountError {
    AccountError::validation("password", message)
}

fn validate_password_strength(password: &str) -> Result<()> {
    if password.chars().count() < 8 {
        return Err(weak("must be at least 8 characters"));
    }

    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if !has_uppercase {
        return Err(weak("must contain at least one uppercase letter"));
    }
    if !has_lowercase {
        return Err(weak("must contain at least one lowercase letter"));
    }
    if !has_digit {
        return Err(weak("must contain at least one digit"));
    }
    if !has_special {
        return Err(weak("must contain at least one special character"));
    }

    let entropy = zxcvbn(password, &[]).map_err(|e| {
        AccountError::Internal(format!("Password entropy calculation failed: {}", e))
    })?;

    if entropy.score() < 3 {
        return Err(weak("is too easy to guess, please choose a stronger password"));
    }

    Ok(())
}
