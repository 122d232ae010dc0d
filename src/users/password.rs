//! Argon2 password hashing.

use argon2::Argon2;
use argon2::password_hash::{PasswordHasher, SaltString};
use rand::Rng;

use crate::users::error::{UserError, UserResult};

const SALT_LEN: usize = 16;

/// Hash a password into a PHC string with a random salt.
///
/// # Errors
/// Returns an error if the salt or hash cannot be produced.
pub fn hash_password(password: &str) -> UserResult<String> {
    let mut bytes = [0_u8; SALT_LEN];
    rand::thread_rng().fill(&mut bytes);
    let salt =
        SaltString::encode_b64(&bytes).map_err(|err| UserError::PasswordHash(err.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| UserError::PasswordHash(err.to_string()))
}

/// Check a password against a stored PHC string.
///
/// # Errors
/// Returns an error if the stored hash cannot be parsed.
#[cfg(test)]
pub fn verify_password(password: &str, phc: &str) -> UserResult<bool> {
    use argon2::password_hash::{PasswordHash, PasswordVerifier};

    let parsed = PasswordHash::new(phc).map_err(|err| UserError::PasswordHash(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let phc = hash_password("correct horse").unwrap();
        assert!(phc.starts_with("$argon2id$"));
        assert!(!phc.contains("correct horse"));
        assert!(verify_password("correct horse", &phc).unwrap());
        assert!(!verify_password("wrong", &phc).unwrap());
    }

    #[test]
    fn test_salts_are_random() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_garbage_hash_rejected() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }
}
