//! Credential hashing and session tokens.
//!
//! Passwords are stored as argon2id PHC strings with a per-user random salt.
//! Session tokens are opaque random strings handed back to the client; the
//! backend does not validate them on later calls.

use anyhow::{anyhow, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Hash a password into a self-describing PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string. Unparseable hashes never match.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}

/// A fresh opaque session token.
pub fn new_session_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("pw").unwrap();
        let b = hash_password("pw").unwrap();
        assert_ne!(a, b);
        let salt_a = PasswordHash::new(&a).unwrap().salt.unwrap().to_string();
        let salt_b = PasswordHash::new(&b).unwrap().salt.unwrap().to_string();
        assert_ne!(salt_a, salt_b);
        assert!(salt_a.len() >= 22);
    }

    #[test]
    fn plaintext_in_storage_never_matches() {
        assert!(!verify_password("secret", "secret"));
    }

    #[test]
    fn tokens_are_unique() {
        let a = new_session_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, new_session_token());
    }
}
