use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

use invoicer_shared::errors::AppError;

/// Argon2id with a random salt. Used for passwords and one-time codes alike.
pub fn hash_secret(secret: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::internal(format!("hashing failed: {e}")))
}

pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::internal(format!("invalid stored hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn generate_verification_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

/// Password for accounts that only sign in through a provider. Nobody knows it.
pub fn unusable_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

/// Lookup key for a refresh token; the token itself is never stored.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_secret("s3cret!").unwrap();
        assert_ne!(hash, "s3cret!");
        assert!(verify_secret("s3cret!", &hash).unwrap());
        assert!(!verify_secret("wrong", &hash).unwrap());
    }

    #[test]
    fn same_secret_hashes_differently() {
        assert_ne!(hash_secret("123456").unwrap(), hash_secret("123456").unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_secret("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn verification_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn token_hash_is_stable_hex() {
        let a = hash_token("refresh");
        assert_eq!(a, hash_token("refresh"));
        assert_ne!(a, hash_token("refresh2"));
        assert_eq!(a.len(), 64);
    }
}
