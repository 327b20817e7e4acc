use crate::{config::AccountsConfig, error::AccountsError};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Validate password strength based on configuration
pub fn password_validate(password: &str, config: &AccountsConfig) -> Result<(), AccountsError> {
    let length = password.chars().count();

    if length < config.password_min_length {
        return Err(AccountsError::WeakPassword(format!(
            "This password is too short. It must contain at least {} characters.",
            config.password_min_length
        )));
    }

    if length > config.password_max_length {
        return Err(AccountsError::WeakPassword(format!(
            "This password is too long. It must not exceed {} characters.",
            config.password_max_length
        )));
    }

    if config.password_require_letter && !password.chars().any(char::is_alphabetic) {
        return Err(AccountsError::WeakPassword(
            "This password must contain at least one letter.".to_string(),
        ));
    }

    if config.password_require_number && !password.chars().any(char::is_numeric) {
        return Err(AccountsError::WeakPassword(
            "This password must contain at least one number.".to_string(),
        ));
    }

    Ok(())
}

/// Hash a password using Argon2id
pub fn password_hash(password: &str) -> Result<String, AccountsError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hashed = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AccountsError::PasswordHash(e.to_string()))?;

    Ok(hashed.to_string())
}

/// Verify a password against a hash using constant-time comparison
pub fn password_verify(password: &str, hash: &str) -> Result<bool, AccountsError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AccountsError::PasswordHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AccountsError::PasswordHash(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> AccountsConfig {
        AccountsConfig::default()
    }

    #[test]
    fn test_password_validate() {
        let config = default_config();

        // Valid passwords
        assert!(password_validate("password123", &config).is_ok());
        assert!(password_validate("p@ssW0rd1", &config).is_ok());

        // Too short
        assert!(password_validate("pass1", &config).is_err());

        // No number
        assert!(password_validate("password", &config).is_err());

        // No letter
        assert!(password_validate("12345678", &config).is_err());

        // Too long
        let long_pass = "a".repeat(129) + "1";
        assert!(password_validate(&long_pass, &config).is_err());
    }

    #[test]
    fn test_password_validate_counts_characters_not_bytes() {
        let config = default_config();
        // Seven characters, fourteen bytes.
        assert!(password_validate("ääääää1", &config).is_err());
    }

    #[test]
    fn test_password_validate_respects_relaxed_rules() {
        let config = AccountsConfig {
            password_require_number: false,
            ..Default::default()
        };
        assert!(password_validate("OnlyLettersHere", &config).is_ok());
    }

    #[test]
    fn test_password_hash_and_verify() {
        let password = "TestPassword123";
        let hash = password_hash(password).unwrap();
        assert!(hash.starts_with("$argon2id$"));

        // Correct password
        assert!(password_verify(password, &hash).unwrap());

        // Wrong password
        assert!(!password_verify("WrongPassword123", &hash).unwrap());
    }

    #[test]
    fn test_password_hash_produces_different_salts() {
        let password = "TestPassword123";
        let hash1 = password_hash(password).unwrap();
        let hash2 = password_hash(password).unwrap();

        // Hashes should be different due to different salts
        assert_ne!(hash1, hash2);

        // But both should verify correctly
        assert!(password_verify(password, &hash1).unwrap());
        assert!(password_verify(password, &hash2).unwrap());
    }

    #[test]
    fn test_password_verify_rejects_malformed_hash() {
        assert!(matches!(
            password_verify("anything1", "not-a-phc-string"),
            Err(AccountsError::PasswordHash(_))
        ));
    }
}
