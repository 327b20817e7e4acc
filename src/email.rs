//! Email and username validation and normalization.

use crate::{config::AccountsConfig, error::AccountsError};
use email_address::EmailAddress;
use std::str::FromStr;

/// Validate and normalize an email address.
///
/// - Trims whitespace
/// - Validates RFC 5322 compliance
/// - Lowercases the address for consistent lookups
pub fn email_normalize(email: &str) -> Result<String, AccountsError> {
    let trimmed = email.trim();

    let parsed = EmailAddress::from_str(trimmed).map_err(|_| AccountsError::InvalidEmail)?;

    // Only the domain is case-insensitive per RFC, but providers treat the
    // local part the same way.
    Ok(parsed.as_str().to_lowercase())
}

/// Validate a username and return it trimmed.
///
/// Usernames keep the case they were registered with; uniqueness and lookups
/// are case-insensitive at the backend.
pub fn username_normalize(username: &str, config: &AccountsConfig) -> Result<String, AccountsError> {
    let trimmed = username.trim();

    if trimmed.chars().count() > config.username_max_length {
        return Err(AccountsError::InvalidUsername(format!(
            "Ensure this value has at most {} characters.",
            config.username_max_length
        )));
    }

    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
    if trimmed.is_empty() || !trimmed.chars().all(allowed) {
        return Err(AccountsError::InvalidUsername(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        let result = email_normalize("user@example.com");
        assert_eq!(result.unwrap(), "user@example.com");
    }

    #[test]
    fn test_normalizes_case() {
        let result = email_normalize("User@Example.COM");
        assert_eq!(result.unwrap(), "user@example.com");
    }

    #[test]
    fn test_trims_whitespace() {
        let result = email_normalize("  user@example.com  ");
        assert_eq!(result.unwrap(), "user@example.com");
    }

    #[test]
    fn test_rejects_invalid_no_at() {
        assert!(email_normalize("userexample.com").is_err());
    }

    #[test]
    fn test_rejects_invalid_no_domain() {
        assert!(email_normalize("user@").is_err());
    }

    #[test]
    fn test_rejects_whitespace_only() {
        assert!(email_normalize("   ").is_err());
    }

    #[test]
    fn test_username_accepts_allowed_characters() {
        let config = AccountsConfig::default();
        assert_eq!(
            username_normalize("  alice.b+test@x-y_z ", &config).unwrap(),
            "alice.b+test@x-y_z"
        );
    }

    #[test]
    fn test_username_rejects_spaces_and_symbols() {
        let config = AccountsConfig::default();
        assert!(username_normalize("alice smith", &config).is_err());
        assert!(username_normalize("alice<script>", &config).is_err());
        assert!(username_normalize("", &config).is_err());
    }

    #[test]
    fn test_username_enforces_max_length() {
        let config = AccountsConfig {
            username_max_length: 5,
            ..Default::default()
        };
        assert!(username_normalize("abcde", &config).is_ok());
        assert!(matches!(
            username_normalize("abcdef", &config),
            Err(AccountsError::InvalidUsername(_))
        ));
    }
}
