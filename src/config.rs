use std::time::Duration;
use thiserror::Error;

/// Errors when loading or validating accounts configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountsConfigError {
    /// Configuration failed validation checks.
    #[error("invalid accounts config: {0}")]
    Invalid(String),
}

/// Cookie SameSite policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieSameSite {
    /// Cookies are sent in all contexts
    None,
    /// Cookies are sent in same-site and cross-site top-level navigations
    Lax,
    /// Cookies are only sent in same-site contexts
    Strict,
}

/// Accounts configuration
#[derive(Debug, Clone)]
pub struct AccountsConfig {
    /// Session lifetime (default: 14 days)
    pub session_expiry: Duration,

    /// Password reset link lifetime (default: 3 days)
    pub password_reset_token_expiry: Duration,

    /// Maximum username length (default: 150)
    pub username_max_length: usize,

    /// Minimum password length (default: 8)
    pub password_min_length: usize,

    /// Maximum password length (default: 128)
    pub password_max_length: usize,

    /// Whether passwords must contain at least one letter (default: true)
    pub password_require_letter: bool,

    /// Whether passwords must contain at least one number (default: true)
    pub password_require_number: bool,

    /// Cookie name for the session token (default: "sessionid")
    pub cookie_session_name: String,

    /// Cookie domain (optional, default: None)
    pub cookie_domain: Option<String>,

    /// Cookie path (default: "/")
    pub cookie_path: String,

    /// Cookie secure flag - only send over HTTPS (default: true in production, false in debug)
    pub cookie_secure: bool,

    /// Cookie SameSite policy (default: Lax)
    pub cookie_same_site: CookieSameSite,

    /// Base URL for links in emails (e.g., "https://app.example.com").
    /// When unset, emailed links are relative paths.
    pub email_link_base_url: Option<String>,

    /// Where a successful sign-in lands when no safe `next` is given (default: "/")
    pub login_redirect_url: String,

    /// Where signed-in visitors are sent from anonymous-only pages (default: "/")
    pub anonymous_redirect_url: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            session_expiry: Duration::from_secs(14 * 24 * 60 * 60), // 14 days
            password_reset_token_expiry: Duration::from_secs(3 * 24 * 60 * 60), // 3 days
            username_max_length: 150,
            password_min_length: 8,
            password_max_length: 128,
            password_require_letter: true,
            password_require_number: true,
            cookie_session_name: "sessionid".to_string(),
            cookie_domain: None,
            cookie_path: "/".to_string(),
            cookie_secure: !cfg!(debug_assertions), // true in release, false in debug
            cookie_same_site: CookieSameSite::Lax,
            email_link_base_url: None,
            login_redirect_url: "/".to_string(),
            anonymous_redirect_url: "/".to_string(),
        }
    }
}

impl AccountsConfig {
    /// Build accounts config from environment variables.
    ///
    /// Every variable is optional and falls back to the `Default` value:
    /// `ACCOUNTS_SESSION_EXPIRY_SECS`, `ACCOUNTS_PASSWORD_RESET_TOKEN_EXPIRY_SECS`,
    /// `ACCOUNTS_USERNAME_MAX_LENGTH`, `ACCOUNTS_PASSWORD_MIN_LENGTH`,
    /// `ACCOUNTS_PASSWORD_MAX_LENGTH`, `ACCOUNTS_PASSWORD_REQUIRE_LETTER`,
    /// `ACCOUNTS_PASSWORD_REQUIRE_NUMBER`, `ACCOUNTS_COOKIE_SESSION_NAME`,
    /// `ACCOUNTS_COOKIE_DOMAIN`, `ACCOUNTS_COOKIE_PATH`, `ACCOUNTS_COOKIE_SECURE`,
    /// `ACCOUNTS_COOKIE_SAME_SITE`, `ACCOUNTS_EMAIL_LINK_BASE_URL`,
    /// `ACCOUNTS_LOGIN_REDIRECT_URL`, `ACCOUNTS_ANONYMOUS_REDIRECT_URL`.
    pub fn from_env() -> Result<Self, AccountsConfigError> {
        let mut cfg = Self::default();
        cfg.session_expiry = Duration::from_secs(env_var_parse_or_default(
            "ACCOUNTS_SESSION_EXPIRY_SECS",
            cfg.session_expiry.as_secs(),
            "u64",
        )?);
        cfg.password_reset_token_expiry = Duration::from_secs(env_var_parse_or_default(
            "ACCOUNTS_PASSWORD_RESET_TOKEN_EXPIRY_SECS",
            cfg.password_reset_token_expiry.as_secs(),
            "u64",
        )?);
        cfg.username_max_length = env_var_parse_or_default(
            "ACCOUNTS_USERNAME_MAX_LENGTH",
            cfg.username_max_length,
            "usize",
        )?;
        cfg.password_min_length = env_var_parse_or_default(
            "ACCOUNTS_PASSWORD_MIN_LENGTH",
            cfg.password_min_length,
            "usize",
        )?;
        cfg.password_max_length = env_var_parse_or_default(
            "ACCOUNTS_PASSWORD_MAX_LENGTH",
            cfg.password_max_length,
            "usize",
        )?;
        cfg.password_require_letter = env_var_bool_or_default(
            "ACCOUNTS_PASSWORD_REQUIRE_LETTER",
            cfg.password_require_letter,
        )?;
        cfg.password_require_number = env_var_bool_or_default(
            "ACCOUNTS_PASSWORD_REQUIRE_NUMBER",
            cfg.password_require_number,
        )?;
        cfg.cookie_secure = env_var_bool_or_default("ACCOUNTS_COOKIE_SECURE", cfg.cookie_secure)?;
        cfg.cookie_same_site =
            env_var_cookie_same_site_or_default("ACCOUNTS_COOKIE_SAME_SITE", cfg.cookie_same_site)?;

        if let Some(v) = env_var_optional("ACCOUNTS_COOKIE_SESSION_NAME") {
            cfg.cookie_session_name = v;
        }
        if let Some(v) = env_var_optional("ACCOUNTS_COOKIE_PATH") {
            cfg.cookie_path = v;
        }
        if let Some(v) = env_var_optional("ACCOUNTS_LOGIN_REDIRECT_URL") {
            cfg.login_redirect_url = v;
        }
        if let Some(v) = env_var_optional("ACCOUNTS_ANONYMOUS_REDIRECT_URL") {
            cfg.anonymous_redirect_url = v;
        }
        cfg.cookie_domain = env_var_optional("ACCOUNTS_COOKIE_DOMAIN");
        cfg.email_link_base_url = env_var_optional("ACCOUNTS_EMAIL_LINK_BASE_URL");

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), AccountsConfigError> {
        if self.session_expiry.as_secs() == 0 {
            return Err(AccountsConfigError::Invalid(
                "Session expiry must be greater than 0".to_string(),
            ));
        }

        if self.password_reset_token_expiry.as_secs() == 0 {
            return Err(AccountsConfigError::Invalid(
                "Password reset token expiry must be greater than 0".to_string(),
            ));
        }

        if self.username_max_length == 0 {
            return Err(AccountsConfigError::Invalid(
                "Maximum username length must be greater than 0".to_string(),
            ));
        }

        if self.password_min_length == 0 {
            return Err(AccountsConfigError::Invalid(
                "Minimum password length must be greater than 0".to_string(),
            ));
        }

        if self.password_max_length < self.password_min_length {
            return Err(AccountsConfigError::Invalid(
                "Maximum password length must be greater than or equal to minimum password length"
                    .to_string(),
            ));
        }

        if self.cookie_session_name.trim().is_empty() {
            return Err(AccountsConfigError::Invalid(
                "Session cookie name cannot be empty".to_string(),
            ));
        }

        // Browsers drop SameSite=None cookies that are not Secure.
        if self.cookie_same_site == CookieSameSite::None && !self.cookie_secure {
            return Err(AccountsConfigError::Invalid(
                "ACCOUNTS_COOKIE_SAME_SITE=none requires ACCOUNTS_COOKIE_SECURE=true".to_string(),
            ));
        }

        if self.login_redirect_url.trim().is_empty() {
            return Err(AccountsConfigError::Invalid(
                "Login redirect URL cannot be empty".to_string(),
            ));
        }

        if self.anonymous_redirect_url.trim().is_empty() {
            return Err(AccountsConfigError::Invalid(
                "Anonymous redirect URL cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_var_optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_var_parse_or_default<T: std::str::FromStr>(
    key: &str,
    default: T,
    type_name: &str,
) -> Result<T, AccountsConfigError> {
    match env_var_optional(key) {
        Some(v) => v
            .parse::<T>()
            .map_err(|_| AccountsConfigError::Invalid(format!("{key} must be a valid {type_name}"))),
        _ => Ok(default),
    }
}

fn env_var_bool_or_default(key: &str, default: bool) -> Result<bool, AccountsConfigError> {
    match env_var_optional(key) {
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AccountsConfigError::Invalid(format!(
                "{key} must be a valid boolean"
            ))),
        },
        _ => Ok(default),
    }
}

fn env_var_cookie_same_site_or_default(
    key: &str,
    default: CookieSameSite,
) -> Result<CookieSameSite, AccountsConfigError> {
    match env_var_optional(key) {
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(CookieSameSite::None),
            "lax" => Ok(CookieSameSite::Lax),
            "strict" => Ok(CookieSameSite::Strict),
            _ => Err(AccountsConfigError::Invalid(format!(
                "{key} must be one of: none, lax, strict"
            ))),
        },
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_validate() {
        let cfg = AccountsConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.session_expiry, Duration::from_secs(14 * 24 * 60 * 60));
        assert_eq!(cfg.cookie_session_name, "sessionid");
    }

    #[test]
    fn validate_rejects_inverted_password_bounds() {
        let cfg = AccountsConfig {
            password_min_length: 20,
            password_max_length: 10,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(AccountsConfigError::Invalid(_))));
    }

    #[test]
    fn validate_requires_secure_cookie_for_same_site_none() {
        let cfg = AccountsConfig {
            cookie_same_site: CookieSameSite::None,
            cookie_secure: false,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(AccountsConfigError::Invalid(_))));

        let cfg = AccountsConfig {
            cookie_same_site: CookieSameSite::None,
            cookie_secure: true,
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_redirect_target() {
        let cfg = AccountsConfig {
            anonymous_redirect_url: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(AccountsConfigError::Invalid(_))));
    }

    #[test]
    #[serial]
    fn from_env_reads_overrides() {
        temp_env::with_vars(
            [
                ("ACCOUNTS_SESSION_EXPIRY_SECS", Some("60")),
                ("ACCOUNTS_COOKIE_SAME_SITE", Some("strict")),
                ("ACCOUNTS_LOGIN_REDIRECT_URL", Some("/dashboard")),
                ("ACCOUNTS_PASSWORD_REQUIRE_NUMBER", Some("off")),
            ],
            || {
                let cfg = AccountsConfig::from_env().expect("config from env");
                assert_eq!(cfg.session_expiry, Duration::from_secs(60));
                assert_eq!(cfg.cookie_same_site, CookieSameSite::Strict);
                assert_eq!(cfg.login_redirect_url, "/dashboard");
                assert!(!cfg.password_require_number);
            },
        );
    }

    #[test]
    #[serial]
    fn from_env_rejects_malformed_values() {
        temp_env::with_var("ACCOUNTS_COOKIE_SAME_SITE", Some("sometimes"), || {
            assert!(matches!(
                AccountsConfig::from_env(),
                Err(AccountsConfigError::Invalid(_))
            ));
        });
        temp_env::with_var("ACCOUNTS_SESSION_EXPIRY_SECS", Some("soon"), || {
            assert!(matches!(
                AccountsConfig::from_env(),
                Err(AccountsConfigError::Invalid(_))
            ));
        });
    }
}
