use crate::config::{AccountsConfig, CookieSameSite};
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Create the session cookie
pub fn session_cookie_create(token: String, config: &AccountsConfig) -> Cookie<'static> {
    let secs = i64::try_from(config.session_expiry.as_secs()).unwrap_or(i64::MAX);
    let max_age = Duration::seconds(secs);

    cookie_create(config.cookie_session_name.clone(), token, max_age, config)
}

/// Create a cookie that clears the session
pub fn session_cookie_clear(config: &AccountsConfig) -> Cookie<'static> {
    cookie_create(
        config.cookie_session_name.clone(),
        String::new(),
        Duration::ZERO,
        config,
    )
}

/// Create a cookie with standard security settings
fn cookie_create(
    name: String,
    value: String,
    max_age: Duration,
    config: &AccountsConfig,
) -> Cookie<'static> {
    let same_site = match config.cookie_same_site {
        CookieSameSite::None => SameSite::None,
        CookieSameSite::Lax => SameSite::Lax,
        CookieSameSite::Strict => SameSite::Strict,
    };

    let mut cookie = Cookie::build((name, value))
        .path(config.cookie_path.clone())
        .http_only(true)
        .same_site(same_site)
        .secure(config.cookie_secure)
        .max_age(max_age);

    if let Some(domain) = &config.cookie_domain {
        cookie = cookie.domain(domain.clone());
    }

    cookie.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AccountsConfig {
        AccountsConfig {
            cookie_domain: Some("example.com".to_string()),
            cookie_secure: true,
            cookie_same_site: CookieSameSite::Strict,
            ..Default::default()
        }
    }

    #[test]
    fn session_cookie_respects_security_config() {
        let config = base_config();
        let cookie = session_cookie_create("abc123".to_string(), &config);

        assert_eq!(cookie.name(), config.cookie_session_name);
        assert_eq!(cookie.value(), "abc123");
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.path(), Some(config.cookie_path.as_str()));
        assert!(cookie.http_only().unwrap());
        assert!(cookie.secure().unwrap());
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(
            cookie.max_age(),
            Some(Duration::seconds(config.session_expiry.as_secs() as i64))
        );
    }

    #[test]
    fn session_cookie_max_age_saturates_for_huge_expiry() {
        let config = AccountsConfig {
            session_expiry: std::time::Duration::from_secs(u64::MAX),
            ..base_config()
        };
        assert!(config.validate().is_ok());

        let cookie = session_cookie_create("abc123".to_string(), &config);

        assert_eq!(cookie.max_age(), Some(Duration::seconds(i64::MAX)));
    }

    #[test]
    fn session_cookie_clear_sets_zero_age_and_same_name() {
        let config = base_config();
        let cleared = session_cookie_clear(&config);

        assert_eq!(cleared.name(), config.cookie_session_name);
        assert_eq!(cleared.value(), "");
        assert_eq!(cleared.max_age(), Some(Duration::ZERO));
        // Browsers only replace a cookie whose scope matches
        assert_eq!(cleared.domain(), Some("example.com"));
        assert_eq!(cleared.path(), Some(config.cookie_path.as_str()));
        assert_eq!(cleared.same_site(), Some(SameSite::Strict));
    }
}
