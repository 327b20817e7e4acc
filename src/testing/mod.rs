//! Test suite for verifying account view integrations.
//!
//! This module provides a reusable suite that drives the views over HTTP, so
//! users can check their [`AccountsBackend`] and [`EmailSender`]
//! implementations against the expected behavior.
//!
//! # Usage
//!
//! Implement the [`TestContext`] trait for your test infrastructure, then use
//! the [`Suite`] or the [`test_suite!`](crate::test_suite) macro:
//!
//! ```ignore
//! use accounts::testing::{Suite, TestContext};
//! use reqwest::Client;
//!
//! struct MyContext { /* your app state */ }
//!
//! impl TestContext for MyContext {
//!     async fn spawn() -> (String, Client, Self) {
//!         // Start your app, return (base_url, client, context).
//!         // The client must not follow redirects.
//!     }
//!     // ... other required methods
//! }
//!
//! #[tokio::test]
//! async fn run_accounts_suite() {
//!     Suite::<MyContext>::test_all().await;
//! }
//! ```
//!
//! [`AccountsBackend`]: crate::AccountsBackend

pub mod anonymous_gate;
pub mod memory;
pub mod password_reset;
pub mod sign_in;
pub mod sign_out;
pub mod sign_up;

use axum_extra::extract::cookie::Cookie;
use reqwest::{Client, StatusCode, header};
use std::future::Future;
use uuid::Uuid;

use crate::handlers::{PASSWORD_RESET_CONFIRM_PATH, SIGN_IN_PATH, SIGN_UP_PATH};
use crate::{Account, AccountsConfig, EmailMessage};

/// Password accepted by the default password rules.
pub const TEST_PASSWORD: &str = "SecurePass123";

/// Test account with its credentials.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl TestUser {
    /// Register a fresh account through the sign-up view.
    pub async fn new(base_url: &str, client: &Client) -> Self {
        let username = format!("user_{}", Uuid::new_v4().simple());
        let user = Self {
            email: format!("{username}@example.com"),
            username,
            password: TEST_PASSWORD.to_string(),
        };

        let response = client
            .post(format!("{base_url}{SIGN_UP_PATH}"))
            .form(&[
                ("username", user.username.as_str()),
                ("email", user.email.as_str()),
                ("password", user.password.as_str()),
                ("password_confirm", user.password.as_str()),
            ])
            .send()
            .await
            .expect("sign-up request");
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "sign-up failed");

        user
    }

    /// Sign in and return the session cookie value.
    pub async fn sign_in(&self, base_url: &str, client: &Client, config: &AccountsConfig) -> String {
        let response = sign_in_request(base_url, client, &self.username, &self.password, "").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "sign-in failed");

        Self::extract_cookie(response.headers(), &config.cookie_session_name)
            .filter(|value| !value.is_empty())
            .expect("session cookie on sign-in")
    }

    /// Extract a cookie value from response headers.
    pub fn extract_cookie(headers: &header::HeaderMap, name: &str) -> Option<String> {
        headers.get_all(header::SET_COOKIE).iter().find_map(|v| {
            let c = Cookie::parse(v.to_str().ok()?.to_string()).ok()?;
            (c.name() == name).then(|| c.value().to_string())
        })
    }

    /// Build the cookie header carrying a session.
    pub fn cookie_header(config: &AccountsConfig, session: &str) -> String {
        format!("{}={}", config.cookie_session_name, session)
    }
}

/// Submit the sign-in form.
pub async fn sign_in_request(
    base_url: &str,
    client: &Client,
    username: &str,
    password: &str,
    next: &str,
) -> reqwest::Response {
    client
        .post(format!("{base_url}{SIGN_IN_PATH}"))
        .form(&[("username", username), ("password", password), ("next", next)])
        .send()
        .await
        .expect("sign-in request")
}

/// Pull the reset token out of a password reset email.
pub fn reset_token_from_email(message: &EmailMessage) -> Option<String> {
    let marker = PASSWORD_RESET_CONFIRM_PATH.trim_end_matches("{token}");
    let start = message.html_body.find(marker)? + marker.len();
    let token: String = message.html_body[start..]
        .chars()
        .take_while(char::is_ascii_hexdigit)
        .collect();
    (!token.is_empty()).then_some(token)
}

/// Read the `Location` header of a redirect.
pub fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Context trait that test implementations must provide.
///
/// This abstracts away the concrete app infrastructure, allowing the suite to
/// run against any backend that implements [`crate::AccountsBackend`].
pub trait TestContext: Sized + Send + Sync {
    /// The account type from your backend.
    type Account: Account;

    /// Spawn the test app and return (base_url, http_client, context).
    ///
    /// The app must serve `Accounts::routes()` at the root, and the client
    /// must not follow redirects.
    fn spawn() -> impl Future<Output = (String, Client, Self)> + Send;

    /// Get the accounts configuration.
    fn accounts_config(&self) -> &AccountsConfig;

    /// Find an account by username (for test assertions).
    fn account_find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Option<Self::Account>> + Send;

    /// Count every stored account.
    fn accounts_count(&self) -> impl Future<Output = usize> + Send;

    /// Mark an account inactive.
    fn account_deactivate(&self, account_id: Uuid) -> impl Future<Output = ()> + Send;

    /// Count an account's live sessions.
    fn sessions_live_count(&self, account_id: Uuid) -> impl Future<Output = usize> + Send;

    /// Expire every reset token of an account.
    fn reset_tokens_expire(&self, account_id: Uuid) -> impl Future<Output = ()> + Send;

    /// Emails handed to the sender so far.
    fn emails_sent(&self) -> impl Future<Output = Vec<EmailMessage>> + Send;
}

/// Test suite for the account views.
///
/// Run all tests with `Suite::<YourContext>::test_all()`.
pub struct Suite<C: TestContext> {
    _marker: std::marker::PhantomData<C>,
}

impl<C: TestContext> Suite<C> {
    /// Run all account view tests.
    pub async fn test_all() {
        // Sign-up tests
        sign_up::sign_up_page_renders_form::<C>().await;
        sign_up::sign_up_creates_account_and_redirects_to_sign_in::<C>().await;
        sign_up::sign_up_rejects_duplicate_username::<C>().await;
        sign_up::sign_up_rerenders_invalid_fields_without_persisting::<C>().await;
        sign_up::sign_up_rejects_mismatched_confirmation::<C>().await;
        sign_up::concurrent_sign_ups_create_one_account::<C>().await;

        // Sign-in tests
        sign_in::sign_in_page_carries_next::<C>().await;
        sign_in::sign_in_with_valid_credentials_starts_session::<C>().await;
        sign_in::sign_in_rejects_bad_credentials_generically::<C>().await;
        sign_in::sign_in_rejects_inactive_accounts::<C>().await;
        sign_in::sign_in_requires_both_fields::<C>().await;
        sign_in::sign_in_follows_only_safe_next::<C>().await;

        // Sign-out tests
        sign_out::sign_out_revokes_session_and_clears_cookie::<C>().await;
        sign_out::sign_out_via_get_revokes_session::<C>().await;
        sign_out::sign_out_without_session_is_idempotent::<C>().await;
        sign_out::sign_out_with_unknown_session_clears_cookie::<C>().await;

        // Anonymous gate tests
        anonymous_gate::signed_in_visitors_are_redirected_from_anonymous_pages::<C>().await;
        anonymous_gate::signed_in_sign_up_post_creates_nothing::<C>().await;
        anonymous_gate::stale_session_is_anonymous_and_cleared::<C>().await;

        // Password reset tests
        password_reset::password_reset_request_emails_link::<C>().await;
        password_reset::password_reset_unknown_email_sends_nothing::<C>().await;
        password_reset::password_reset_request_validates_email::<C>().await;
        password_reset::password_reset_skips_inactive_accounts::<C>().await;
        password_reset::password_reset_confirm_sets_password_and_revokes_sessions::<C>().await;
        password_reset::password_reset_link_is_single_use::<C>().await;
        password_reset::password_reset_rejects_expired_link::<C>().await;
        password_reset::password_reset_mismatch_keeps_link_usable::<C>().await;
        password_reset::password_reset_rejects_unknown_link::<C>().await;
    }
}

/// Generates individual test functions for the accounts suite.
///
/// This macro creates a `#[tokio::test]` function for each test case in the suite,
/// ensuring they run individually and report separate results.
///
/// # Example
///
/// ```rust,ignore
/// accounts::test_suite!(MyContext);
/// ```
#[macro_export]
macro_rules! test_suite {
    ($context:ty) => {
        $crate::test_suite!(@cases $context;
            sign_up::sign_up_page_renders_form,
            sign_up::sign_up_creates_account_and_redirects_to_sign_in,
            sign_up::sign_up_rejects_duplicate_username,
            sign_up::sign_up_rerenders_invalid_fields_without_persisting,
            sign_up::sign_up_rejects_mismatched_confirmation,
            sign_up::concurrent_sign_ups_create_one_account,
            sign_in::sign_in_page_carries_next,
            sign_in::sign_in_with_valid_credentials_starts_session,
            sign_in::sign_in_rejects_bad_credentials_generically,
            sign_in::sign_in_rejects_inactive_accounts,
            sign_in::sign_in_requires_both_fields,
            sign_in::sign_in_follows_only_safe_next,
            sign_out::sign_out_revokes_session_and_clears_cookie,
            sign_out::sign_out_via_get_revokes_session,
            sign_out::sign_out_without_session_is_idempotent,
            sign_out::sign_out_with_unknown_session_clears_cookie,
            anonymous_gate::signed_in_visitors_are_redirected_from_anonymous_pages,
            anonymous_gate::signed_in_sign_up_post_creates_nothing,
            anonymous_gate::stale_session_is_anonymous_and_cleared,
            password_reset::password_reset_request_emails_link,
            password_reset::password_reset_unknown_email_sends_nothing,
            password_reset::password_reset_request_validates_email,
            password_reset::password_reset_skips_inactive_accounts,
            password_reset::password_reset_confirm_sets_password_and_revokes_sessions,
            password_reset::password_reset_link_is_single_use,
            password_reset::password_reset_rejects_expired_link,
            password_reset::password_reset_mismatch_keeps_link_usable,
            password_reset::password_reset_rejects_unknown_link,
        );
    };
    (@cases $context:ty; $($module:ident :: $case:ident),* $(,)?) => {
        $(
            #[tokio::test]
            async fn $case() {
                $crate::testing::$module::$case::<$context>().await;
            }
        )*
    };
}
