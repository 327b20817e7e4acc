//! Backend trait abstraction for storage-agnostic account views.
//!
//! The views own validation, hashing and token generation; everything that
//! has to survive a request (accounts, sessions, reset tokens) goes through
//! [`AccountsBackend`]. Tokens are only ever passed in hashed form.

use chrono::{DateTime, Utc};
use std::future::Future;
use uuid::Uuid;

/// Minimal account interface required by the views.
///
/// # Example
///
/// ```rust,ignore
/// use accounts::Account;
/// use chrono::{DateTime, Utc};
/// use uuid::Uuid;
///
/// #[derive(Clone)]
/// struct MyAccount {
///     id: Uuid,
///     username: String,
///     email: Option<String>,
///     password_hash: String,
///     created_at: DateTime<Utc>,
/// }
///
/// impl Account for MyAccount {
///     fn id(&self) -> Uuid { self.id }
///     fn username(&self) -> &str { &self.username }
///     fn email(&self) -> Option<&str> { self.email.as_deref() }
///     fn password_hash(&self) -> &str { &self.password_hash }
///     fn is_active(&self) -> bool { true }
///     fn last_sign_in_at(&self) -> Option<DateTime<Utc>> { None }
///     fn created_at(&self) -> DateTime<Utc> { self.created_at }
/// }
/// ```
pub trait Account: Send + Sync + Clone {
    /// Returns the account's unique identifier.
    fn id(&self) -> Uuid;

    /// Returns the username as registered.
    fn username(&self) -> &str;

    /// Returns the email address, if the account has one.
    fn email(&self) -> Option<&str>;

    /// Returns the Argon2id PHC hash of the account's password.
    fn password_hash(&self) -> &str;

    /// Inactive accounts can neither sign in nor request a password reset.
    fn is_active(&self) -> bool;

    /// Returns when the account last signed in, if ever.
    fn last_sign_in_at(&self) -> Option<DateTime<Utc>>;

    /// Returns when the account was created.
    fn created_at(&self) -> DateTime<Utc>;
}

/// Backend storage trait for account operations.
///
/// Operations marked *atomic* must be implemented so that concurrent
/// requests cannot both succeed (a unique index, a transaction, a lock).
pub trait AccountsBackend: Clone + Send + Sync + 'static {
    /// The account type stored in this backend.
    type Account: Account;

    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Find an account by username, ignoring case.
    fn account_find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<Self::Account>, Self::Error>> + Send;

    /// Find an account by its unique ID.
    fn account_get_by_id(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Self::Account>, Self::Error>> + Send;

    /// List every account registered with the given (normalized) email.
    ///
    /// Email is not a unique credential, so several accounts may match.
    fn accounts_find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Vec<Self::Account>, Self::Error>> + Send;

    /// Atomically create an account.
    ///
    /// Returns `None`, without creating anything, when an account with the same
    /// username (ignoring case) already exists.
    fn account_create_atomic(
        &self,
        username: &str,
        email: Option<&str>,
        password_hash: &str,
    ) -> impl Future<Output = Result<Option<Self::Account>, Self::Error>> + Send;

    /// Update the last sign-in timestamp for an account.
    fn account_last_sign_in_update(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Store a new session.
    fn session_create(
        &self,
        account_id: Uuid,
        session_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Resolve a session to its account ID.
    ///
    /// Returns `None` if the session is unknown, expired, or revoked.
    fn session_validate(
        &self,
        session_hash: &str,
    ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send;

    /// Revoke a session.
    ///
    /// Returns `true` if a live session was revoked, `false` if there was none.
    fn session_revoke(
        &self,
        session_hash: &str,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Store a password reset token.
    fn reset_token_issue(
        &self,
        account_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Check a reset token without consuming it.
    ///
    /// Returns the owning account ID if the token exists, is unexpired and unused.
    fn reset_token_validate(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send;

    /// Atomically consume a reset token and replace the account's password hash.
    ///
    /// On success the backend must also revoke every session and every other
    /// outstanding reset token of that account. Returns `false`, changing
    /// nothing, when the token is unknown, expired, or already used.
    fn password_reset_apply(
        &self,
        token_hash: &str,
        password_hash: &str,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;
}
