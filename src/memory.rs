//! In-memory backend and outbox.
//!
//! Everything lives behind one `std::sync::Mutex`, held only for the
//! duration of a single operation. Suitable for tests, demos and the
//! `accounts-dev` binary; nothing survives a restart.

use crate::{Account, AccountsBackend, EmailMessage, EmailSendError, EmailSender};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

/// Account stored by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryAccount {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
    pub last_sign_in_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account for MemoryAccount {
    fn id(&self) -> Uuid {
        self.id
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    fn password_hash(&self) -> &str {
        &self.password_hash
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn last_sign_in_at(&self) -> Option<DateTime<Utc>> {
        self.last_sign_in_at
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Error)]
pub enum MemoryBackendError {
    #[error("memory backend lock poisoned")]
    Poisoned,

    #[error("username already taken: {0}")]
    UsernameTaken(String),

    #[error("no account with id {0}")]
    AccountNotFound(Uuid),
}

#[derive(Debug, Clone)]
struct SessionRecord {
    account_id: Uuid,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
struct ResetTokenRecord {
    account_id: Uuid,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
}

impl ResetTokenRecord {
    fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Default)]
struct Store {
    accounts: Vec<MemoryAccount>,
    sessions: HashMap<String, SessionRecord>,
    reset_tokens: HashMap<String, ResetTokenRecord>,
}

impl Store {
    fn account_by_username(&self, username: &str) -> Option<&MemoryAccount> {
        let wanted = username.to_lowercase();
        self.accounts
            .iter()
            .find(|a| a.username.to_lowercase() == wanted)
    }

    fn account_by_id_mut(&mut self, id: Uuid) -> Result<&mut MemoryAccount, MemoryBackendError> {
        self.accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(MemoryBackendError::AccountNotFound(id))
    }
}

/// In-memory [`AccountsBackend`]. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    store: Arc<Mutex<Store>>,
}

impl MemoryBackend {
    fn lock(&self) -> Result<MutexGuard<'_, Store>, MemoryBackendError> {
        self.store.lock().map_err(|_| MemoryBackendError::Poisoned)
    }

    /// Insert an account directly, bypassing the views.
    pub fn account_insert(
        &self,
        username: &str,
        email: Option<&str>,
        password_hash: &str,
    ) -> Result<MemoryAccount, MemoryBackendError> {
        let mut store = self.lock()?;

        if store.account_by_username(username).is_some() {
            return Err(MemoryBackendError::UsernameTaken(username.to_owned()));
        }

        let account = MemoryAccount {
            id: Uuid::new_v4(),
            username: username.to_owned(),
            email: email.map(str::to_owned),
            password_hash: password_hash.to_owned(),
            is_active: true,
            last_sign_in_at: None,
            created_at: Utc::now(),
        };
        store.accounts.push(account.clone());

        Ok(account)
    }

    /// Mark an account inactive.
    pub fn account_deactivate(&self, id: Uuid) -> Result<(), MemoryBackendError> {
        self.lock()?.account_by_id_mut(id)?.is_active = false;
        Ok(())
    }

    /// Snapshot of every stored account.
    pub fn accounts_all(&self) -> Result<Vec<MemoryAccount>, MemoryBackendError> {
        Ok(self.lock()?.accounts.clone())
    }

    /// Number of unexpired, unrevoked sessions of an account.
    pub fn sessions_live_count(&self, account_id: Uuid) -> Result<usize, MemoryBackendError> {
        let now = Utc::now();
        Ok(self
            .lock()?
            .sessions
            .values()
            .filter(|s| s.account_id == account_id && s.is_live(now))
            .count())
    }

    /// Move every reset token of an account into the past.
    pub fn reset_tokens_expire(&self, account_id: Uuid) -> Result<(), MemoryBackendError> {
        let past = Utc::now() - chrono::Duration::seconds(1);
        self.lock()?
            .reset_tokens
            .values_mut()
            .filter(|t| t.account_id == account_id)
            .for_each(|t| t.expires_at = past);
        Ok(())
    }
}

impl AccountsBackend for MemoryBackend {
    type Account = MemoryAccount;
    type Error = MemoryBackendError;

    async fn account_find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<MemoryAccount>, MemoryBackendError> {
        Ok(self.lock()?.account_by_username(username).cloned())
    }

    async fn account_get_by_id(&self, id: Uuid) -> Result<Option<MemoryAccount>, MemoryBackendError> {
        Ok(self.lock()?.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn accounts_find_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<MemoryAccount>, MemoryBackendError> {
        let wanted = email.to_lowercase();
        Ok(self
            .lock()?
            .accounts
            .iter()
            .filter(|a| a.email.as_deref().map(str::to_lowercase).as_deref() == Some(wanted.as_str()))
            .cloned()
            .collect())
    }

    async fn account_create_atomic(
        &self,
        username: &str,
        email: Option<&str>,
        password_hash: &str,
    ) -> Result<Option<MemoryAccount>, MemoryBackendError> {
        match self.account_insert(username, email, password_hash) {
            Ok(account) => Ok(Some(account)),
            Err(MemoryBackendError::UsernameTaken(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn account_last_sign_in_update(&self, id: Uuid) -> Result<(), MemoryBackendError> {
        self.lock()?.account_by_id_mut(id)?.last_sign_in_at = Some(Utc::now());
        Ok(())
    }

    async fn session_create(
        &self,
        account_id: Uuid,
        session_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), MemoryBackendError> {
        let now = Utc::now();
        let mut store = self.lock()?;
        store.sessions.retain(|_, s| s.is_live(now));
        store.sessions.insert(
            session_hash.to_owned(),
            SessionRecord {
                account_id,
                expires_at,
                revoked_at: None,
            },
        );
        Ok(())
    }

    async fn session_validate(&self, session_hash: &str) -> Result<Option<Uuid>, MemoryBackendError> {
        let now = Utc::now();
        Ok(self
            .lock()?
            .sessions
            .get(session_hash)
            .filter(|s| s.is_live(now))
            .map(|s| s.account_id))
    }

    async fn session_revoke(&self, session_hash: &str) -> Result<bool, MemoryBackendError> {
        let now = Utc::now();
        let mut store = self.lock()?;
        match store.sessions.get_mut(session_hash) {
            Some(session) if session.is_live(now) => {
                session.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reset_token_issue(
        &self,
        account_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), MemoryBackendError> {
        let now = Utc::now();
        let mut store = self.lock()?;
        store.reset_tokens.retain(|_, t| t.is_usable(now));
        store.reset_tokens.insert(
            token_hash.to_owned(),
            ResetTokenRecord {
                account_id,
                expires_at,
                used_at: None,
            },
        );
        Ok(())
    }

    async fn reset_token_validate(&self, token_hash: &str) -> Result<Option<Uuid>, MemoryBackendError> {
        let now = Utc::now();
        Ok(self
            .lock()?
            .reset_tokens
            .get(token_hash)
            .filter(|t| t.is_usable(now))
            .map(|t| t.account_id))
    }

    async fn password_reset_apply(
        &self,
        token_hash: &str,
        password_hash: &str,
    ) -> Result<bool, MemoryBackendError> {
        let now = Utc::now();
        let mut store = self.lock()?;

        let Some(account_id) = store
            .reset_tokens
            .get(token_hash)
            .filter(|t| t.is_usable(now))
            .map(|t| t.account_id)
        else {
            return Ok(false);
        };

        store.account_by_id_mut(account_id)?.password_hash = password_hash.to_owned();

        store
            .reset_tokens
            .values_mut()
            .filter(|t| t.account_id == account_id && t.used_at.is_none())
            .for_each(|t| t.used_at = Some(now));

        store
            .sessions
            .values_mut()
            .filter(|s| s.account_id == account_id && s.revoked_at.is_none())
            .for_each(|s| s.revoked_at = Some(now));

        Ok(true)
    }
}

/// [`EmailSender`] that keeps every message in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutbox {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl MemoryOutbox {
    /// Messages sent so far, oldest first.
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl EmailSender for MemoryOutbox {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailSendError> {
        self.sent
            .lock()
            .map_err(|_| EmailSendError::Transport("outbox lock poisoned".to_string()))?
            .push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::token_expiry_calculate;
    use std::time::Duration;

    fn in_an_hour() -> DateTime<Utc> {
        token_expiry_calculate(Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn usernames_are_unique_ignoring_case() {
        let backend = MemoryBackend::default();

        let first = backend
            .account_create_atomic("Alice", None, "hash")
            .await
            .unwrap();
        let second = backend
            .account_create_atomic("alice", None, "hash")
            .await
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert!(
            backend
                .account_find_by_username("ALICE")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn several_accounts_may_share_an_email() {
        let backend = MemoryBackend::default();
        backend
            .account_insert("alice", Some("shared@example.com"), "hash")
            .unwrap();
        backend
            .account_insert("bob", Some("shared@example.com"), "hash")
            .unwrap();
        backend.account_insert("carol", None, "hash").unwrap();

        let found = backend
            .accounts_find_by_email("shared@example.com")
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn revoked_and_expired_sessions_do_not_validate() {
        let backend = MemoryBackend::default();
        let account = backend.account_insert("alice", None, "hash").unwrap();

        backend
            .session_create(account.id, "live", in_an_hour())
            .await
            .unwrap();
        backend
            .session_create(account.id, "expired", Utc::now() - chrono::Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(
            backend.session_validate("live").await.unwrap(),
            Some(account.id)
        );
        assert_eq!(backend.session_validate("expired").await.unwrap(), None);

        assert!(backend.session_revoke("live").await.unwrap());
        assert!(!backend.session_revoke("live").await.unwrap());
        assert_eq!(backend.session_validate("live").await.unwrap(), None);
    }

    #[tokio::test]
    async fn password_reset_apply_is_single_use_and_revokes_everything() {
        let backend = MemoryBackend::default();
        let account = backend.account_insert("alice", None, "old").unwrap();
        backend
            .session_create(account.id, "session", in_an_hour())
            .await
            .unwrap();
        backend
            .reset_token_issue(account.id, "first", in_an_hour())
            .await
            .unwrap();
        backend
            .reset_token_issue(account.id, "second", in_an_hour())
            .await
            .unwrap();

        assert!(backend.password_reset_apply("first", "new").await.unwrap());
        assert!(!backend.password_reset_apply("first", "newer").await.unwrap());
        assert!(!backend.password_reset_apply("second", "newer").await.unwrap());

        let stored = backend.account_get_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "new");
        assert_eq!(backend.sessions_live_count(account.id).unwrap(), 0);
    }

    #[tokio::test]
    async fn expired_reset_tokens_are_rejected() {
        let backend = MemoryBackend::default();
        let account = backend.account_insert("alice", None, "old").unwrap();
        backend
            .reset_token_issue(account.id, "token", in_an_hour())
            .await
            .unwrap();

        backend.reset_tokens_expire(account.id).unwrap();

        assert_eq!(backend.reset_token_validate("token").await.unwrap(), None);
        assert!(!backend.password_reset_apply("token", "new").await.unwrap());
    }

    #[tokio::test]
    async fn dead_records_are_pruned_on_insert() {
        let backend = MemoryBackend::default();
        let account = backend.account_insert("alice", None, "old").unwrap();

        backend
            .reset_token_issue(account.id, "used", in_an_hour())
            .await
            .unwrap();
        assert!(backend.password_reset_apply("used", "new").await.unwrap());
        backend
            .reset_token_issue(account.id, "fresh", in_an_hour())
            .await
            .unwrap();

        backend
            .session_create(account.id, "revoked", in_an_hour())
            .await
            .unwrap();
        backend.session_revoke("revoked").await.unwrap();
        backend
            .session_create(account.id, "expired", Utc::now() - chrono::Duration::seconds(1))
            .await
            .unwrap();
        backend
            .session_create(account.id, "live", in_an_hour())
            .await
            .unwrap();

        let store = backend.lock().unwrap();
        assert_eq!(store.sessions.keys().collect::<Vec<_>>(), ["live"]);
        assert_eq!(store.reset_tokens.keys().collect::<Vec<_>>(), ["fresh"]);
    }

    #[tokio::test]
    async fn outbox_records_messages_in_order() {
        let outbox = MemoryOutbox::default();
        for to in ["a@example.com", "b@example.com"] {
            outbox
                .send(&EmailMessage {
                    to: to.to_string(),
                    subject: "Hello".to_string(),
                    html_body: String::new(),
                })
                .await
                .unwrap();
        }

        let sent: Vec<_> = outbox.messages().into_iter().map(|m| m.to).collect();
        assert_eq!(sent, ["a@example.com", "b@example.com"]);
    }
}
