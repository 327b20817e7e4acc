//! [`TestContext`] over the in-memory backend.

use axum::{Router, routing::get};
use reqwest::Client;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::TestContext;
use crate::memory::{MemoryAccount, MemoryBackend, MemoryOutbox};
use crate::{Account, Accounts, AccountsBackend, AccountsConfig, AccountsHooks, EmailMessage};

/// Hooks that remember which events fired, as `"sign_up:<username>"` and
/// `"sign_in:<username>"`.
#[derive(Debug, Clone, Default)]
pub struct RecordingHooks {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingHooks {
    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn record(&self, event: String) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl AccountsHooks<MemoryAccount> for RecordingHooks {
    async fn on_sign_up(&self, account: &MemoryAccount) {
        self.record(format!("sign_up:{}", account.username()));
    }

    async fn on_sign_in(&self, account: &MemoryAccount) {
        self.record(format!("sign_in:{}", account.username()));
    }
}

/// The views served on an ephemeral local port.
pub struct MemoryContext {
    pub config: AccountsConfig,
    pub backend: MemoryBackend,
    pub outbox: MemoryOutbox,
    pub hooks: RecordingHooks,
}

impl TestContext for MemoryContext {
    type Account = MemoryAccount;

    async fn spawn() -> (String, Client, Self) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let base_url = format!("http://{}", listener.local_addr().expect("local addr"));

        let config = AccountsConfig {
            email_link_base_url: Some(base_url.clone()),
            ..Default::default()
        };
        let backend = MemoryBackend::default();
        let outbox = MemoryOutbox::default();
        let hooks = RecordingHooks::default();

        let accounts = Accounts::new(config.clone(), backend.clone())
            .expect("valid config")
            .with_hooks(hooks.clone())
            .with_email_sender(outbox.clone());

        let app: Router = Router::new()
            .route("/", get(|| async { "home" }))
            .merge(accounts.routes());

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server");
        });

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("http client");

        (
            base_url,
            client,
            Self {
                config,
                backend,
                outbox,
                hooks,
            },
        )
    }

    fn accounts_config(&self) -> &AccountsConfig {
        &self.config
    }

    async fn account_find_by_username(&self, username: &str) -> Option<MemoryAccount> {
        self.backend
            .account_find_by_username(username)
            .await
            .expect("memory backend")
    }

    async fn accounts_count(&self) -> usize {
        self.backend.accounts_all().expect("memory backend").len()
    }

    async fn account_deactivate(&self, account_id: Uuid) {
        self.backend
            .account_deactivate(account_id)
            .expect("memory backend");
    }

    async fn sessions_live_count(&self, account_id: Uuid) -> usize {
        self.backend
            .sessions_live_count(account_id)
            .expect("memory backend")
    }

    async fn reset_tokens_expire(&self, account_id: Uuid) {
        self.backend
            .reset_tokens_expire(account_id)
            .expect("memory backend");
    }

    async fn emails_sent(&self) -> Vec<EmailMessage> {
        self.outbox.messages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{PASSWORD_RESET_DONE_PATH, PASSWORD_RESET_PATH};
    use crate::testing::{TestUser, location, sign_in_request};
    use crate::{EmailSendError, EmailSender};

    crate::test_suite!(super::MemoryContext);

    #[derive(Clone)]
    struct FailingSender;

    impl EmailSender for FailingSender {
        async fn send(&self, _message: &EmailMessage) -> Result<(), EmailSendError> {
            Err(EmailSendError::Transport("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn password_reset_request_survives_mail_failure() {
        let accounts = Accounts::new(AccountsConfig::default(), MemoryBackend::default())
            .expect("valid config")
            .with_email_sender(FailingSender);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let base_url = format!("http://{}", listener.local_addr().expect("local addr"));
        let app: Router = accounts.routes();
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server");
        });
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("http client");

        let user = TestUser::new(&base_url, &client).await;
        let response = client
            .post(format!("{base_url}{PASSWORD_RESET_PATH}"))
            .form(&[("email", user.email.as_str())])
            .send()
            .await
            .expect("password reset request");

        assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
        assert_eq!(location(&response), PASSWORD_RESET_DONE_PATH);
    }

    #[tokio::test]
    async fn hooks_run_after_sign_up_and_sign_in() {
        let (base_url, client, ctx) = MemoryContext::spawn().await;
        let user = TestUser::new(&base_url, &client).await;

        let failed = sign_in_request(&base_url, &client, &user.username, "WrongPass999", "").await;
        assert_eq!(failed.status(), reqwest::StatusCode::OK);
        user.sign_in(&base_url, &client, &ctx.config).await;

        assert_eq!(
            ctx.hooks.events(),
            [
                format!("sign_up:{}", user.username),
                format!("sign_in:{}", user.username),
            ]
        );
    }
}
