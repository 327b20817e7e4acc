//! # accounts
//!
//! Server-rendered account views for Axum: sign up, sign in, sign out and a
//! four-step password reset flow, backed by opaque server-side sessions.
//!
//! ## Features
//!
//! - **HTML forms** with inline, per-field validation errors
//! - **Argon2id** password hashing
//! - **Opaque session cookie**, stored hashed and revocable
//! - **Single-use, expiring reset links** delivered through a pluggable [`EmailSender`]
//! - **Anonymous-only gate** redirecting signed-in visitors away from sign-up/sign-in
//! - **Extensible backend trait** for any database, with an in-memory backend for tests
//! - **Pluggable page renderer** for your own templates
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use accounts::{Accounts, AccountsConfig, CurrentAccount, memory::MemoryBackend};
//! use axum::{Router, routing::get};
//!
//! let accounts = Accounts::new(AccountsConfig::from_env()?, MemoryBackend::default())?;
//!
//! // `routes()` resolves sessions itself; your own routes need the layer to
//! // use `SessionState` or `CurrentAccount`.
//! let app: Router = Router::new()
//!     .route("/inbox", get(|account: CurrentAccount| async move { account.username }))
//!     .layer(axum::middleware::from_fn_with_state(
//!         accounts.clone(),
//!         accounts::middleware::base::<MemoryBackend, (), (), accounts::DefaultPages>,
//!     ))
//!     .merge(accounts.routes());
//! ```
//!
//! ## Endpoints
//!
//! - `GET|POST /signup` - Register (anonymous only)
//! - `GET|POST /signin` - Sign in (anonymous only)
//! - `GET|POST /signout` - Sign out
//! - `GET|POST /password-reset` - Request a reset link
//! - `GET /password-reset/done` - Request acknowledged
//! - `GET|POST /password-reset/confirm/{token}` - Choose a new password
//! - `GET /password-reset/complete` - Password changed
//!
//! ## Hooks
//!
//! ```rust,ignore
//! use accounts::{Account, AccountsHooks};
//!
//! #[derive(Clone)]
//! struct Welcome;
//!
//! impl<A: Account> AccountsHooks<A> for Welcome {
//!     fn on_sign_up(&self, account: &A) -> impl std::future::Future<Output = ()> + Send {
//!         let username = account.username().to_owned();
//!         async move { tracing::info!(%username, "welcome aboard") }
//!     }
//! }
//! ```

mod backend;
mod config;
mod cookies;
mod email;
mod email_sender;
mod error;
mod extractors;
pub mod forms;
pub mod gate;
pub mod handlers;
pub mod memory;
pub mod middleware;
pub mod openapi;
pub mod pages;
mod password;
pub mod tokens;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use axum::Router;
use std::future::Future;
use std::sync::Arc;

pub use backend::{Account, AccountsBackend};
pub use config::{AccountsConfig, AccountsConfigError, CookieSameSite};
pub use email_sender::{EmailMessage, EmailSendError, EmailSender};
pub use error::AccountsError;
pub use extractors::{CurrentAccount, SessionState};
pub use pages::{DefaultPages, Page, PageRenderError, PageRenderer};

/// Hooks for account lifecycle events.
///
/// Run custom logic after an account is created or signs in, such as sending
/// a welcome email or auditing. Hooks cannot fail the request.
pub trait AccountsHooks<A: Account>: Send + Sync + Clone + 'static {
    /// Called after an account is created.
    fn on_sign_up(&self, _account: &A) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Called after an account signs in.
    fn on_sign_in(&self, _account: &A) -> impl Future<Output = ()> + Send {
        async {}
    }
}

impl<A: Account> AccountsHooks<A> for () {}

/// Account views over a backend. Cheap to clone.
///
/// # Type Parameters
///
/// - `B`: storage, implementing [`AccountsBackend`]
/// - `H`: lifecycle hooks, implementing [`AccountsHooks`] (defaults to `()`)
/// - `E`: mail delivery, implementing [`EmailSender`] (defaults to `()`)
/// - `P`: page renderer, implementing [`PageRenderer`] (defaults to [`DefaultPages`])
#[derive(Clone)]
pub struct Accounts<B, H = (), E = (), P = DefaultPages>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    config: Arc<AccountsConfig>,
    backend: B,
    hooks: H,
    email_sender: E,
    pages: P,
}

impl<B: AccountsBackend> Accounts<B> {
    /// Create account views with no-op hooks, no mail delivery and the default pages.
    pub fn new(config: AccountsConfig, backend: B) -> Result<Self, AccountsConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            backend,
            hooks: (),
            email_sender: (),
            pages: DefaultPages::default(),
        })
    }
}

impl<B, H, E, P> Accounts<B, H, E, P>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    /// Attach custom lifecycle hooks.
    pub fn with_hooks<NewH: AccountsHooks<B::Account>>(self, hooks: NewH) -> Accounts<B, NewH, E, P> {
        Accounts {
            config: self.config,
            backend: self.backend,
            hooks,
            email_sender: self.email_sender,
            pages: self.pages,
        }
    }

    /// Attach the sender used for password reset emails.
    pub fn with_email_sender<NewE: EmailSender>(self, email_sender: NewE) -> Accounts<B, H, NewE, P> {
        Accounts {
            config: self.config,
            backend: self.backend,
            hooks: self.hooks,
            email_sender,
            pages: self.pages,
        }
    }

    /// Replace the page renderer.
    pub fn with_pages<NewP: PageRenderer>(self, pages: NewP) -> Accounts<B, H, E, NewP> {
        Accounts {
            config: self.config,
            backend: self.backend,
            hooks: self.hooks,
            email_sender: self.email_sender,
            pages,
        }
    }

    /// Returns a router with every account view.
    ///
    /// Sign-up and sign-in sit behind [`gate::anonymous_only`]; the whole
    /// router is wrapped in [`middleware::base`], so session state is always
    /// resolved for these routes.
    pub fn routes<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let anonymous_only = Router::new()
            .merge(handlers::sign_up_routes::<B, H, E, P>())
            .merge(handlers::sign_in_routes::<B, H, E, P>())
            .route_layer(axum::middleware::from_fn_with_state(
                self.clone(),
                gate::anonymous_only::<B, H, E, P>,
            ));

        Router::new()
            .merge(anonymous_only)
            .merge(handlers::sign_out_routes::<B, H, E, P>())
            .merge(handlers::password_reset_routes::<B, H, E, P>())
            .layer(axum::middleware::from_fn_with_state(
                self.clone(),
                middleware::base::<B, H, E, P>,
            ))
            .with_state(self.clone())
    }

    /// Returns a reference to the accounts configuration.
    pub fn config(&self) -> &AccountsConfig {
        &self.config
    }

    /// Returns a reference to the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn hooks(&self) -> &H {
        &self.hooks
    }

    pub(crate) fn email_sender(&self) -> &E {
        &self.email_sender
    }

    /// Render a page to HTML with the configured renderer.
    pub fn render(&self, page: &Page<'_>) -> Result<String, AccountsError> {
        Ok(self.pages.render(page)?)
    }
}
