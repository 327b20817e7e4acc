//! Serves the account views on an in-memory backend for local development.
//!
//! Reset emails are written to the log instead of being delivered.
//!
//! Run with `cargo run --features dev-server`.

use std::net::SocketAddr;

use accounts::{
    Accounts, AccountsConfig, CurrentAccount, DefaultPages, EmailMessage, EmailSendError,
    EmailSender, SessionState,
    handlers::{SIGN_IN_PATH, SIGN_OUT_PATH, SIGN_UP_PATH},
    memory::{MemoryBackend, MemoryOutbox},
    pages::escape,
};
use axum::{Router, middleware, response::Html, routing::get};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Keeps every message and logs it, so the reset link can be copied from the console.
#[derive(Clone, Default)]
struct LogOutbox {
    outbox: MemoryOutbox,
}

impl EmailSender for LogOutbox {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailSendError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.html_body,
            "Outgoing email"
        );
        self.outbox.send(message).await
    }
}

async fn home(session: SessionState) -> Html<String> {
    let body = match session {
        SessionState::Authenticated { username, .. } => format!(
            "<p>Signed in as {}.</p>\n<p><a href=\"/private\">Private page</a> | \
             <a href=\"{SIGN_OUT_PATH}\">Sign out</a></p>",
            escape(&username)
        ),
        SessionState::Anonymous => format!(
            "<p>Not signed in.</p>\n<p><a href=\"{SIGN_IN_PATH}\">Sign in</a> | \
             <a href=\"{SIGN_UP_PATH}\">Sign up</a></p>"
        ),
    };
    Html(format!("<!DOCTYPE html>\n<h1>Home</h1>\n{body}\n"))
}

async fn private(account: CurrentAccount) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<h1>Private</h1>\n<p>Only {} can see this.</p>\n<p><a href=\"/\">Home</a></p>\n",
        escape(&account.username)
    ))
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accounts=debug,accounts_dev=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AccountsConfig::from_env().expect("Invalid ACCOUNTS_* configuration");

    let accounts = Accounts::new(config, MemoryBackend::default())
        .expect("Invalid accounts configuration")
        .with_email_sender(LogOutbox::default());

    let app = Router::new()
        .route("/", get(home))
        .route("/private", get(private))
        .layer(middleware::from_fn_with_state(
            accounts.clone(),
            accounts::middleware::base::<MemoryBackend, (), LogOutbox, DefaultPages>,
        ))
        .merge(accounts.routes())
        .layer(TraceLayer::new_for_http());

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("PORT must be a number");

    let addr = SocketAddr::new(host.parse().expect("Invalid HOST"), port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
