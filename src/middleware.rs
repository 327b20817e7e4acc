//! Session middleware for Axum.

use crate::{
    Account, Accounts, AccountsBackend, AccountsHooks, EmailSender, PageRenderer, SessionState,
    cookies::session_cookie_clear, error::AccountsError, tokens::token_hash_sha256,
};
use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

/// Base session middleware.
///
/// Resolves the session cookie into a [`SessionState`] request extension.
///
/// # Behavior
/// - **Live session of an active account**: `SessionState::Authenticated`
/// - **Unknown, expired or revoked session, or inactive account**: anonymous,
///   and the stale cookie is cleared unless the handler sets its own cookie
/// - **No session cookie**: anonymous
/// - **Backend failure**: the request ends with the generic error page
///
/// Applying it more than once is harmless: an already-resolved request is
/// passed straight through.
pub async fn base<B, H, E, P>(
    State(accounts): State<Accounts<B, H, E, P>>,
    mut request: Request<Body>,
    next: Next,
) -> Response
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    if request.extensions().get::<SessionState>().is_some() {
        return next.run(request).await;
    }

    let config = accounts.config();
    let jar = CookieJar::from_headers(request.headers());
    let token = jar
        .get(&config.cookie_session_name)
        .map(|c| c.value().to_owned())
        .filter(|v| !v.is_empty());

    let mut stale_cookie = false;
    let state = match token {
        Some(token) => match session_resolve(&accounts, &token).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                stale_cookie = true;
                SessionState::Anonymous
            }
            Err(e) => return e.into_response(),
        },
        None => SessionState::Anonymous,
    };

    request.extensions_mut().insert(state);

    let response = next.run(request).await;

    if stale_cookie && !response.headers().contains_key(header::SET_COOKIE) {
        let jar = CookieJar::new().add(session_cookie_clear(config));
        return (jar, response).into_response();
    }

    response
}

/// Look up the account behind a session token.
///
/// Returns `None` when the session or its account is gone or inactive.
async fn session_resolve<B, H, E, P>(
    accounts: &Accounts<B, H, E, P>,
    token: &str,
) -> Result<Option<SessionState>, AccountsError>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    let session_hash = token_hash_sha256(token);

    let Some(account_id) = accounts
        .backend()
        .session_validate(&session_hash)
        .await
        .map_err(AccountsError::from_backend)?
    else {
        return Ok(None);
    };

    let account = accounts
        .backend()
        .account_get_by_id(account_id)
        .await
        .map_err(AccountsError::from_backend)?;

    Ok(account
        .filter(|account| account.is_active())
        .map(|account| SessionState::Authenticated {
            account_id: account.id(),
            username: account.username().to_owned(),
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountsConfig, memory::MemoryBackend, tokens::token_expiry_calculate};
    use axum::{
        Router,
        http::{Request, StatusCode},
        middleware,
        routing::get,
    };
    use std::time::Duration;
    use tower::util::ServiceExt;

    async fn whoami(state: SessionState) -> String {
        match state {
            SessionState::Anonymous => "anonymous".to_string(),
            SessionState::Authenticated { username, .. } => username,
        }
    }

    fn app(accounts: Accounts<MemoryBackend>) -> Router {
        Router::new()
            .route("/", get(whoami))
            .layer(middleware::from_fn_with_state(
                accounts,
                base::<MemoryBackend, (), (), crate::DefaultPages>,
            ))
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn live_session_resolves_to_account() {
        let backend = MemoryBackend::default();
        let account = backend.account_insert("alice", None, "hash").unwrap();
        backend
            .session_create(
                account.id,
                &token_hash_sha256("live-token"),
                token_expiry_calculate(Duration::from_secs(60)),
            )
            .await
            .unwrap();
        let accounts = Accounts::new(AccountsConfig::default(), backend).unwrap();

        let response = app(accounts)
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::COOKIE, "sessionid=live-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(body_text(response).await, "alice");
    }

    #[tokio::test]
    async fn stale_session_is_anonymous_and_cleared() {
        let accounts = Accounts::new(AccountsConfig::default(), MemoryBackend::default()).unwrap();

        let response = app(accounts)
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::COOKIE, "sessionid=forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let cleared = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("clearing cookie")
            .to_str()
            .unwrap()
            .to_string();
        assert!(cleared.starts_with("sessionid=;"));
        assert_eq!(body_text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn inactive_account_session_is_anonymous() {
        let backend = MemoryBackend::default();
        let account = backend.account_insert("mallory", None, "hash").unwrap();
        backend
            .session_create(
                account.id,
                &token_hash_sha256("token"),
                token_expiry_calculate(Duration::from_secs(60)),
            )
            .await
            .unwrap();
        backend.account_deactivate(account.id).unwrap();
        let accounts = Accounts::new(AccountsConfig::default(), backend).unwrap();

        let response = app(accounts)
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::COOKIE, "sessionid=token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_text(response).await, "anonymous");
    }
}
