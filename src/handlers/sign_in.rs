//! Handler for account sign-in.

use super::page_render;
use crate::{
    Account, Accounts, AccountsBackend, AccountsHooks, EmailSender, Page, PageRenderer,
    cookies::session_cookie_create,
    error::AccountsError,
    forms::{FormState, INVALID_LOGIN, SignInForm},
    password::{password_hash, password_verify},
    tokens::{token_expiry_calculate, token_hash_sha256, token_with_hash_generate},
};
use axum::{
    Form, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi};

pub const SIGN_IN_PATH: &str = "/signin";

#[derive(OpenApi)]
#[openapi(
    paths(sign_in_page, sign_in),
    components(schemas(crate::forms::SignInForm))
)]
pub(crate) struct SignInApi;

/// Returns routes for the sign-in page.
pub fn sign_in_routes<B, H, E, P>() -> Router<Accounts<B, H, E, P>>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    Router::new().route(
        SIGN_IN_PATH,
        get(sign_in_page::<B, H, E, P>).post(sign_in::<B, H, E, P>),
    )
}

/// Query string of the sign-in page.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(default)]
pub struct SignInQuery {
    /// Local path to continue to after signing in.
    pub next: String,
}

/// Show the sign-in form.
#[utoipa::path(
    get,
    path = "/signin",
    params(SignInQuery),
    responses(
        (status = OK, description = "Sign-in form", content_type = "text/html", body = String),
        (status = SEE_OTHER, description = "Already signed in")
    )
)]
pub async fn sign_in_page<B, H, E, P>(
    State(accounts): State<Accounts<B, H, E, P>>,
    Query(query): Query<SignInQuery>,
) -> Result<Response, AccountsError>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    let form = FormState::new().with_value("next", query.next);
    Ok(page_render(&accounts, Page::SignIn { form: &form })?.into_response())
}

/// Sign in with username and password.
///
/// Unknown usernames, wrong passwords and inactive accounts all get the same
/// form error. On success any session named by the incoming cookie is
/// revoked, a new session is started, the `on_sign_in` hook runs and the
/// visitor is redirected to `next` (when it is a safe local path) or to
/// `login_redirect_url`.
#[utoipa::path(
    post,
    path = "/signin",
    request_body(content = SignInForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = SEE_OTHER, description = "Signed in; sets the session cookie"),
        (status = OK, description = "Form with errors", content_type = "text/html", body = String),
        (status = INTERNAL_SERVER_ERROR, description = "Storage or hashing failure")
    )
)]
pub async fn sign_in<B, H, E, P>(
    State(accounts): State<Accounts<B, H, E, P>>,
    jar: CookieJar,
    Form(form): Form<SignInForm>,
) -> Result<Response, AccountsError>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    let config = accounts.config();

    if let Err(state) = form.validate() {
        return Ok(page_render(&accounts, Page::SignIn { form: &state })?.into_response());
    }

    let account = accounts
        .backend()
        .account_find_by_username(form.username.trim())
        .await
        .map_err(AccountsError::from_backend)?;

    let account = match account {
        Some(account) if password_verify(&form.password, account.password_hash())? => {
            Some(account).filter(|a| a.is_active())
        }
        Some(_) => None,
        None => {
            // Unknown usernames cost one hash too.
            let _ = password_hash(&form.password);
            None
        }
    };

    let Some(account) = account else {
        tracing::debug!(username = %form.username.trim(), "Sign-in rejected");
        let mut state = form.bound();
        state.add_non_field_error(INVALID_LOGIN);
        return Ok(page_render(&accounts, Page::SignIn { form: &state })?.into_response());
    };

    // Only a live session when the view is mounted without the anonymous gate.
    if let Some(previous) = jar.get(&config.cookie_session_name) {
        accounts
            .backend()
            .session_revoke(&token_hash_sha256(previous.value()))
            .await
            .map_err(AccountsError::from_backend)?;
    }

    let (session_token, session_hash) = token_with_hash_generate();
    accounts
        .backend()
        .session_create(
            account.id(),
            &session_hash,
            token_expiry_calculate(config.session_expiry),
        )
        .await
        .map_err(AccountsError::from_backend)?;

    accounts
        .backend()
        .account_last_sign_in_update(account.id())
        .await
        .map_err(AccountsError::from_backend)?;

    accounts.hooks().on_sign_in(&account).await;

    tracing::info!(account_id = %account.id(), "Signed in");

    let target = if redirect_target_is_safe(&form.next) {
        form.next.as_str()
    } else {
        config.login_redirect_url.as_str()
    };

    let jar = jar.add(session_cookie_create(session_token, config));
    Ok((jar, Redirect::to(target)).into_response())
}

/// Whether `target` is a path on this site.
///
/// Accepts paths starting with a single `/`; rejects scheme-relative
/// (`//host`) targets, backslashes and control characters.
pub fn redirect_target_is_safe(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.contains('\\')
        && !target.chars().any(char::is_control)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountsConfig, memory::MemoryBackend, middleware::base};
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
        middleware,
    };
    use std::time::Duration;
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn sign_in_rotates_the_incoming_session() {
        let backend = MemoryBackend::default();
        let account = backend
            .account_insert("alice", None, &password_hash("SecurePass123").unwrap())
            .unwrap();
        let old_hash = token_hash_sha256("previous");
        backend
            .session_create(
                account.id,
                &old_hash,
                token_expiry_calculate(Duration::from_secs(60)),
            )
            .await
            .unwrap();

        let accounts = Accounts::new(AccountsConfig::default(), backend.clone()).unwrap();
        // Mounted without the anonymous-only gate, so a live session reaches the view.
        let app = sign_in_routes::<MemoryBackend, (), (), crate::DefaultPages>()
            .layer(middleware::from_fn_with_state(
                accounts.clone(),
                base::<MemoryBackend, (), (), crate::DefaultPages>,
            ))
            .with_state(accounts);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(SIGN_IN_PATH)
                    .header(header::COOKIE, "sessionid=previous")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("username=alice&password=SecurePass123"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie")
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("sessionid="));
        assert!(!cookie.starts_with("sessionid=previous"));
        assert!(!cookie.starts_with("sessionid=;"));

        assert_eq!(backend.session_validate(&old_hash).await.unwrap(), None);
        assert_eq!(backend.sessions_live_count(account.id).unwrap(), 1);
    }

    #[test]
    fn local_paths_are_safe() {
        assert!(redirect_target_is_safe("/"));
        assert!(redirect_target_is_safe("/inbox?page=2"));
    }

    #[test]
    fn external_and_malformed_targets_are_unsafe() {
        assert!(!redirect_target_is_safe(""));
        assert!(!redirect_target_is_safe("https://evil.example"));
        assert!(!redirect_target_is_safe("//evil.example"));
        assert!(!redirect_target_is_safe("/\\evil.example"));
        assert!(!redirect_target_is_safe("/ok\r\nSet-Cookie: x=y"));
        assert!(!redirect_target_is_safe("inbox"));
    }
}
