//! Handler for signing out.

use super::page_render;
use crate::{
    Accounts, AccountsBackend, AccountsHooks, EmailSender, Page, PageRenderer,
    cookies::session_cookie_clear, error::AccountsError, tokens::token_hash_sha256,
};
use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::cookie::CookieJar;
use utoipa::OpenApi;

pub const SIGN_OUT_PATH: &str = "/signout";

#[derive(OpenApi)]
#[openapi(paths(sign_out))]
pub(crate) struct SignOutApi;

/// Returns routes for the sign-out page.
pub fn sign_out_routes<B, H, E, P>() -> Router<Accounts<B, H, E, P>>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    Router::new().route(
        SIGN_OUT_PATH,
        get(sign_out::<B, H, E, P>).post(sign_out::<B, H, E, P>),
    )
}

/// End the current session.
///
/// Revokes the session named by the cookie, if any, and always clears the
/// cookie. Safe to call repeatedly or without a session.
#[utoipa::path(
    method(get, post),
    path = "/signout",
    responses(
        (status = OK, description = "Signed out; clears the session cookie", content_type = "text/html", body = String),
        (status = INTERNAL_SERVER_ERROR, description = "Storage failure")
    )
)]
pub async fn sign_out<B, H, E, P>(
    State(accounts): State<Accounts<B, H, E, P>>,
    jar: CookieJar,
) -> Result<Response, AccountsError>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    let config = accounts.config();

    if let Some(cookie) = jar.get(&config.cookie_session_name) {
        let revoked = accounts
            .backend()
            .session_revoke(&token_hash_sha256(cookie.value()))
            .await
            .map_err(AccountsError::from_backend)?;

        if revoked {
            tracing::info!("Signed out");
        }
    }

    let jar = jar.add(session_cookie_clear(config));
    let page = page_render(&accounts, Page::SignedOut)?;

    Ok((jar, page).into_response())
}
