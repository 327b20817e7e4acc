//! Sign-up handler.

use super::{SIGN_IN_PATH, page_render};
use crate::{
    Accounts, AccountsBackend, AccountsHooks, EmailSender, Page, PageRenderer,
    error::AccountsError,
    forms::{FormState, SignUpForm, USERNAME_TAKEN},
    password::password_hash,
};
use axum::{
    Form, Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use utoipa::OpenApi;

pub const SIGN_UP_PATH: &str = "/signup";

#[derive(OpenApi)]
#[openapi(
    paths(sign_up_page, sign_up),
    components(schemas(crate::forms::SignUpForm))
)]
pub(crate) struct SignUpApi;

/// Returns routes for the sign-up page.
pub fn sign_up_routes<B, H, E, P>() -> Router<Accounts<B, H, E, P>>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    Router::new().route(
        SIGN_UP_PATH,
        get(sign_up_page::<B, H, E, P>).post(sign_up::<B, H, E, P>),
    )
}

/// Show the empty registration form.
#[utoipa::path(
    get,
    path = "/signup",
    responses(
        (status = OK, description = "Registration form", content_type = "text/html", body = String),
        (status = SEE_OTHER, description = "Already signed in")
    )
)]
pub async fn sign_up_page<B, H, E, P>(
    State(accounts): State<Accounts<B, H, E, P>>,
) -> Result<Response, AccountsError>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    let form = FormState::new();
    Ok(page_render(&accounts, Page::SignUp { form: &form })?.into_response())
}

/// Register a new account.
///
/// On success the account exists, the `on_sign_up` hook has run and the
/// visitor is sent to the sign-in page; no session is started. Invalid input
/// re-renders the form with its errors and the submitted non-secret values.
#[utoipa::path(
    post,
    path = "/signup",
    request_body(content = SignUpForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = SEE_OTHER, description = "Account created, redirect to sign-in"),
        (status = OK, description = "Form with validation errors", content_type = "text/html", body = String),
        (status = INTERNAL_SERVER_ERROR, description = "Storage or hashing failure")
    )
)]
pub async fn sign_up<B, H, E, P>(
    State(accounts): State<Accounts<B, H, E, P>>,
    Form(form): Form<SignUpForm>,
) -> Result<Response, AccountsError>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    let new_account = match form.validate(accounts.config()) {
        Ok(new_account) => new_account,
        Err(state) => {
            return Ok(page_render(&accounts, Page::SignUp { form: &state })?.into_response());
        }
    };

    let existing = accounts
        .backend()
        .account_find_by_username(&new_account.username)
        .await
        .map_err(AccountsError::from_backend)?;

    if existing.is_some() {
        return username_taken(&accounts, &form);
    }

    let hashed = password_hash(&new_account.password)?;

    // The backend has the final word on uniqueness.
    let Some(account) = accounts
        .backend()
        .account_create_atomic(
            &new_account.username,
            new_account.email.as_deref(),
            &hashed,
        )
        .await
        .map_err(AccountsError::from_backend)?
    else {
        return username_taken(&accounts, &form);
    };

    accounts.hooks().on_sign_up(&account).await;

    tracing::info!(username = %new_account.username, "Account created");

    Ok(Redirect::to(SIGN_IN_PATH).into_response())
}

fn username_taken<B, H, E, P>(
    accounts: &Accounts<B, H, E, P>,
    form: &SignUpForm,
) -> Result<Response, AccountsError>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    let mut state = form.bound();
    state.add_error("username", USERNAME_TAKEN);
    Ok(page_render(accounts, Page::SignUp { form: &state })?.into_response())
}
