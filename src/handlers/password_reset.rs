//! Handlers for the password reset flow.
//!
//! Request a link, see the acknowledgment, follow the emailed link to choose
//! a new password, see the confirmation.

use super::page_render;
use crate::{
    Account, Accounts, AccountsBackend, AccountsConfig, AccountsHooks, EmailMessage, EmailSender,
    Page, PageRenderer,
    error::AccountsError,
    forms::{FormState, PasswordResetForm, SetPasswordForm},
    password::password_hash,
    tokens::{token_expiry_calculate, token_hash_sha256, token_with_hash_generate},
};
use axum::{
    Form, Router,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use utoipa::OpenApi;

pub const PASSWORD_RESET_PATH: &str = "/password-reset";
pub const PASSWORD_RESET_DONE_PATH: &str = "/password-reset/done";
pub const PASSWORD_RESET_CONFIRM_PATH: &str = "/password-reset/confirm/{token}";
pub const PASSWORD_RESET_COMPLETE_PATH: &str = "/password-reset/complete";

const PASSWORD_RESET_EMAIL_SUBJECT: &str = "Password reset";

#[derive(OpenApi)]
#[openapi(
    paths(
        password_reset_page,
        password_reset_request,
        password_reset_done,
        password_reset_confirm_page,
        password_reset_confirm,
        password_reset_complete
    ),
    components(schemas(crate::forms::PasswordResetForm, crate::forms::SetPasswordForm))
)]
pub(crate) struct PasswordResetApi;

/// Returns routes for every step of the password reset flow.
pub fn password_reset_routes<B, H, E, P>() -> Router<Accounts<B, H, E, P>>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    Router::new()
        .route(
            PASSWORD_RESET_PATH,
            get(password_reset_page::<B, H, E, P>).post(password_reset_request::<B, H, E, P>),
        )
        .route(
            PASSWORD_RESET_DONE_PATH,
            get(password_reset_done::<B, H, E, P>),
        )
        .route(
            PASSWORD_RESET_CONFIRM_PATH,
            get(password_reset_confirm_page::<B, H, E, P>)
                .post(password_reset_confirm::<B, H, E, P>),
        )
        .route(
            PASSWORD_RESET_COMPLETE_PATH,
            get(password_reset_complete::<B, H, E, P>),
        )
}

/// Path of the confirm page for `token`.
pub fn password_reset_confirm_path(token: &str) -> String {
    PASSWORD_RESET_CONFIRM_PATH.replace("{token}", token)
}

/// Absolute (or, without a base URL, root-relative) reset link for `token`.
fn password_reset_link_build(config: &AccountsConfig, token: &str) -> String {
    let base = config
        .email_link_base_url
        .as_deref()
        .unwrap_or_default()
        .trim_end_matches('/');
    format!("{base}{}", password_reset_confirm_path(token))
}

/// Show the email form.
#[utoipa::path(
    get,
    path = "/password-reset",
    responses(
        (status = OK, description = "Email form", content_type = "text/html", body = String)
    )
)]
pub async fn password_reset_page<B, H, E, P>(
    State(accounts): State<Accounts<B, H, E, P>>,
) -> Result<Response, AccountsError>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    let form = FormState::new();
    Ok(page_render(&accounts, Page::PasswordReset { form: &form })?.into_response())
}

/// Email a reset link to every active account with the given address.
///
/// The response is the same redirect whether or not an account matched.
/// Delivery failures are logged and otherwise ignored.
#[utoipa::path(
    post,
    path = "/password-reset",
    request_body(content = PasswordResetForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = SEE_OTHER, description = "Request accepted, redirect to done"),
        (status = OK, description = "Form with errors", content_type = "text/html", body = String),
        (status = INTERNAL_SERVER_ERROR, description = "Storage failure")
    )
)]
pub async fn password_reset_request<B, H, E, P>(
    State(accounts): State<Accounts<B, H, E, P>>,
    Form(form): Form<PasswordResetForm>,
) -> Result<Response, AccountsError>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    let config = accounts.config();

    let email = match form.validate() {
        Ok(email) => email,
        Err(state) => {
            return Ok(
                page_render(&accounts, Page::PasswordReset { form: &state })?.into_response(),
            );
        }
    };

    let matching = accounts
        .backend()
        .accounts_find_by_email(&email)
        .await
        .map_err(AccountsError::from_backend)?;

    for account in matching.iter().filter(|a| a.is_active()) {
        let (token, token_hash) = token_with_hash_generate();

        accounts
            .backend()
            .reset_token_issue(
                account.id(),
                &token_hash,
                token_expiry_calculate(config.password_reset_token_expiry),
            )
            .await
            .map_err(AccountsError::from_backend)?;

        let reset_link = password_reset_link_build(config, &token);
        let html_body = accounts.render(&Page::PasswordResetEmail {
            username: account.username(),
            reset_link: &reset_link,
            expires_in: config.password_reset_token_expiry,
        })?;

        let message = EmailMessage {
            to: account.email().unwrap_or(email.as_str()).to_owned(),
            subject: PASSWORD_RESET_EMAIL_SUBJECT.to_string(),
            html_body,
        };

        match accounts.email_sender().send(&message).await {
            Ok(()) => tracing::info!(account_id = %account.id(), "Password reset email sent"),
            Err(e) => {
                tracing::error!(account_id = %account.id(), error = %e, "Failed to send password reset email")
            }
        }
    }

    Ok(Redirect::to(PASSWORD_RESET_DONE_PATH).into_response())
}

/// Acknowledge a reset request.
#[utoipa::path(
    get,
    path = "/password-reset/done",
    responses(
        (status = OK, description = "Check your inbox", content_type = "text/html", body = String)
    )
)]
pub async fn password_reset_done<B, H, E, P>(
    State(accounts): State<Accounts<B, H, E, P>>,
) -> Result<Response, AccountsError>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    Ok(page_render(&accounts, Page::PasswordResetDone)?.into_response())
}

/// Show the new-password form, or the invalid-link page.
#[utoipa::path(
    get,
    path = "/password-reset/confirm/{token}",
    params(("token" = String, Path, description = "Token from the emailed link")),
    responses(
        (status = OK, description = "New-password form or invalid-link page", content_type = "text/html", body = String),
        (status = INTERNAL_SERVER_ERROR, description = "Storage failure")
    )
)]
pub async fn password_reset_confirm_page<B, H, E, P>(
    State(accounts): State<Accounts<B, H, E, P>>,
    Path(token): Path<String>,
) -> Result<Response, AccountsError>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    let valid_link = reset_token_is_valid(&accounts, &token).await?;
    let form = FormState::new();

    Ok(page_render(
        &accounts,
        Page::PasswordResetConfirm {
            form: &form,
            valid_link,
        },
    )?
    .into_response())
}

/// Set a new password through a reset link.
///
/// The link is checked before the form. Form errors leave the link usable.
/// On success the token is spent, and every session and other reset link of
/// the account stops working.
#[utoipa::path(
    post,
    path = "/password-reset/confirm/{token}",
    params(("token" = String, Path, description = "Token from the emailed link")),
    request_body(content = SetPasswordForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = SEE_OTHER, description = "Password changed, redirect to complete"),
        (status = OK, description = "Form with errors or invalid-link page", content_type = "text/html", body = String),
        (status = INTERNAL_SERVER_ERROR, description = "Storage or hashing failure")
    )
)]
pub async fn password_reset_confirm<B, H, E, P>(
    State(accounts): State<Accounts<B, H, E, P>>,
    Path(token): Path<String>,
    Form(form): Form<SetPasswordForm>,
) -> Result<Response, AccountsError>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    if !reset_token_is_valid(&accounts, &token).await? {
        return invalid_link(&accounts);
    }

    let new_password = match form.validate(accounts.config()) {
        Ok(password) => password,
        Err(state) => {
            return Ok(page_render(
                &accounts,
                Page::PasswordResetConfirm {
                    form: &state,
                    valid_link: true,
                },
            )?
            .into_response());
        }
    };

    let hashed = password_hash(&new_password)?;

    let applied = accounts
        .backend()
        .password_reset_apply(&token_hash_sha256(&token), &hashed)
        .await
        .map_err(AccountsError::from_backend)?;

    if !applied {
        return invalid_link(&accounts);
    }

    tracing::info!("Password reset applied");

    Ok(Redirect::to(PASSWORD_RESET_COMPLETE_PATH).into_response())
}

/// Confirm the password was changed.
#[utoipa::path(
    get,
    path = "/password-reset/complete",
    responses(
        (status = OK, description = "Password changed", content_type = "text/html", body = String)
    )
)]
pub async fn password_reset_complete<B, H, E, P>(
    State(accounts): State<Accounts<B, H, E, P>>,
) -> Result<Response, AccountsError>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    Ok(page_render(&accounts, Page::PasswordResetComplete)?.into_response())
}

async fn reset_token_is_valid<B, H, E, P>(
    accounts: &Accounts<B, H, E, P>,
    token: &str,
) -> Result<bool, AccountsError>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    let account_id = accounts
        .backend()
        .reset_token_validate(&token_hash_sha256(token))
        .await
        .map_err(AccountsError::from_backend)?;

    Ok(account_id.is_some())
}

fn invalid_link<B, H, E, P>(accounts: &Accounts<B, H, E, P>) -> Result<Response, AccountsError>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    let form = FormState::new();
    Ok(page_render(
        accounts,
        Page::PasswordResetConfirm {
            form: &form,
            valid_link: false,
        },
    )?
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_path_substitutes_token() {
        assert_eq!(
            password_reset_confirm_path("abc123"),
            "/password-reset/confirm/abc123"
        );
    }

    #[test]
    fn reset_link_joins_base_url_without_double_slash() {
        let config = AccountsConfig {
            email_link_base_url: Some("https://example.com/".to_string()),
            ..Default::default()
        };
        assert_eq!(
            password_reset_link_build(&config, "t0k3n"),
            "https://example.com/password-reset/confirm/t0k3n"
        );
    }

    #[test]
    fn reset_link_is_root_relative_without_base_url() {
        let config = AccountsConfig::default();
        assert_eq!(
            password_reset_link_build(&config, "t0k3n"),
            "/password-reset/confirm/t0k3n"
        );
    }
}
