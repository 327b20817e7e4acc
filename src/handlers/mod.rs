//! Account view handlers.

pub mod password_reset;
pub mod sign_in;
pub mod sign_out;
pub mod sign_up;

pub use password_reset::{
    PASSWORD_RESET_COMPLETE_PATH, PASSWORD_RESET_CONFIRM_PATH, PASSWORD_RESET_DONE_PATH,
    PASSWORD_RESET_PATH, password_reset_confirm_path, password_reset_routes,
};
pub use sign_in::{SIGN_IN_PATH, redirect_target_is_safe, sign_in_routes};
pub use sign_out::{SIGN_OUT_PATH, sign_out_routes};
pub use sign_up::{SIGN_UP_PATH, sign_up_routes};

use crate::{
    Accounts, AccountsBackend, AccountsHooks, EmailSender, Page, PageRenderer, error::AccountsError,
};
use axum::response::Html;

/// Render a page as a 200 HTML response.
fn page_render<B, H, E, P>(
    accounts: &Accounts<B, H, E, P>,
    page: Page<'_>,
) -> Result<Html<String>, AccountsError>
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    Ok(Html(accounts.render(&page)?))
}
