//! Password reset test functions.

use reqwest::{Client, StatusCode, header};

use crate::Account;
use crate::forms::{FIELD_REQUIRED, INVALID_LOGIN, PASSWORDS_MISMATCH};
use crate::handlers::{
    PASSWORD_RESET_COMPLETE_PATH, PASSWORD_RESET_DONE_PATH, PASSWORD_RESET_PATH,
    password_reset_confirm_path,
};
use crate::pages::escape;

use super::{TestContext, TestUser, location, reset_token_from_email, sign_in_request};

const NEW_PASSWORD: &str = "BrandNewPass456";

async fn reset_request(base_url: &str, client: &Client, email: &str) -> reqwest::Response {
    client
        .post(format!("{base_url}{PASSWORD_RESET_PATH}"))
        .form(&[("email", email)])
        .send()
        .await
        .expect("password reset request")
}

async fn confirm_post(
    base_url: &str,
    client: &Client,
    token: &str,
    new_password1: &str,
    new_password2: &str,
) -> reqwest::Response {
    client
        .post(format!("{base_url}{}", password_reset_confirm_path(token)))
        .form(&[
            ("new_password1", new_password1),
            ("new_password2", new_password2),
        ])
        .send()
        .await
        .expect("password reset confirm")
}

async fn confirm_page(base_url: &str, client: &Client, token: &str) -> String {
    let response = client
        .get(format!("{base_url}{}", password_reset_confirm_path(token)))
        .send()
        .await
        .expect("password reset confirm page");
    assert_eq!(response.status(), StatusCode::OK);
    response.text().await.unwrap()
}

/// Request a reset for `user` and return the token from the email.
async fn reset_token_obtain<C: TestContext>(
    base_url: &str,
    client: &Client,
    ctx: &C,
    user: &TestUser,
) -> String {
    let response = reset_request(base_url, client, &user.email).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let emails = ctx.emails_sent().await;
    let email = emails
        .iter()
        .rev()
        .find(|m| m.to == user.email)
        .expect("reset email sent");
    reset_token_from_email(email).expect("reset link in email")
}

fn assert_invalid_link(body: &str) {
    assert!(body.contains("Invalid password reset link"));
    assert!(!body.contains("<form"));
}

/// A known address receives one email with a link; the visitor lands on Done.
pub async fn password_reset_request_emails_link<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let user = TestUser::new(&base_url, &client).await;

    let response = reset_request(&base_url, &client, &user.email.to_uppercase()).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), PASSWORD_RESET_DONE_PATH);

    let emails = ctx.emails_sent().await;
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].to, user.email);
    assert_eq!(emails[0].subject, "Password reset");
    assert!(emails[0].html_body.contains(&user.username));
    assert!(reset_token_from_email(&emails[0]).is_some());

    let done = client
        .get(format!("{base_url}{PASSWORD_RESET_DONE_PATH}"))
        .send()
        .await
        .unwrap();
    assert_eq!(done.status(), StatusCode::OK);
}

/// Unknown addresses look exactly like known ones from the outside.
pub async fn password_reset_unknown_email_sends_nothing<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;

    let response = reset_request(&base_url, &client, "nobody@example.com").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), PASSWORD_RESET_DONE_PATH);
    assert!(ctx.emails_sent().await.is_empty());
}

/// The email field is required and must be a valid address.
pub async fn password_reset_request_validates_email<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;

    let invalid = reset_request(&base_url, &client, "not-an-email").await;
    assert_eq!(invalid.status(), StatusCode::OK);
    assert!(
        invalid
            .text()
            .await
            .unwrap()
            .contains("Enter a valid email address.")
    );

    let empty = reset_request(&base_url, &client, "").await;
    assert_eq!(empty.status(), StatusCode::OK);
    assert!(empty.text().await.unwrap().contains(FIELD_REQUIRED));

    assert!(ctx.emails_sent().await.is_empty());
}

/// Inactive accounts are never sent a link.
pub async fn password_reset_skips_inactive_accounts<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let user = TestUser::new(&base_url, &client).await;
    let account = ctx
        .account_find_by_username(&user.username)
        .await
        .expect("account");
    ctx.account_deactivate(account.id()).await;

    let response = reset_request(&base_url, &client, &user.email).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(ctx.emails_sent().await.is_empty());
}

/// Following the link changes the password and ends every session.
pub async fn password_reset_confirm_sets_password_and_revokes_sessions<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.accounts_config();
    let user = TestUser::new(&base_url, &client).await;
    let session = user.sign_in(&base_url, &client, config).await;
    let account = ctx
        .account_find_by_username(&user.username)
        .await
        .expect("account");
    assert_eq!(ctx.sessions_live_count(account.id()).await, 1);

    let token = reset_token_obtain(&base_url, &client, &ctx, &user).await;

    let page = confirm_page(&base_url, &client, &token).await;
    assert!(page.contains("name=\"new_password1\""));

    let response = confirm_post(&base_url, &client, &token, NEW_PASSWORD, NEW_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), PASSWORD_RESET_COMPLETE_PATH);

    assert_eq!(ctx.sessions_live_count(account.id()).await, 0);
    let stale = client
        .get(format!("{base_url}{}", crate::handlers::SIGN_IN_PATH))
        .header(header::COOKIE, TestUser::cookie_header(config, &session))
        .send()
        .await
        .unwrap();
    assert_eq!(stale.status(), StatusCode::OK, "old session must be gone");

    let old = sign_in_request(&base_url, &client, &user.username, &user.password, "").await;
    assert_eq!(old.status(), StatusCode::OK);
    assert!(old.text().await.unwrap().contains(&escape(INVALID_LOGIN)));

    let new = sign_in_request(&base_url, &client, &user.username, NEW_PASSWORD, "").await;
    assert_eq!(new.status(), StatusCode::SEE_OTHER);

    let complete = client
        .get(format!("{base_url}{PASSWORD_RESET_COMPLETE_PATH}"))
        .send()
        .await
        .unwrap();
    assert_eq!(complete.status(), StatusCode::OK);
}

/// A link works once; replaying it changes nothing.
pub async fn password_reset_link_is_single_use<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let user = TestUser::new(&base_url, &client).await;
    let token = reset_token_obtain(&base_url, &client, &ctx, &user).await;

    let first = confirm_post(&base_url, &client, &token, NEW_PASSWORD, NEW_PASSWORD).await;
    assert_eq!(first.status(), StatusCode::SEE_OTHER);

    assert_invalid_link(&confirm_page(&base_url, &client, &token).await);

    let replay = confirm_post(&base_url, &client, &token, "Another789x", "Another789x").await;
    assert_eq!(replay.status(), StatusCode::OK);
    assert_invalid_link(&replay.text().await.unwrap());

    let signed_in = sign_in_request(&base_url, &client, &user.username, NEW_PASSWORD, "").await;
    assert_eq!(signed_in.status(), StatusCode::SEE_OTHER);
}

/// Expired links show the invalid-link page and leave the password alone.
pub async fn password_reset_rejects_expired_link<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let user = TestUser::new(&base_url, &client).await;
    let token = reset_token_obtain(&base_url, &client, &ctx, &user).await;
    let account = ctx
        .account_find_by_username(&user.username)
        .await
        .expect("account");

    ctx.reset_tokens_expire(account.id()).await;

    assert_invalid_link(&confirm_page(&base_url, &client, &token).await);

    let response = confirm_post(&base_url, &client, &token, NEW_PASSWORD, NEW_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_invalid_link(&response.text().await.unwrap());

    let signed_in = sign_in_request(&base_url, &client, &user.username, &user.password, "").await;
    assert_eq!(signed_in.status(), StatusCode::SEE_OTHER);
}

/// Form errors re-render the form and do not spend the link.
pub async fn password_reset_mismatch_keeps_link_usable<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let user = TestUser::new(&base_url, &client).await;
    let token = reset_token_obtain(&base_url, &client, &ctx, &user).await;

    let response = confirm_post(&base_url, &client, &token, NEW_PASSWORD, "Different456x").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains(&escape(PASSWORDS_MISMATCH)));
    assert!(body.contains("name=\"new_password1\""));

    let page = confirm_page(&base_url, &client, &token).await;
    assert!(page.contains("name=\"new_password1\""));

    let response = confirm_post(&base_url, &client, &token, NEW_PASSWORD, NEW_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

/// Made-up tokens are treated like expired ones.
pub async fn password_reset_rejects_unknown_link<C: TestContext>() {
    let (base_url, client, _ctx) = C::spawn().await;

    assert_invalid_link(&confirm_page(&base_url, &client, "deadbeef").await);

    let response = confirm_post(&base_url, &client, "deadbeef", NEW_PASSWORD, NEW_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_invalid_link(&response.text().await.unwrap());
}
