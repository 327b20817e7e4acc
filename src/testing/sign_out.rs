//! Sign-out test functions.

use reqwest::{StatusCode, header};

use crate::Account;
use crate::handlers::SIGN_OUT_PATH;

use super::{TestContext, TestUser};

fn assert_cookie_cleared(response: &reqwest::Response, name: &str) {
    let value = TestUser::extract_cookie(response.headers(), name);
    assert_eq!(value.as_deref(), Some(""), "session cookie must be cleared");
}

/// Signing out revokes the session server-side and clears the cookie.
pub async fn sign_out_revokes_session_and_clears_cookie<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.accounts_config();
    let user = TestUser::new(&base_url, &client).await;
    let session = user.sign_in(&base_url, &client, config).await;
    let account = ctx
        .account_find_by_username(&user.username)
        .await
        .expect("account");
    assert_eq!(ctx.sessions_live_count(account.id()).await, 1);

    let response = client
        .post(format!("{base_url}{SIGN_OUT_PATH}"))
        .header(header::COOKIE, TestUser::cookie_header(config, &session))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_cookie_cleared(&response, &config.cookie_session_name);
    assert_eq!(ctx.sessions_live_count(account.id()).await, 0);
    assert!(response.text().await.unwrap().contains("Signed out"));
}

/// A plain link to the sign-out page works too.
pub async fn sign_out_via_get_revokes_session<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.accounts_config();
    let user = TestUser::new(&base_url, &client).await;
    let session = user.sign_in(&base_url, &client, config).await;
    let account = ctx
        .account_find_by_username(&user.username)
        .await
        .expect("account");

    let response = client
        .get(format!("{base_url}{SIGN_OUT_PATH}"))
        .header(header::COOKIE, TestUser::cookie_header(config, &session))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ctx.sessions_live_count(account.id()).await, 0);
}

/// Without a session the page is the same, every time.
pub async fn sign_out_without_session_is_idempotent<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.accounts_config();

    for _ in 0..2 {
        let response = client
            .post(format!("{base_url}{SIGN_OUT_PATH}"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_cookie_cleared(&response, &config.cookie_session_name);
    }
}

/// A forged or already revoked session is not an error.
pub async fn sign_out_with_unknown_session_clears_cookie<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.accounts_config();

    let response = client
        .post(format!("{base_url}{SIGN_OUT_PATH}"))
        .header(header::COOKIE, TestUser::cookie_header(config, "forged"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_cookie_cleared(&response, &config.cookie_session_name);
}
