//! Sign-in test functions.

use reqwest::{StatusCode, header};

use crate::Account;
use crate::forms::{FIELD_REQUIRED, INVALID_LOGIN};
use crate::handlers::SIGN_IN_PATH;
use crate::pages::escape;

use super::{TestContext, TestUser, location, sign_in_request};

/// `?next=` is carried into the form.
pub async fn sign_in_page_carries_next<C: TestContext>() {
    let (base_url, client, _ctx) = C::spawn().await;

    let response = client
        .get(format!("{base_url}{SIGN_IN_PATH}?next=%2Finbox"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.text().await.unwrap();
    assert!(body.contains("name=\"next\" value=\"/inbox\""));
}

/// Valid credentials set the session cookie, record the sign-in and redirect.
pub async fn sign_in_with_valid_credentials_starts_session<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.accounts_config();
    let user = TestUser::new(&base_url, &client).await;

    let response = sign_in_request(&base_url, &client, &user.username, &user.password, "").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), config.login_redirect_url);

    let session = TestUser::extract_cookie(response.headers(), &config.cookie_session_name)
        .expect("session cookie");
    assert!(!session.is_empty());

    let stored = ctx
        .account_find_by_username(&user.username)
        .await
        .expect("account present after sign-in");
    assert!(
        stored.last_sign_in_at().is_some(),
        "handler should set last_sign_in_at"
    );
    assert_eq!(ctx.sessions_live_count(stored.id()).await, 1);
}

/// Wrong passwords and unknown usernames get the same error and no cookie.
pub async fn sign_in_rejects_bad_credentials_generically<C: TestContext>() {
    let (base_url, client, _ctx) = C::spawn().await;
    let user = TestUser::new(&base_url, &client).await;

    let wrong_password =
        sign_in_request(&base_url, &client, &user.username, "TotallyWrong123", "").await;
    let unknown_user = sign_in_request(&base_url, &client, "nobody", "TotallyWrong123", "").await;

    for response in [wrong_password, unknown_user] {
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get_all(header::SET_COOKIE)
                .iter()
                .count(),
            0,
            "no cookies should be set on failure"
        );
        assert!(response.text().await.unwrap().contains(&escape(INVALID_LOGIN)));
    }
}

/// Inactive accounts cannot sign in, even with the right password.
pub async fn sign_in_rejects_inactive_accounts<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let user = TestUser::new(&base_url, &client).await;
    let account = ctx
        .account_find_by_username(&user.username)
        .await
        .expect("account");

    ctx.account_deactivate(account.id()).await;

    let response = sign_in_request(&base_url, &client, &user.username, &user.password, "").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains(&escape(INVALID_LOGIN)));
    assert_eq!(ctx.sessions_live_count(account.id()).await, 0);
}

/// Empty fields are reported inline.
pub async fn sign_in_requires_both_fields<C: TestContext>() {
    let (base_url, client, _ctx) = C::spawn().await;

    let response = sign_in_request(&base_url, &client, "", "", "").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.text().await.unwrap();
    assert_eq!(body.matches(FIELD_REQUIRED).count(), 2);
}

/// Local `next` paths are honored; anything else falls back to the default.
pub async fn sign_in_follows_only_safe_next<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.accounts_config();
    let user = TestUser::new(&base_url, &client).await;

    let cases = [
        ("/inbox?page=2", "/inbox?page=2"),
        ("https://evil.example/", config.login_redirect_url.as_str()),
        ("//evil.example/", config.login_redirect_url.as_str()),
        ("/\\evil.example/", config.login_redirect_url.as_str()),
    ];

    for (next, expected) in cases {
        let response =
            sign_in_request(&base_url, &client, &user.username, &user.password, next).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), expected, "next = {next}");
    }
}
