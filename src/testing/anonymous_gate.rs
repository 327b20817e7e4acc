//! Anonymous-only gate test functions.

use reqwest::{StatusCode, header};

use crate::handlers::{SIGN_IN_PATH, SIGN_OUT_PATH, SIGN_UP_PATH};

use super::{TestContext, TestUser, location};

/// Signed-in visitors are redirected away from sign-up and sign-in.
pub async fn signed_in_visitors_are_redirected_from_anonymous_pages<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.accounts_config();
    let user = TestUser::new(&base_url, &client).await;
    let session = user.sign_in(&base_url, &client, config).await;
    let cookie = TestUser::cookie_header(config, &session);

    for path in [SIGN_UP_PATH, SIGN_IN_PATH] {
        let response = client
            .get(format!("{base_url}{path}"))
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&response), config.anonymous_redirect_url);
        assert!(!response.text().await.unwrap().contains("<form"));
    }
}

/// The gate stops the request before the view runs.
pub async fn signed_in_sign_up_post_creates_nothing<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.accounts_config();
    let user = TestUser::new(&base_url, &client).await;
    let session = user.sign_in(&base_url, &client, config).await;

    let response = client
        .post(format!("{base_url}{SIGN_UP_PATH}"))
        .header(header::COOKIE, TestUser::cookie_header(config, &session))
        .form(&[("username", "second"), ("password", "p@ssW0rd1")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(ctx.account_find_by_username("second").await.is_none());
}

/// After signing out the old cookie no longer counts, and is cleared.
pub async fn stale_session_is_anonymous_and_cleared<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.accounts_config();
    let user = TestUser::new(&base_url, &client).await;
    let session = user.sign_in(&base_url, &client, config).await;
    let cookie = TestUser::cookie_header(config, &session);

    client
        .post(format!("{base_url}{SIGN_OUT_PATH}"))
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();

    let response = client
        .get(format!("{base_url}{SIGN_IN_PATH}"))
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        TestUser::extract_cookie(response.headers(), &config.cookie_session_name).as_deref(),
        Some("")
    );
}
