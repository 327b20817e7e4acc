//! Sign-up test functions.

use reqwest::{StatusCode, header};

use crate::forms::{PASSWORDS_MISMATCH, USERNAME_TAKEN};
use crate::handlers::{SIGN_IN_PATH, SIGN_UP_PATH};
use crate::pages::escape;

use super::{TestContext, location};

async fn sign_up_post(
    base_url: &str,
    client: &reqwest::Client,
    fields: &[(&str, &str)],
) -> reqwest::Response {
    client
        .post(format!("{base_url}{SIGN_UP_PATH}"))
        .form(fields)
        .send()
        .await
        .expect("sign-up request")
}

/// The form is served to anonymous visitors.
pub async fn sign_up_page_renders_form<C: TestContext>() {
    let (base_url, client, _ctx) = C::spawn().await;

    let response = client
        .get(format!("{base_url}{SIGN_UP_PATH}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.text().await.unwrap();
    assert!(body.contains("name=\"username\""));
    assert!(body.contains("name=\"password\""));
}

/// A valid registration creates the account, starts no session and redirects to sign-in.
pub async fn sign_up_creates_account_and_redirects_to_sign_in<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;

    let response = sign_up_post(
        &base_url,
        &client,
        &[("username", "alice"), ("password", "p@ssW0rd1")],
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), SIGN_IN_PATH);
    assert!(
        response.headers().get(header::SET_COOKIE).is_none(),
        "sign-up must not start a session"
    );
    assert!(ctx.account_find_by_username("alice").await.is_some());
}

/// A taken username, in any case, is a field error and creates nothing.
pub async fn sign_up_rejects_duplicate_username<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let fields = [("username", "alice"), ("password", "p@ssW0rd1")];

    let first = sign_up_post(&base_url, &client, &fields).await;
    assert_eq!(first.status(), StatusCode::SEE_OTHER);

    let second = sign_up_post(&base_url, &client, &fields).await;
    assert_eq!(second.status(), StatusCode::OK);
    let body = second.text().await.unwrap();
    assert!(body.contains(&escape(USERNAME_TAKEN)));
    assert!(body.contains("value=\"alice\""));

    let shouting = sign_up_post(
        &base_url,
        &client,
        &[("username", "ALICE"), ("password", "p@ssW0rd1")],
    )
    .await;
    assert_eq!(shouting.status(), StatusCode::OK);
    assert!(shouting.text().await.unwrap().contains(&escape(USERNAME_TAKEN)));

    assert_eq!(ctx.accounts_count().await, 1);
}

/// Every invalid field is reported at once; secrets are never echoed back.
pub async fn sign_up_rerenders_invalid_fields_without_persisting<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;

    let response = sign_up_post(
        &base_url,
        &client,
        &[
            ("username", "not valid!"),
            ("email", "not-an-email"),
            ("password", "abc"),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.text().await.unwrap();
    assert!(body.contains("Enter a valid username."));
    assert!(body.contains("Enter a valid email address."));
    assert!(body.contains("This password is too short."));
    assert!(body.contains("value=\"not-an-email\""));
    assert!(!body.contains("value=\"abc\""));

    assert_eq!(ctx.accounts_count().await, 0);
}

/// A confirmation that differs from the password is rejected.
pub async fn sign_up_rejects_mismatched_confirmation<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;

    let response = sign_up_post(
        &base_url,
        &client,
        &[
            ("username", "alice"),
            ("password", "p@ssW0rd1"),
            ("password_confirm", "p@ssW0rd2"),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .text()
            .await
            .unwrap()
            .contains(&escape(PASSWORDS_MISMATCH))
    );
    assert!(ctx.account_find_by_username("alice").await.is_none());
}

/// Racing registrations for one username produce exactly one account.
pub async fn concurrent_sign_ups_create_one_account<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;

    let attempts: Vec<_> = (0..5)
        .map(|_| {
            let client = client.clone();
            let url = format!("{base_url}{SIGN_UP_PATH}");
            tokio::spawn(async move {
                client
                    .post(url)
                    .form(&[("username", "racer"), ("password", "p@ssW0rd1")])
                    .send()
                    .await
                    .expect("sign-up request")
                    .status()
            })
        })
        .collect();

    let mut created = 0;
    for attempt in attempts {
        if attempt.await.unwrap() == StatusCode::SEE_OTHER {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(ctx.accounts_count().await, 1);
}
