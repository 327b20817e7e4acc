//! Request extractors for session state.

use crate::handlers::SIGN_IN_PATH;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::Redirect;
use std::convert::Infallible;
use uuid::Uuid;

/// Who is making the request, as resolved by [`crate::middleware::base`].
///
/// Extracting it never fails: without the middleware every request is anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated {
        account_id: Uuid,
        username: String,
    },
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }

    pub fn account_id(&self) -> Option<Uuid> {
        match self {
            SessionState::Authenticated { account_id, .. } => Some(*account_id),
            SessionState::Anonymous => None,
        }
    }
}

impl<S> FromRequestParts<S> for SessionState
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<SessionState>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Signed-in account extractor.
///
/// Anonymous visitors are redirected to the sign-in page with the current
/// path in `next`, so they come back here after signing in.
///
/// **Requires**: the `accounts::middleware::base` middleware on the route.
///
/// # Example
///
/// ```rust,ignore
/// use accounts::CurrentAccount;
///
/// async fn dashboard(account: CurrentAccount) -> String {
///     format!("Hello, {}!", account.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentAccount {
    pub account_id: Uuid,
    pub username: String,
}

impl<S> FromRequestParts<S> for CurrentAccount
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<SessionState>() {
            Some(SessionState::Authenticated {
                account_id,
                username,
            }) => Ok(CurrentAccount {
                account_id: *account_id,
                username: username.clone(),
            }),
            _ => {
                let here = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                let next: String = url::form_urlencoded::byte_serialize(here.as_bytes()).collect();
                Err(Redirect::to(&format!("{SIGN_IN_PATH}?next={next}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn session_state_defaults_to_anonymous() {
        let (mut parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        let state = SessionState::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(state, SessionState::Anonymous);
        assert!(!state.is_authenticated());
    }

    #[tokio::test]
    async fn current_account_redirects_anonymous_visitors_with_next() {
        let (mut parts, _) = Request::builder()
            .uri("/inbox?page=2")
            .body(())
            .unwrap()
            .into_parts();

        let redirect = CurrentAccount::from_request_parts(&mut parts, &())
            .await
            .expect_err("anonymous visitor");
        let response = axum::response::IntoResponse::into_response(redirect);
        assert_eq!(
            response.headers()[axum::http::header::LOCATION],
            "/signin?next=%2Finbox%3Fpage%3D2"
        );
    }

    #[tokio::test]
    async fn current_account_reads_authenticated_session() {
        let account_id = Uuid::new_v4();
        let (mut parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        parts.extensions.insert(SessionState::Authenticated {
            account_id,
            username: "alice".to_string(),
        });

        let account = CurrentAccount::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(account.account_id, account_id);
        assert_eq!(account.username, "alice");
    }
}
