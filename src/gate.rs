//! Guard for pages only anonymous visitors may see.

use crate::{
    Accounts, AccountsBackend, AccountsHooks, EmailSender, PageRenderer, SessionState,
};
use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

/// Redirect signed-in visitors away from anonymous-only pages.
///
/// Signed-in requests are answered with a redirect to
/// `AccountsConfig::anonymous_redirect_url` and never reach the handler.
/// Everything else passes through untouched.
///
/// Must run inside [`crate::middleware::base`]; use it as a `route_layer`.
pub async fn anonymous_only<B, H, E, P>(
    State(accounts): State<Accounts<B, H, E, P>>,
    request: Request<Body>,
    next: Next,
) -> Response
where
    B: AccountsBackend,
    H: AccountsHooks<B::Account>,
    E: EmailSender,
    P: PageRenderer,
{
    if let Some(SessionState::Authenticated { account_id, .. }) =
        request.extensions().get::<SessionState>()
    {
        tracing::debug!(
            account_id = %account_id,
            path = %request.uri().path(),
            "Signed-in visitor redirected from anonymous-only page"
        );
        return Redirect::to(&accounts.config().anonymous_redirect_url).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountsConfig, DefaultPages, memory::MemoryBackend};
    use axum::{
        Router,
        http::{self, StatusCode, header},
        middleware,
        routing::get,
    };
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use tower::util::ServiceExt;
    use uuid::Uuid;

    fn app(state: SessionState, hits: Arc<AtomicUsize>) -> Router {
        let config = AccountsConfig {
            anonymous_redirect_url: "/home".to_string(),
            ..Default::default()
        };
        let accounts = Accounts::new(config, MemoryBackend::default()).unwrap();

        let inject = move |mut req: Request<Body>, next: Next| {
            let state = state.clone();
            async move {
                req.extensions_mut().insert(state);
                next.run(req).await
            }
        };

        Router::new()
            .route(
                "/",
                get(move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        "page"
                    }
                }),
            )
            .route_layer(middleware::from_fn_with_state(
                accounts,
                anonymous_only::<MemoryBackend, (), (), DefaultPages>,
            ))
            .layer(middleware::from_fn(inject))
    }

    #[tokio::test]
    async fn anonymous_visitors_pass_through() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(SessionState::Anonymous, hits.clone())
            .oneshot(http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn signed_in_visitors_are_redirected_without_running_the_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let state = SessionState::Authenticated {
            account_id: Uuid::new_v4(),
            username: "alice".to_string(),
        };

        let response = app(state, hits.clone())
            .oneshot(http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/home");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
