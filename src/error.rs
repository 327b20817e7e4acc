use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::pages::PageRenderError;

/// Errors raised while serving the account views.
///
/// Form validation problems never reach this type through a handler: they are
/// collected in a [`crate::forms::FormState`] and rendered inline. What ends up
/// here is either a helper-level validation failure or an infrastructure
/// failure that aborts the request.
#[derive(Debug, Error)]
pub enum AccountsError {
    #[error("Enter a valid email address.")]
    InvalidEmail,

    #[error("{0}")]
    InvalidUsername(String),

    #[error("Password too weak: {0}")]
    WeakPassword(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Page rendering error: {0}")]
    Render(#[from] PageRenderError),

    #[error("backend error: {0}")]
    Backend(String),
}

impl AccountsError {
    /// Wrap a storage error coming out of an [`crate::AccountsBackend`].
    pub fn from_backend<E: std::error::Error>(error: E) -> Self {
        Self::Backend(error.to_string())
    }
}

impl IntoResponse for AccountsError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AccountsError::InvalidEmail
            | AccountsError::InvalidUsername(_)
            | AccountsError::WeakPassword(_) => (StatusCode::BAD_REQUEST, "Bad Request (400)"),
            AccountsError::PasswordHash(ref msg) => {
                tracing::error!("Password hashing error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server Error (500)")
            }
            AccountsError::Render(ref err) => {
                tracing::error!(error = %err, "Page rendering error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server Error (500)")
            }
            AccountsError::Backend(ref msg) => {
                tracing::error!("Backend error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server Error (500)")
            }
        };

        // Plain markup, independent of the page renderer.
        let body = Html(format!(
            "<!DOCTYPE html>\n<html><head><title>{message}</title></head><body><h1>{message}</h1></body></html>"
        ));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_errors_hide_details() {
        let response = AccountsError::Backend("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        let response = AccountsError::InvalidEmail.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
