//! Outgoing mail for the password reset flow.
//!
//! The views never talk to a mail transport directly; they hand an
//! [`EmailMessage`] to whatever [`EmailSender`] the [`crate::Accounts`]
//! instance was built with.

use std::future::Future;
use thiserror::Error;

/// A rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
}

/// Error type for email sending operations.
#[derive(Debug, Clone, Error)]
pub enum EmailSendError {
    /// The transport could not be reached or timed out.
    #[error("email transport unavailable: {0}")]
    Transport(String),

    /// The transport refused the message.
    #[error("email rejected: {0}")]
    Rejected(String),
}

/// Async email delivery.
///
/// `()` is a no-op sender that accepts every message.
///
/// # Example
///
/// ```rust,ignore
/// use accounts::{EmailMessage, EmailSendError, EmailSender};
///
/// #[derive(Clone)]
/// struct SmtpRelay { /* ... */ }
///
/// impl EmailSender for SmtpRelay {
///     async fn send(&self, message: &EmailMessage) -> Result<(), EmailSendError> {
///         // hand off to the relay
///         Ok(())
///     }
/// }
/// ```
pub trait EmailSender: Send + Sync + Clone + 'static {
    /// Deliver or enqueue a message.
    fn send(&self, message: &EmailMessage)
    -> impl Future<Output = Result<(), EmailSendError>> + Send;
}

impl EmailSender for () {
    async fn send(&self, _message: &EmailMessage) -> Result<(), EmailSendError> {
        Ok(())
    }
}
