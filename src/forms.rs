//! Form payloads and inline validation.
//!
//! Every field deserializes with a default so that a missing field becomes an
//! inline "required" error instead of an extractor rejection. A failed
//! validation yields a [`FormState`] carrying the submitted non-secret values
//! and one or more messages per field.

use serde::Deserialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::{
    config::AccountsConfig,
    email::{email_normalize, username_normalize},
    password::password_validate,
};

pub const FIELD_REQUIRED: &str = "This field is required.";
pub const USERNAME_TAKEN: &str = "This username is already taken.";
pub const PASSWORDS_MISMATCH: &str = "The two password fields didn't match.";
pub const INVALID_LOGIN: &str = "Please enter a correct username and password.";

/// Bound form data with validation errors, as handed to the page renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    values: BTreeMap<&'static str, String>,
    errors: BTreeMap<&'static str, Vec<String>>,
    non_field_errors: Vec<String>,
}

impl FormState {
    /// An unbound form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo a submitted value back into the form.
    pub fn with_value(mut self, field: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(field, value.into());
        self
    }

    pub fn value(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or_default()
    }

    pub fn add_error(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.entry(field).or_default().push(message.into());
    }

    pub fn add_non_field_error(&mut self, message: impl Into<String>) {
        self.non_field_errors.push(message.into());
    }

    pub fn field_errors(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn non_field_errors(&self) -> &[String] {
        &self.non_field_errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.non_field_errors.is_empty()
    }
}

/// Registration form.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct SignUpForm {
    /// Letters, digits and `@ . + - _`.
    pub username: String,
    /// Optional; needed to receive password reset links.
    pub email: String,
    pub password: String,
    /// Checked against `password` when non-empty.
    pub password_confirm: String,
}

/// A registration that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
}

impl SignUpForm {
    /// The submitted values minus the secrets.
    pub fn bound(&self) -> FormState {
        FormState::new()
            .with_value("username", self.username.trim())
            .with_value("email", self.email.trim())
    }

    pub fn validate(&self, config: &AccountsConfig) -> Result<NewAccount, FormState> {
        let mut state = self.bound();

        let username = if self.username.trim().is_empty() {
            state.add_error("username", FIELD_REQUIRED);
            None
        } else {
            match username_normalize(&self.username, config) {
                Ok(username) => Some(username),
                Err(e) => {
                    state.add_error("username", e.to_string());
                    None
                }
            }
        };

        let email = if self.email.trim().is_empty() {
            None
        } else {
            match email_normalize(&self.email) {
                Ok(email) => Some(email),
                Err(e) => {
                    state.add_error("email", e.to_string());
                    None
                }
            }
        };

        if self.password.is_empty() {
            state.add_error("password", FIELD_REQUIRED);
        } else if let Err(e) = password_validate(&self.password, config) {
            state.add_error("password", weak_password_message(e));
        }

        if !self.password_confirm.is_empty() && self.password_confirm != self.password {
            state.add_error("password_confirm", PASSWORDS_MISMATCH);
        }

        match username {
            Some(username) if state.is_valid() => Ok(NewAccount {
                username,
                email,
                password: self.password.clone(),
            }),
            _ => Err(state),
        }
    }
}

/// Sign-in form.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct SignInForm {
    pub username: String,
    pub password: String,
    /// Local path to continue to after signing in.
    pub next: String,
}

impl SignInForm {
    pub fn bound(&self) -> FormState {
        FormState::new()
            .with_value("username", self.username.trim())
            .with_value("next", self.next.as_str())
    }

    /// Only presence is checked here; credentials are verified by the handler.
    pub fn validate(&self) -> Result<(), FormState> {
        let mut state = self.bound();

        if self.username.trim().is_empty() {
            state.add_error("username", FIELD_REQUIRED);
        }
        if self.password.is_empty() {
            state.add_error("password", FIELD_REQUIRED);
        }

        if state.is_valid() { Ok(()) } else { Err(state) }
    }
}

/// Password reset request form.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct PasswordResetForm {
    pub email: String,
}

impl PasswordResetForm {
    pub fn bound(&self) -> FormState {
        FormState::new().with_value("email", self.email.trim())
    }

    /// Returns the normalized email.
    pub fn validate(&self) -> Result<String, FormState> {
        let mut state = self.bound();

        if self.email.trim().is_empty() {
            state.add_error("email", FIELD_REQUIRED);
            return Err(state);
        }

        email_normalize(&self.email).map_err(|e| {
            state.add_error("email", e.to_string());
            state
        })
    }
}

/// New password form shown behind a valid reset link.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct SetPasswordForm {
    pub new_password1: String,
    pub new_password2: String,
}

impl SetPasswordForm {
    /// Returns the accepted password.
    pub fn validate(&self, config: &AccountsConfig) -> Result<String, FormState> {
        let mut state = FormState::new();

        if self.new_password1.is_empty() {
            state.add_error("new_password1", FIELD_REQUIRED);
        }
        if self.new_password2.is_empty() {
            state.add_error("new_password2", FIELD_REQUIRED);
        }
        if !state.is_valid() {
            return Err(state);
        }

        if self.new_password1 != self.new_password2 {
            state.add_error("new_password2", PASSWORDS_MISMATCH);
        } else if let Err(e) = password_validate(&self.new_password2, config) {
            state.add_error("new_password2", weak_password_message(e));
        }

        if state.is_valid() {
            Ok(self.new_password2.clone())
        } else {
            Err(state)
        }
    }
}

fn weak_password_message(error: crate::AccountsError) -> String {
    match error {
        crate::AccountsError::WeakPassword(message) => message,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_up(username: &str, email: &str, password: &str, confirm: &str) -> SignUpForm {
        SignUpForm {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        }
    }

    #[test]
    fn sign_up_accepts_minimal_registration() {
        let config = AccountsConfig::default();
        let account = sign_up("alice", "", "p@ssW0rd1", "")
            .validate(&config)
            .expect("valid form");

        assert_eq!(account.username, "alice");
        assert_eq!(account.email, None);
        assert_eq!(account.password, "p@ssW0rd1");
    }

    #[test]
    fn sign_up_normalizes_email() {
        let config = AccountsConfig::default();
        let account = sign_up("bob", " Bob@Example.COM ", "p@ssW0rd1", "p@ssW0rd1")
            .validate(&config)
            .expect("valid form");

        assert_eq!(account.email.as_deref(), Some("bob@example.com"));
    }

    #[test]
    fn sign_up_reports_every_invalid_field() {
        let config = AccountsConfig::default();
        let state = sign_up("", "nope", "short", "different")
            .validate(&config)
            .expect_err("invalid form");

        assert_eq!(state.field_errors("username"), [FIELD_REQUIRED]);
        assert_eq!(state.field_errors("email").len(), 1);
        assert_eq!(state.field_errors("password").len(), 1);
        assert_eq!(state.field_errors("password_confirm"), [PASSWORDS_MISMATCH]);
    }

    #[test]
    fn sign_up_never_echoes_passwords() {
        let config = AccountsConfig::default();
        let state = sign_up("alice", "", "short", "")
            .validate(&config)
            .expect_err("weak password");

        assert_eq!(state.value("username"), "alice");
        assert_eq!(state.value("password"), "");
    }

    #[test]
    fn sign_in_requires_both_fields() {
        let state = SignInForm::default().validate().expect_err("empty form");
        assert_eq!(state.field_errors("username"), [FIELD_REQUIRED]);
        assert_eq!(state.field_errors("password"), [FIELD_REQUIRED]);
    }

    #[test]
    fn password_reset_rejects_malformed_email() {
        let state = PasswordResetForm {
            email: "not-an-email".to_string(),
        }
        .validate()
        .expect_err("malformed email");

        assert_eq!(state.value("email"), "not-an-email");
        assert_eq!(state.field_errors("email").len(), 1);
    }

    #[test]
    fn set_password_requires_matching_strong_passwords() {
        let config = AccountsConfig::default();

        let mismatch = SetPasswordForm {
            new_password1: "NewSecure456".to_string(),
            new_password2: "NewSecure457".to_string(),
        }
        .validate(&config)
        .expect_err("mismatch");
        assert_eq!(mismatch.field_errors("new_password2"), [PASSWORDS_MISMATCH]);

        let weak = SetPasswordForm {
            new_password1: "weak".to_string(),
            new_password2: "weak".to_string(),
        }
        .validate(&config)
        .expect_err("weak");
        assert_eq!(weak.field_errors("new_password2").len(), 1);

        let ok = SetPasswordForm {
            new_password1: "NewSecure456".to_string(),
            new_password2: "NewSecure456".to_string(),
        }
        .validate(&config);
        assert_eq!(ok, Ok("NewSecure456".to_string()));
    }
}
