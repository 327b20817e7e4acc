//! Server-rendered pages.
//!
//! Handlers describe *what* to show with a [`Page`]; a [`PageRenderer`] turns
//! it into HTML. [`DefaultPages`] is a dependency-free renderer producing
//! plain, unstyled markup. Swap in your own renderer to use a template engine.

use std::fmt::Write;
use std::time::Duration;
use thiserror::Error;

use crate::forms::FormState;
use crate::handlers::{PASSWORD_RESET_PATH, SIGN_IN_PATH, SIGN_UP_PATH};

/// A page the views can ask to render.
#[derive(Debug, Clone, Copy)]
pub enum Page<'a> {
    /// Registration form.
    SignUp { form: &'a FormState },
    /// Sign-in form; a `next` value travels as a hidden field.
    SignIn { form: &'a FormState },
    /// Shown after signing out.
    SignedOut,
    /// Email form that starts a password reset.
    PasswordReset { form: &'a FormState },
    /// Acknowledgment after a reset request.
    PasswordResetDone,
    /// New-password form, or the invalid-link state when `valid_link` is false.
    PasswordResetConfirm {
        form: &'a FormState,
        valid_link: bool,
    },
    /// Acknowledgment after the password was changed.
    PasswordResetComplete,
    /// Body of the email carrying the reset link.
    PasswordResetEmail {
        username: &'a str,
        reset_link: &'a str,
        expires_in: Duration,
    },
}

impl Page<'_> {
    /// Conventional template name for this page.
    pub fn template_name(&self) -> &'static str {
        match self {
            Page::SignUp { .. } => "registration/signup.html",
            Page::SignIn { .. } => "registration/signin.html",
            Page::SignedOut => "registration/signout.html",
            Page::PasswordReset { .. } => "registration/password_reset.html",
            Page::PasswordResetDone => "registration/password_reset_done.html",
            Page::PasswordResetConfirm { .. } => "registration/password_reset_confirm.html",
            Page::PasswordResetComplete => "registration/password_reset_complete.html",
            Page::PasswordResetEmail { .. } => "registration/password_reset_email.html",
        }
    }
}

/// Failure to turn a [`Page`] into HTML.
#[derive(Debug, Error)]
#[error("failed to render {template}: {message}")]
pub struct PageRenderError {
    /// Template that failed.
    pub template: &'static str,
    /// Renderer-specific detail.
    pub message: String,
}

/// Renders pages to HTML.
///
/// Implementations must escape every value taken from a [`FormState`] or a
/// page field.
pub trait PageRenderer: Send + Sync + Clone + 'static {
    fn render(&self, page: &Page<'_>) -> Result<String, PageRenderError>;
}

/// Built-in renderer with minimal markup.
#[derive(Debug, Clone)]
pub struct DefaultPages {
    site_name: String,
}

impl Default for DefaultPages {
    fn default() -> Self {
        Self::new("Accounts")
    }
}

impl DefaultPages {
    pub fn new(site_name: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
        }
    }
}

impl PageRenderer for DefaultPages {
    fn render(&self, page: &Page<'_>) -> Result<String, PageRenderError> {
        let (title, body) = match *page {
            Page::SignUp { form } => {
                let mut body = String::from("<h1>Sign up</h1>\n");
                form_open(&mut body, form);
                text_input(&mut body, form, "username", "Username", "text");
                text_input(&mut body, form, "email", "Email (optional)", "email");
                secret_input(&mut body, form, "password", "Password");
                secret_input(&mut body, form, "password_confirm", "Password confirmation");
                form_close(&mut body, "Sign up");
                let _ = write!(
                    body,
                    "<p>Already have an account? <a href=\"{SIGN_IN_PATH}\">Sign in</a></p>\n"
                );
                ("Sign up", body)
            }
            Page::SignIn { form } => {
                let mut body = String::from("<h1>Sign in</h1>\n");
                form_open(&mut body, form);
                text_input(&mut body, form, "username", "Username", "text");
                secret_input(&mut body, form, "password", "Password");
                let next = form.value("next");
                if !next.is_empty() {
                    let _ = writeln!(
                        body,
                        "<input type=\"hidden\" name=\"next\" value=\"{}\">",
                        escape(next)
                    );
                }
                form_close(&mut body, "Sign in");
                let _ = write!(
                    body,
                    "<p><a href=\"{PASSWORD_RESET_PATH}\">Forgot your password?</a></p>\n\
                     <p>No account yet? <a href=\"{SIGN_UP_PATH}\">Sign up</a></p>\n"
                );
                ("Sign in", body)
            }
            Page::SignedOut => (
                "Signed out",
                format!(
                    "<h1>Signed out</h1>\n<p>You have been signed out.</p>\n\
                     <p><a href=\"{SIGN_IN_PATH}\">Sign in again</a></p>\n"
                ),
            ),
            Page::PasswordReset { form } => {
                let mut body = String::from(
                    "<h1>Password reset</h1>\n\
                     <p>Enter your email address and we will send you a link to choose a new password.</p>\n",
                );
                form_open(&mut body, form);
                text_input(&mut body, form, "email", "Email", "email");
                form_close(&mut body, "Send reset link");
                ("Password reset", body)
            }
            Page::PasswordResetDone => (
                "Password reset sent",
                "<h1>Check your inbox</h1>\n\
                 <p>If an account exists with the email you entered, you will receive a link to set a new password shortly.</p>\n"
                    .to_string(),
            ),
            Page::PasswordResetConfirm {
                valid_link: false, ..
            } => (
                "Invalid password reset link",
                format!(
                    "<h1>Invalid password reset link</h1>\n\
                     <p>This password reset link is invalid, possibly because it has already been used or has expired.</p>\n\
                     <p><a href=\"{PASSWORD_RESET_PATH}\">Request a new password reset</a></p>\n"
                ),
            ),
            Page::PasswordResetConfirm {
                form,
                valid_link: true,
            } => {
                let mut body = String::from("<h1>Choose a new password</h1>\n");
                form_open(&mut body, form);
                secret_input(&mut body, form, "new_password1", "New password");
                secret_input(&mut body, form, "new_password2", "New password confirmation");
                form_close(&mut body, "Change my password");
                ("Choose a new password", body)
            }
            Page::PasswordResetComplete => (
                "Password changed",
                format!(
                    "<h1>Password changed</h1>\n<p>Your password has been set.</p>\n\
                     <p><a href=\"{SIGN_IN_PATH}\">Sign in</a></p>\n"
                ),
            ),
            Page::PasswordResetEmail {
                username,
                reset_link,
                expires_in,
            } => {
                let hours = expires_in.as_secs().div_ceil(3600);
                let link = escape(reset_link);
                (
                    "Password reset",
                    format!(
                        "<p>Hello {},</p>\n\
                         <p>Someone asked to reset the password for your account. Follow this link to choose a new one:</p>\n\
                         <p><a href=\"{link}\">{link}</a></p>\n\
                         <p>The link expires in {hours} hour(s). If you did not ask for this, you can ignore this email.</p>\n",
                        escape(username),
                    ),
                )
            }
        };

        Ok(layout(&self.site_name, title, &body))
    }
}

fn layout(site_name: &str, title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{} | {}</title>\n</head>\n<body>\n<main>\n{body}</main>\n</body>\n</html>\n",
        escape(title),
        escape(site_name),
    )
}

fn form_open(out: &mut String, form: &FormState) {
    out.push_str("<form method=\"post\">\n");
    error_list(out, form.non_field_errors());
}

fn form_close(out: &mut String, submit: &str) {
    let _ = writeln!(out, "<button type=\"submit\">{}</button>\n</form>", escape(submit));
}

fn text_input(out: &mut String, form: &FormState, name: &str, label: &str, kind: &str) {
    let _ = writeln!(
        out,
        "<p><label for=\"id_{name}\">{}</label>\n\
         <input type=\"{kind}\" name=\"{name}\" id=\"id_{name}\" value=\"{}\"></p>",
        escape(label),
        escape(form.value(name)),
    );
    error_list(out, form.field_errors(name));
}

fn secret_input(out: &mut String, form: &FormState, name: &str, label: &str) {
    let _ = writeln!(
        out,
        "<p><label for=\"id_{name}\">{}</label>\n\
         <input type=\"password\" name=\"{name}\" id=\"id_{name}\" autocomplete=\"off\"></p>",
        escape(label),
    );
    error_list(out, form.field_errors(name));
}

fn error_list(out: &mut String, errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    out.push_str("<ul class=\"errorlist\">\n");
    for error in errors {
        let _ = writeln!(out, "<li>{}</li>", escape(error));
    }
    out.push_str("</ul>\n");
}

/// Escape text for use in HTML element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_neutralizes_markup() {
        assert_eq!(
            escape("<a href=\"x\">'&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&#x27;&amp;&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn sign_up_page_echoes_values_and_errors_escaped() {
        let mut form = FormState::new().with_value("username", "<bob>");
        form.add_error("username", "This username is already taken.");

        let html = DefaultPages::default()
            .render(&Page::SignUp { form: &form })
            .unwrap();

        assert!(html.contains("value=\"&lt;bob&gt;\""));
        assert!(html.contains("<li>This username is already taken.</li>"));
        assert!(!html.contains("<bob>"));
    }

    #[test]
    fn sign_in_page_carries_next_as_hidden_field() {
        let form = FormState::new().with_value("next", "/inbox?page=2");
        let html = DefaultPages::default()
            .render(&Page::SignIn { form: &form })
            .unwrap();

        assert!(html.contains("name=\"next\" value=\"/inbox?page=2\""));
    }

    #[test]
    fn confirm_page_has_distinct_invalid_state() {
        let form = FormState::new();
        let pages = DefaultPages::default();

        let valid = pages
            .render(&Page::PasswordResetConfirm {
                form: &form,
                valid_link: true,
            })
            .unwrap();
        let invalid = pages
            .render(&Page::PasswordResetConfirm {
                form: &form,
                valid_link: false,
            })
            .unwrap();

        assert!(valid.contains("name=\"new_password1\""));
        assert!(!invalid.contains("<form"));
        assert!(invalid.contains("Invalid password reset link"));
    }

    #[test]
    fn template_names_follow_registration_convention() {
        assert_eq!(Page::SignedOut.template_name(), "registration/signout.html");
        assert_eq!(
            Page::PasswordResetDone.template_name(),
            "registration/password_reset_done.html"
        );
    }
}
