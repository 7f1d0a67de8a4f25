/// Self-service account flows
///
/// Everything here is driven by the account holder: identity edits, the
/// emailed password change and the double-confirmed email change. The flows
/// own the rules (input validation, token issue and consumption, which address
/// gets which link) and leave HTTP concerns to the API crate.
///
/// Every failure to follow a link, whatever the cause (malformed, unknown,
/// expired, already used, wrong step), surfaces as the single
/// [`AccountError::InvalidLink`].

pub mod email;
pub mod identity;
pub mod password;

pub use email::{
    confirm_current_email, confirm_new_email, request_email_change, EmailChangeRequested,
    EmailChangeState,
};
pub use identity::update_identity;
pub use password::{check_password_link, confirm_password_change, request_password_change};

use crate::auth::password::PasswordError;
use crate::mail::MailError;

/// The one message shown for any unusable confirmation link
pub const INVALID_LINK_MESSAGE: &str = "This link is invalid or has expired.";

pub const PASSWORD_LINK_SENT: &str =
    "A confirmation link has been sent to your email address. It is valid for 1 hour.";

pub const PASSWORD_CHANGED: &str = "Your password has been changed.";

/// Same text whether or not the requested address is free
pub const EMAIL_CHANGE_REQUESTED: &str = "If this email address is available, a confirmation link \
     has been sent to your current address. It is valid for 1 hour.";

pub const CURRENT_EMAIL_CONFIRMED: &str = "Your current address is confirmed. A validation link \
     has been sent to your new email address.";

pub const EMAIL_CHANGED: &str = "Your email address has been changed.";

pub const IDENTITY_UPDATED: &str = "Your details have been updated.";

/// Errors from the account flows
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("This link is invalid or has expired.")]
    InvalidLink,

    /// Rejected input, with the offending field
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("The new email address is the same as the current one.")]
    SameEmail,

    /// The account the flow was started for no longer exists
    #[error("Account not found")]
    UnknownAccount,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AccountError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AccountError::Validation {
            field,
            message: message.into(),
        }
    }
}

/// Builds the absolute URLs placed in confirmation emails
#[derive(Debug, Clone)]
pub struct Links {
    base_url: String,
}

impl Links {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn password_confirm(&self, raw_token: &str) -> String {
        format!("{}/account/password/confirm/{}", self.base_url, raw_token)
    }

    pub fn email_confirm_current(&self, raw_token: &str) -> String {
        format!("{}/account/email/confirm-current/{}", self.base_url, raw_token)
    }

    pub fn email_confirm_new(&self, raw_token: &str) -> String {
        format!("{}/account/email/confirm-new/{}", self.base_url, raw_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_strip_trailing_slash() {
        let links = Links::new("https://atelier.example/");
        assert_eq!(
            links.password_confirm("abc"),
            "https://atelier.example/account/password/confirm/abc"
        );
        assert_eq!(
            links.email_confirm_current("abc"),
            "https://atelier.example/account/email/confirm-current/abc"
        );
        assert_eq!(
            links.email_confirm_new("abc"),
            "https://atelier.example/account/email/confirm-new/abc"
        );
    }

    #[test]
    fn test_invalid_link_message_is_the_display_text() {
        assert_eq!(AccountError::InvalidLink.to_string(), INVALID_LINK_MESSAGE);
    }

    #[test]
    fn test_validation_displays_message_only() {
        let err = AccountError::validation("email", "Invalid email address.");
        assert_eq!(err.to_string(), "Invalid email address.");
    }
}
