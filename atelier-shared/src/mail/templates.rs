/// Bodies of the confirmation emails

use super::MailMessage;

pub fn password_change(to: &str, first_name: &str, link: &str) -> MailMessage {
    MailMessage {
        to: to.to_string(),
        subject: "Confirm your password change".to_string(),
        body: format!(
            "Hello {first_name},\n\n\
             A password change was requested for your account.\n\
             Follow this link to choose a new password:\n\n\
             {link}\n\n\
             The link is valid for 1 hour. If you did not ask for this, ignore this message; \
             your password stays unchanged.\n"
        ),
    }
}

/// Sent to the current address, step one of an email change
pub fn email_change_current(to: &str, first_name: &str, new_email: &str, link: &str) -> MailMessage {
    MailMessage {
        to: to.to_string(),
        subject: "Confirm your email address change".to_string(),
        body: format!(
            "Hello {first_name},\n\n\
             A request was made to change the email address of your account to {new_email}.\n\
             Follow this link to confirm from your current address:\n\n\
             {link}\n\n\
             A second link will then be sent to the new address. \
             The link is valid for 1 hour. If you did not ask for this, ignore this message.\n"
        ),
    }
}

/// Sent to the pending address, step two of an email change
pub fn email_change_new(to: &str, first_name: &str, link: &str) -> MailMessage {
    MailMessage {
        to: to.to_string(),
        subject: "Validate your new email address".to_string(),
        body: format!(
            "Hello {first_name},\n\n\
             Follow this link to make this address the login of your account:\n\n\
             {link}\n\n\
             The link is valid for 1 hour.\n"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_change_current_mentions_new_address() {
        let msg = email_change_current(
            "old@example.com",
            "Claire",
            "new@example.com",
            "http://localhost/account/email/confirm-current/abc",
        );
        assert_eq!(msg.to, "old@example.com");
        assert!(msg.body.contains("new@example.com"));
        assert!(msg.body.contains("/account/email/confirm-current/abc"));
    }

    #[test]
    fn test_password_change_carries_link() {
        let msg = password_change("claire@example.com", "Claire", "http://x/y");
        assert!(msg.body.starts_with("Hello Claire,"));
        assert!(msg.body.contains("http://x/y"));
    }
}
