/// SMTP delivery
///
/// Sends each [`MailMessage`] as a plain-text UTF-8 email through an SMTP
/// relay. One `SmtpMailer` is built at startup and shared; each send opens its
/// own connection.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;

use super::{MailError, MailMessage, Mailer};

/// How the connection to the relay is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS, usually port 465
    Tls,
    /// Plain connection upgraded with STARTTLS, usually port 587
    StartTls,
    /// No encryption; local relays and mail catchers only
    None,
}

impl SmtpSecurity {
    pub fn default_port(&self) -> u16 {
        match self {
            SmtpSecurity::Tls => 465,
            SmtpSecurity::StartTls => 587,
            SmtpSecurity::None => 25,
        }
    }
}

impl FromStr for SmtpSecurity {
    type Err = MailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tls" | "ssl" => Ok(SmtpSecurity::Tls),
            "starttls" => Ok(SmtpSecurity::StartTls),
            "none" | "plain" => Ok(SmtpSecurity::None),
            other => Err(MailError::Config(format!(
                "SMTP security must be 'tls', 'starttls' or 'none', got '{}'",
                other
            ))),
        }
    }
}

/// Relay connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,

    pub port: u16,

    pub security: SmtpSecurity,

    pub username: Option<String>,

    pub password: Option<String>,
}

/// Delivers mail through an SMTP relay
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds the transport; no connection is opened until the first send
    ///
    /// # Errors
    ///
    /// `MailError::Config` when the sender address does not parse or the
    /// TLS parameters for the host cannot be built.
    pub fn new(settings: &SmtpSettings, from: &str) -> Result<Self, MailError> {
        let from = Mailbox::from_str(from)
            .map_err(|e| MailError::Config(format!("invalid sender address '{}': {}", from, e)))?;

        let builder = match settings.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| MailError::Config(format!("SMTP TLS setup failed: {}", e)))?,
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                    .map_err(|e| MailError::Config(format!("SMTP STARTTLS setup failed: {}", e)))?
            }
            SmtpSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host),
        };

        let builder = builder.port(settings.port);
        let builder = match (&settings.username, &settings.password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, message: MailMessage) -> Result<Message, MailError> {
        let to = Mailbox::from_str(&message.to)
            .map_err(|e| MailError::Delivery(format!("invalid recipient address: {}", e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|e| MailError::Delivery(format!("message could not be built: {}", e)))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        let to = message.to.clone();
        let subject = message.subject.clone();
        let email = self.build_message(message)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Delivery(e.to_string()))?;

        info!(to = %to, subject = %subject, "Mail sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(security: SmtpSecurity) -> SmtpSettings {
        SmtpSettings {
            host: "localhost".to_string(),
            port: security.default_port(),
            security,
            username: Some("atelier".to_string()),
            password: Some("relay-password".to_string()),
        }
    }

    #[test]
    fn test_security_parsing() {
        assert_eq!("STARTTLS".parse::<SmtpSecurity>().unwrap(), SmtpSecurity::StartTls);
        assert_eq!("ssl".parse::<SmtpSecurity>().unwrap(), SmtpSecurity::Tls);
        assert_eq!("none".parse::<SmtpSecurity>().unwrap(), SmtpSecurity::None);
        assert!(matches!("smtps".parse::<SmtpSecurity>(), Err(MailError::Config(_))));
    }

    #[test]
    fn test_invalid_sender_rejected() {
        let result = SmtpMailer::new(&settings(SmtpSecurity::None), "not an address");
        assert!(matches!(result, Err(MailError::Config(_))));
    }

    #[tokio::test]
    async fn test_builds_plain_text_message() {
        let mailer =
            SmtpMailer::new(&settings(SmtpSecurity::StartTls), "Atelier <no-reply@atelier.test>").unwrap();

        let email = mailer
            .build_message(MailMessage {
                to: "claire@example.com".to_string(),
                subject: "Changement d'adresse".to_string(),
                body: "https://atelier.test/account/email/confirm-current/abc".to_string(),
            })
            .unwrap();

        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("To: claire@example.com"));
        assert!(raw.contains("no-reply@atelier.test"));
        assert!(raw.contains("Content-Type: text/plain; charset=utf-8"));
        assert!(raw.contains("confirm-current/abc"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_fails_before_connecting() {
        let mailer = SmtpMailer::new(&settings(SmtpSecurity::None), "no-reply@atelier.test").unwrap();

        let result = mailer
            .send(MailMessage {
                to: "nobody".to_string(),
                subject: "x".to_string(),
                body: "x".to_string(),
            })
            .await;

        assert!(matches!(result, Err(MailError::Delivery(_))));
    }
}
