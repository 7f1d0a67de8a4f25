/// Outgoing mail
///
/// The account flows hand finished messages to a [`Mailer`]. The server
/// delivers through [`smtp::SmtpMailer`] when a relay is configured and falls
/// back to [`LogMailer`], which records that a message was sent without
/// writing its body (the body carries a live confirmation link). Tests use
/// [`MemoryMailer`] to read the links back.

pub mod smtp;
pub mod templates;

pub use smtp::{SmtpMailer, SmtpSecurity, SmtpSettings};

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::info;

/// A plain-text message ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail delivery failed: {0}")]
    Delivery(String),

    #[error("Mail configuration error: {0}")]
    Config(String),
}

/// Mail delivery abstraction
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers a message or reports why it could not be sent
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

/// Logs recipient and subject instead of sending
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        info!(
            from = %self.from,
            to = %message.to,
            subject = %message.subject,
            "Mail handed to log sender"
        );
        Ok(())
    }
}

/// Keeps sent messages in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<MailMessage>>>,
    fail: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails
    pub fn failing() -> Self {
        Self {
            sent: Arc::default(),
            fail: true,
        }
    }

    /// Messages sent so far, oldest first
    pub fn sent(&self) -> Vec<MailMessage> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn last(&self) -> Option<MailMessage> {
        self.sent().pop()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Delivery("memory mailer set to fail".to_string()));
        }

        match self.sent.lock() {
            Ok(mut sent) => sent.push(message),
            Err(poisoned) => poisoned.into_inner().push(message),
        }
        Ok(())
    }
}
