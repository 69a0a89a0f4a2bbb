/// Outbound mail
///
/// The server never talks to a mail provider directly; it hands a
/// [`MailMessage`] to whatever [`Mailer`] it was built with:
///
/// - [`SmtpMailer`]: delivers through an SMTP relay.
/// - [`LogMailer`]: writes the message to the log. Development only, since
///   links in the body contain unhashed tokens.
/// - [`MemoryMailer`]: keeps messages in memory so tests can read the links.
///
/// Message bodies come from [`verification_email`] and
/// [`password_reset_email`].

mod smtp;

pub use smtp::{SmtpMailer, SmtpSettings};

use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::Mutex;
use tracing::info;

/// Mail sending error
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Invalid mail configuration: {0}")]
    InvalidConfig(String),
}

/// A plain-text email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivers mail
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

/// Logs messages instead of sending them
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "Email not delivered (log mailer)"
        );
        Ok(())
    }
}

/// Collects messages in memory
///
/// Can be switched into a failing mode to simulate a relay outage.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<MailMessage>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `send` fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages sent so far, oldest first
    pub async fn sent(&self) -> Vec<MailMessage> {
        self.outbox.lock().await.clone()
    }

    /// Most recent message addressed to `to`
    pub async fn last_to(&self, to: &str) -> Option<MailMessage> {
        self.outbox
            .lock()
            .await
            .iter()
            .rev()
            .find(|m| m.to == to)
            .cloned()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::SendFailed("relay unavailable".to_string()));
        }
        self.outbox.lock().await.push(message);
        Ok(())
    }
}

/// Email asking a new user to confirm their address
pub fn verification_email(to: &str, username: &str, link: &str) -> MailMessage {
    MailMessage {
        to: to.to_string(),
        subject: "Please verify your email".to_string(),
        body: format!(
            "Hi {username},\n\n\
             Welcome to Project Camp! Confirm your email address by opening the link below:\n\n\
             {link}\n\n\
             The link expires in 20 minutes. If you did not sign up, ignore this email.\n"
        ),
    }
}

/// Email carrying a password reset link
pub fn password_reset_email(to: &str, username: &str, link: &str) -> MailMessage {
    MailMessage {
        to: to.to_string(),
        subject: "Password reset request".to_string(),
        body: format!(
            "Hi {username},\n\n\
             We received a request to reset the password of your Project Camp account. \
             Choose a new password here:\n\n\
             {link}\n\n\
             The link expires in 20 minutes. If you did not ask for this, ignore this email.\n"
        ),
    }
}

/// Extracts the last path segment of the first URL in a message body
///
/// Used by tests to recover the token embedded in a link.
pub fn token_from_link(body: &str) -> Option<&str> {
    body.split_whitespace()
        .find(|w| w.starts_with("http://") || w.starts_with("https://"))
        .and_then(|url| url.trim_end_matches('/').rsplit('/').next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_mailer_keeps_order() {
        let mailer = MemoryMailer::new();
        mailer
            .send(verification_email("a@example.com", "a", "http://x/verify/1"))
            .await
            .unwrap();
        mailer
            .send(verification_email("a@example.com", "a", "http://x/verify/2"))
            .await
            .unwrap();

        assert_eq!(mailer.sent().await.len(), 2);
        let last = mailer.last_to("a@example.com").await.unwrap();
        assert_eq!(token_from_link(&last.body), Some("2"));
        assert!(mailer.last_to("b@example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_memory_mailer_failing_mode() {
        let mailer = MemoryMailer::new();
        mailer.set_failing(true);
        let result = mailer
            .send(verification_email("a@example.com", "a", "http://x/verify/1"))
            .await;
        assert!(matches!(result, Err(MailError::SendFailed(_))));
        assert!(mailer.sent().await.is_empty());

        mailer.set_failing(false);
        mailer
            .send(verification_email("a@example.com", "a", "http://x/verify/2"))
            .await
            .unwrap();
        assert_eq!(mailer.sent().await.len(), 1);
    }

    #[test]
    fn test_templates_embed_link() {
        let msg = password_reset_email("a@example.com", "alice", "https://camp.test/reset/abc123");
        assert_eq!(msg.to, "a@example.com");
        assert!(msg.body.contains("alice"));
        assert_eq!(token_from_link(&msg.body), Some("abc123"));
    }
}
