use async_trait::async_trait;
use std::sync::Arc;

use crate::types::{NotificationError, VERIFICATION_SUBJECT, verification_email_html};

/// Trait for email provider implementations
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Sends an HTML email and returns the provider's message id.
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<String, NotificationError>;
}

/// Sends verification links through an [`EmailSender`].
#[derive(Clone)]
pub struct VerificationMailer {
    sender: Arc<dyn EmailSender>,
}

impl VerificationMailer {
    /// Creates a mailer delivering through `sender`.
    pub fn new(sender: Arc<dyn EmailSender>) -> Self {
        Self { sender }
    }

    /// Sends the verification email carrying `link` to `contact`.
    ///
    /// Returns `true` when the provider acknowledged the message. Provider
    /// errors are logged and reported as `false`.
    pub async fn deliver(&self, contact: &str, link: &str) -> bool {
        log::info!("📧 Sending verification link to {}", contact);

        let html_body = verification_email_html(link);

        match self
            .sender
            .send_email(contact, VERIFICATION_SUBJECT, &html_body)
            .await
        {
            Ok(message_id) => {
                log::info!(
                    "✅ Verification email sent to {}. Message ID: {}",
                    contact,
                    message_id
                );
                true
            }
            Err(e) => {
                log::error!("❌ Error sending email to {}: {}", contact, e);
                false
            }
        }
    }
}
