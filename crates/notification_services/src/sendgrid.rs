use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::service::EmailSender;
use crate::types::NotificationError;

const SENDGRID_API_URL: &str = "https://api.sendgrid.com";

/// Email sender backed by the SendGrid v3 mail API.
#[derive(Debug, Clone)]
pub struct SendGridEmailSender {
    client: Client,
    api_key: String,
    from_email: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct SendGridRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: EmailAddress<'a>,
    subject: &'a str,
    content: Vec<MailContent<'a>>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<EmailAddress<'a>>,
}

#[derive(Debug, Serialize)]
struct EmailAddress<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct MailContent<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

impl<'a> SendGridRequest<'a> {
    fn html(from: &'a str, to: &'a str, subject: &'a str, html_body: &'a str) -> Self {
        Self {
            personalizations: vec![Personalization {
                to: vec![EmailAddress { email: to }],
            }],
            from: EmailAddress { email: from },
            subject,
            content: vec![MailContent {
                content_type: "text/html",
                value: html_body,
            }],
        }
    }
}

impl SendGridEmailSender {
    /// Creates a sender authenticating with `api_key`.
    ///
    /// An empty key is accepted here; every send then fails with
    /// [`NotificationError::MissingCredential`] without contacting SendGrid.
    pub fn new(api_key: impl Into<String>, from_email: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            from_email: from_email.into(),
            base_url: SENDGRID_API_URL.to_string(),
        }
    }

    /// Points the sender at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl EmailSender for SendGridEmailSender {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<String, NotificationError> {
        if self.api_key.is_empty() {
            return Err(NotificationError::MissingCredential(
                "SendGrid API key is empty".to_string(),
            ));
        }

        let request = SendGridRequest::html(&self.from_email, to, subject, html_body);

        let response = self
            .client
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotificationError::SendGridError(e.to_string()))?;

        let status = response.status();
        log::info!("📧 SendGrid responded with status code: {}", status.as_u16());

        // SendGrid queues accepted mail and answers 202; anything else was not sent.
        if status != StatusCode::ACCEPTED {
            return Err(NotificationError::Rejected(status.as_u16()));
        }

        let message_id = response
            .headers()
            .get("X-Message-Id")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(message_id)
    }
}
