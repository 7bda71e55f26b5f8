use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ses::Client as SesClient;
use aws_sdk_ses::types::{Body, Content, Destination, Message};

use crate::service::EmailSender;
use crate::types::NotificationError;

/// Email sender backed by Amazon SES.
#[derive(Debug, Clone)]
pub struct SesEmailSender {
    ses_client: SesClient,
    from_email: String,
}

impl SesEmailSender {
    /// Creates a sender using the default AWS credential chain.
    pub async fn new(from_email: impl Into<String>) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;

        Self {
            ses_client: SesClient::new(&config),
            from_email: from_email.into(),
        }
    }
}

fn content(data: &str, part: &str) -> Result<Content, NotificationError> {
    Content::builder().data(data).build().map_err(|e| {
        log::error!("❌ Failed to build {} content: {}", part, e);
        NotificationError::SesError(format!("Failed to build {}: {}", part, e))
    })
}

#[async_trait]
impl EmailSender for SesEmailSender {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<String, NotificationError> {
        let body = Body::builder().html(content(html_body, "HTML body")?).build();

        let message = Message::builder()
            .subject(content(subject, "subject")?)
            .body(body)
            .build();

        let destination = Destination::builder().to_addresses(to).build();

        log::info!("📧 Sending email via AWS SES...");

        let result = self
            .ses_client
            .send_email()
            .source(&self.from_email)
            .destination(destination)
            .message(message)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.message_id().to_string()),
            Err(e) => {
                log::error!("❌ AWS SES error: {:#?}", e);
                let error_msg = if let Some(service_error) = e.as_service_error() {
                    format!("AWS SES service error: {:?}", service_error)
                } else {
                    format!("AWS SES error: {}", e)
                };
                Err(NotificationError::SesError(error_msg))
            }
        }
    }
}
