use futures_util::FutureExt;
use notification_services::VerificationMailer;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use verification_tokens::TokenLifecycleManager;

use crate::types::*;

/// Handles SNS verification events: issues a token and mails the link.
#[derive(Clone)]
pub struct VerificationDispatchHandler {
    tokens: TokenLifecycleManager,
    mailer: VerificationMailer,
}

impl VerificationDispatchHandler {
    /// Creates a handler from its collaborators.
    pub fn new(tokens: TokenLifecycleManager, mailer: VerificationMailer) -> Self {
        Self { tokens, mailer }
    }

    /// Parses a raw event document and handles it.
    pub async fn handle_raw(&self, raw: &str) -> HandlerResponse {
        match serde_json::from_str::<SnsEvent>(raw) {
            Ok(event) => self.handle_event(&event).await,
            Err(e) => {
                let error = HandlerError::MalformedEvent(e);
                log::error!("❌ Error processing SNS event: {}", error);
                error.to_response()
            }
        }
    }

    /// Handles one batch of records.
    ///
    /// Never fails: every error, panics included, is turned into a 400 or 500
    /// result.
    pub async fn handle_event(&self, event: &SnsEvent) -> HandlerResponse {
        let outcome = AssertUnwindSafe(self.dispatch(event)).catch_unwind().await;

        let result = outcome.unwrap_or_else(|panic| {
            Err(HandlerError::Unexpected(panic_message(panic.as_ref())))
        });

        match result {
            Ok(email) => {
                log::info!("✅ Verification email sent successfully to {}.", email);
                HandlerResponse::success(SUCCESS_MESSAGE)
            }
            Err(e) => {
                log::error!("❌ Error processing SNS event: {}", e);
                e.to_response()
            }
        }
    }

    /// Validates the batch, then issues and mails a link for the last record.
    /// Returns the address the email went to.
    async fn dispatch(&self, event: &SnsEvent) -> Result<String, HandlerError> {
        let request = validate_batch(event)?;

        log::info!("📨 Extracted email: {}", request.email);
        log::info!("👤 Extracted userId: {}", request.user_id);

        let link = self
            .tokens
            .issue_verification(&request.user_id, &request.email)
            .await?;
        log::info!("🔗 Generated verification link: {}", link);

        if !self.mailer.deliver(&request.email, &link.url).await {
            return Err(HandlerError::Delivery);
        }

        Ok(request.email)
    }
}

/// Validates every record in order and returns the request of the last one.
///
/// The first invalid record aborts the whole batch.
pub fn validate_batch(event: &SnsEvent) -> Result<VerificationRequest, HandlerError> {
    let mut last = None;

    for record in &event.records {
        log::debug!("Raw SNS Message: {}", record.sns.message);

        let message: VerificationMessage = serde_json::from_str(&record.sns.message)
            .map_err(HandlerError::MalformedPayload)?;

        let request = VerificationRequest::try_from(message).inspect_err(|_| {
            log::warn!("⚠️ Validation failed: Missing email or userId.");
        })?;
        last = Some(request);
    }

    last.ok_or(HandlerError::EmptyBatch)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
