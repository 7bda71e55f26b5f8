/// Errors raised while sending notifications.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Simple email service (SES) errors.
    #[error("AWS SES error: {0}")]
    SesError(String),

    /// SendGrid API errors.
    #[error("SendGrid error: {0}")]
    SendGridError(String),

    /// The provider answered but did not accept the message.
    #[error("Email rejected by provider with status {0}")]
    Rejected(u16),

    /// Provider credentials are missing.
    #[error("Missing credential: {0}")]
    MissingCredential(String),
}

/// Subject line of verification emails.
pub const VERIFICATION_SUBJECT: &str = "Verify Your Email Address";

/// Renders the HTML body of a verification email around `link`.
pub fn verification_email_html(link: &str) -> String {
    format!(
        r#"
            <p>Hello,</p>
            <p>Please verify your email address by clicking the link below:</p>
            <a href="{link}">{link}</a>
            <p>Thank you!</p>
        "#
    )
}
