//! # Notification Services
//!
//! This crate delivers verification emails. It defines the [`EmailSender`]
//! seam with Amazon SES and SendGrid implementations, and the
//! [`VerificationMailer`] that renders and sends the verification message.

/// SendGrid v3 API email sender.
pub mod sendgrid;
/// Verification mailer and the email sender seam.
pub mod service;
/// Amazon SES email sender.
pub mod ses;
/// Errors and email templates.
pub mod types;

pub use sendgrid::SendGridEmailSender;
pub use service::{EmailSender, VerificationMailer};
pub use ses::SesEmailSender;
pub use types::{NotificationError, VERIFICATION_SUBJECT, verification_email_html};
