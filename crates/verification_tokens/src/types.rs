use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Default validity window of a verification token, in seconds.
pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 120;

/// Path prefix under which the frontend serves token verification.
pub const VERIFY_PATH: &str = "/verify";

/// A verification token as held by a token store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationToken {
    /// Unique identifier of the record
    pub id: Uuid,
    /// Identifier of the subject (user) being verified
    pub subject_id: String,
    /// The opaque credential embedded in the verification link
    pub token: String,
    /// Instant at and after which the token is no longer valid
    pub expires_at: DateTime<Utc>,
    /// Instant the token was issued
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    /// Whether the token is expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A token about to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVerificationToken {
    /// Identifier of the subject (user) being verified
    pub subject_id: String,
    /// The opaque credential embedded in the verification link
    pub token: String,
    /// Instant at and after which the token is no longer valid
    pub expires_at: DateTime<Utc>,
    /// Instant the token was issued
    pub created_at: DateTime<Utc>,
}

impl NewVerificationToken {
    /// Turns the pending token into a stored record with a fresh id.
    pub fn into_record(self) -> VerificationToken {
        VerificationToken {
            id: Uuid::new_v4(),
            subject_id: self.subject_id,
            token: self.token,
            expires_at: self.expires_at,
            created_at: self.created_at,
        }
    }
}

/// Where verification links point to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// URL scheme, e.g. `https`
    pub scheme: String,
    /// Host name the frontend is served from
    pub domain: String,
    /// Optional port, omitted from the link when `None`
    pub port: Option<u16>,
}

impl LinkConfig {
    /// Renders `<scheme>://<domain>[:<port>]/verify/<token>`.
    pub fn verification_link(&self, token: &str) -> String {
        let authority = match self.port {
            Some(port) => format!("{}:{}", self.domain, port),
            None => self.domain.clone(),
        };

        format!(
            "{}://{}{}/{}",
            self.scheme,
            authority,
            VERIFY_PATH,
            urlencoding::encode(token)
        )
    }
}

/// A freshly issued link together with the token it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationLink {
    /// Full verification URL to send to the user
    pub url: String,
    /// Token embedded in the URL
    pub token: String,
    /// Expiry of the embedded token
    pub expires_at: DateTime<Utc>,
}

impl fmt::Display for VerificationLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Errors raised while issuing verification tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// A required input was missing or empty.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The token store failed to sweep or persist tokens.
    #[error("Token store error: {0}")]
    Store(String),
}
