//! # Verification Tokens
//!
//! This crate owns the lifecycle of email verification tokens: generation,
//! persistence with a short expiry, sweeping of stale tokens and construction
//! of the verification link that is mailed to the user.

/// Token lifecycle manager issuing tokens and verification links.
pub mod service;
/// Storage seam for verification tokens plus an in-memory implementation.
pub mod store;
/// Types shared by the token lifecycle: records, link configuration and errors.
pub mod types;

pub use service::TokenLifecycleManager;
pub use store::{MemoryTokenStore, TokenStore};
pub use types::{
    DEFAULT_TOKEN_TTL_SECONDS, LinkConfig, NewVerificationToken, TokenError, VerificationLink,
    VerificationToken,
};
