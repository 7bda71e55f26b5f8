//! # Event Handlers
//!
//! This crate turns SNS verification events into verification emails. It
//! validates the batch, issues a token for the last record and reports the
//! outcome as a status-coded result.

/// Runtime configuration of the dispatcher
mod config;
pub use config::*;

/// SNS event model, handler result and errors
mod types;
pub use types::*;

/// The verification dispatch handler
mod handler;
pub use handler::*;
