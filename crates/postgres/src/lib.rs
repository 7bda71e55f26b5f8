//! # Postgres
//!
//! This crate connects the verification dispatcher to a PostgreSQL database
//! and stores verification tokens in it.

/// Connection pool and schema bootstrap.
pub mod database;
/// PostgreSQL implementation of the token store.
pub mod token_store;

pub use database::{create_connection_pool, ensure_schema, test_connection};
pub use token_store::PgTokenStore;
