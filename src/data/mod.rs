//! Data layer module
//!
//! Handles all data persistence:
//! - Identities (users) and their portfolio documents
//! - Server-side sessions
//! - Outstanding OAuth correlation nonces

mod database;
mod models;

pub use database::{Database, hash_token};
pub use models::*;
