//! Username arbitration
//!
//! Decides whether a handle may be claimed. The answer is advisory: the
//! UNIQUE constraint on `identities.handle` has the final word at insert time.

use std::sync::Arc;

use crate::data::Database;
use crate::error::AppError;

pub const MIN_HANDLE_CHARS: usize = 2;
pub const MAX_HANDLE_CHARS: usize = 16;

/// Handles that collide with top-level routes of the site
pub const RESERVED_HANDLES: &[&str] = &[
    "", "api", "auth", "signup", "login", "editor", "p", "blog", "health", "metrics",
];

/// Static policy: length bounds and reserved words, no storage lookup.
pub fn is_well_formed(handle: &str) -> bool {
    let len = handle.chars().count();
    (MIN_HANDLE_CHARS..=MAX_HANDLE_CHARS).contains(&len) && !RESERVED_HANDLES.contains(&handle)
}

/// Username availability service
pub struct UsernameArbiter {
    db: Arc<Database>,
}

impl UsernameArbiter {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Whether `handle` could be claimed right now.
    ///
    /// Policy rejections are `Ok(false)`; only storage failures are errors.
    pub async fn is_available(&self, handle: &str) -> Result<bool, AppError> {
        if !is_well_formed(handle) {
            return Ok(false);
        }

        let taken = self.db.find_identity_by_handle(handle).await?.is_some();
        Ok(!taken)
    }
}
