//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate the database, session store, identity provider,
//! and image store.

mod auth;
mod images;
mod username;

pub use auth::{AuthService, CallbackOutcome};
pub use images::{ImageKind, ImageService, MAX_IMAGE_BYTES, RESIZE_HEIGHT, resize_to_height};
pub use username::{
    MAX_HANDLE_CHARS, MIN_HANDLE_CHARS, RESERVED_HANDLES, UsernameArbiter, is_well_formed,
};
