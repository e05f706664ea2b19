//! Security module for Atlas — attachment path confinement and API token
//! comparison.
//!
//! Provides:
//! - **Path validation**: attachment references must resolve to a regular
//!   image file strictly inside the upload root
//! - **Token check**: constant-time comparison of the shared API token

pub mod path;
pub mod token;

pub use path::{PathValidationError, ResolvedAttachment, resolve_attachment};
pub use token::tokens_match;
