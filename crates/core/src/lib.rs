//! # Atlas Core
//!
//! Domain types, traits, and error definitions for the Atlas persona
//! assistant. This crate has **zero framework dependencies** — it defines the
//! domain model that the knowledge, memory, provider, and gateway crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every external seam is a trait here:
//! - [`Provider`] — the language model behind a chat request
//! - [`ConversationLog`] — the durable long-term conversation memory
//!
//! Implementations live in their respective crates, which keeps the
//! dependency graph pointing inward and makes the chat pipeline testable
//! with in-process stubs.

pub mod error;
pub mod memory;
pub mod message;
pub mod persona;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use memory::ConversationLog;
pub use message::{ImageAttachment, Message, Role, Turn};
pub use persona::Persona;
pub use provider::{Provider, ProviderRequest, ProviderResponse};
