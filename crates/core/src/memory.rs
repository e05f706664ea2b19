//! Conversation log trait — durable long-term conversational memory.
//!
//! The log is append-only: every completed exchange adds exactly one user
//! turn immediately followed by its assistant reply. Entries are never
//! mutated or reordered; the oldest ones fall off once the cap is reached.

use crate::message::{Role, Turn};
use async_trait::async_trait;

/// The core ConversationLog trait.
///
/// Implementations: JSON file (production), in-memory (tests).
#[async_trait]
pub trait ConversationLog: Send + Sync {
    /// The backend name (e.g., "file", "in_memory").
    fn name(&self) -> &str;

    /// Append one user/assistant exchange as a single atomic operation.
    ///
    /// Persistence failures are logged by the implementation and never
    /// surface here: an exchange that already reached the user must not
    /// fail the request after the fact.
    async fn append(&self, user: String, assistant: String);

    /// The most recent `limit` turns, oldest first.
    async fn recent(&self, limit: usize) -> Vec<Turn>;

    /// Number of turns currently held.
    async fn len(&self) -> usize;

    /// Whether the log holds no turns.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The newest turn with the given role, if any, searching the whole log.
    async fn last_with_role(&self, role: Role) -> Option<Turn>;
}
