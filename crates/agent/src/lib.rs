//! The Atlas chat pipeline.
//!
//! Every request flows through the same steps:
//!
//! 1. **Resolve** image attachments inside the upload root
//! 2. **Build context** (essence or persona, retrieved chunks, memory window,
//!    client history, the current message)
//! 3. **Send to the model** via the configured provider, bounded by a timeout
//! 4. **Remember** the exchange in the long-term conversation log
//!
//! The [`KnowledgeBase`] owns the essence and corpus index and refreshes them
//! in the background when a reload is requested.

pub mod chat;
pub mod context;
pub mod knowledge_base;

pub use chat::{AttachmentRef, ChatInput, ChatReply, ChatService, ChatSettings};
pub use context::{
    AssembledContext, AssemblyInput, AssemblyMetadata, ContextAssembler, LayerStats,
    PersonaSource,
};
pub use knowledge_base::{
    DistillSummary, KnowledgeBase, KnowledgeSettings, KnowledgeSnapshot, LastReload, ReloadAck,
    ReloadReport,
};
