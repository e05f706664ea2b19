//! Context assembly — turns the knowledge base, long-term memory and the
//! current request into the ordered message list sent to the model.
//!
//! Retrieval and memory reads happen in [`ContextAssembler::build_context`];
//! the layering itself is the pure [`ContextAssembler::assemble`], so
//! identical inputs always produce identical message contents.

use crate::context::token;
use crate::knowledge_base::KnowledgeBase;
use atlas_core::memory::ConversationLog;
use atlas_core::message::{ImageAttachment, Message, Turn};
use atlas_core::persona::Persona;
use atlas_knowledge::ScoredChunk;
use serde::{Deserialize, Serialize};

/// Shown to the model when retrieval found nothing.
pub const NO_HITS: &str = "Context: (no hits)";

// ── Types ─────────────────────────────────────────────────────────────────

/// All inputs for one assembly.
pub struct AssemblyInput<'a> {
    /// Current essence (may be empty).
    pub essence: &'a str,
    /// Retrieved chunks, best first.
    pub hits: &'a [ScoredChunk],
    /// Long-term memory window, oldest first.
    pub memory: &'a [Turn],
    /// Turns supplied by the caller, oldest first.
    pub history: &'a [Turn],
    /// The current user message.
    pub user_message: &'a str,
    /// Images attached to the current message.
    pub images: &'a [ImageAttachment],
}

/// Which text opened the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaSource {
    Essence,
    Persona,
}

/// The assembled context, ready for a provider call.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub messages: Vec<Message>,
    pub metadata: AssemblyMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    pub persona_source: PersonaSource,
    /// Where the fallback persona came from (`<builtin>`, a path, ...).
    pub persona_origin: String,
    /// Estimated tokens across all messages.
    pub total_tokens: usize,
    pub per_layer: Vec<LayerStats>,
}

/// Statistics for a single context layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerStats {
    pub name: String,
    pub items: usize,
    pub tokens: usize,
}

// ── Assembler ─────────────────────────────────────────────────────────────

pub struct ContextAssembler {
    persona: Persona,
    min_essence_chars: usize,
    top_k: usize,
    memory_window: usize,
}

impl ContextAssembler {
    pub fn new(persona: Persona, min_essence_chars: usize, top_k: usize, memory_window: usize) -> Self {
        Self {
            persona,
            min_essence_chars,
            top_k,
            memory_window,
        }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// An essence is used only when it is longer than the threshold.
    pub fn essence_usable(&self, essence: &str) -> bool {
        essence.chars().count() > self.min_essence_chars
    }

    /// Gather retrieval hits and the memory window, then assemble.
    pub async fn build_context(
        &self,
        knowledge: &KnowledgeBase,
        memory: &dyn ConversationLog,
        user_message: &str,
        history: &[Turn],
        images: &[ImageAttachment],
    ) -> AssembledContext {
        let snapshot = knowledge.snapshot().await;
        let hits = snapshot.index.top_k(user_message, self.top_k);
        let window = memory.recent(self.memory_window).await;

        self.assemble(&AssemblyInput {
            essence: &snapshot.essence,
            hits: &hits,
            memory: &window,
            history,
            user_message,
            images,
        })
    }

    /// Lay the inputs out in prompt order.
    pub fn assemble(&self, input: &AssemblyInput<'_>) -> AssembledContext {
        let mut messages = Vec::with_capacity(3 + input.memory.len() + input.history.len());
        let mut per_layer = Vec::with_capacity(5);

        // ── Layer 1: essence or persona ───────────────────────────────────
        let persona_source = if self.essence_usable(input.essence) {
            messages.push(Message::system(input.essence));
            PersonaSource::Essence
        } else {
            messages.push(Message::system(self.persona.system_prompt.as_str()));
            PersonaSource::Persona
        };
        per_layer.push(stats("persona", &messages[0..1]));

        // ── Layer 2: retrieved chunks ─────────────────────────────────────
        messages.push(Message::system(format_hits(input.hits)));
        per_layer.push(LayerStats {
            items: input.hits.len(),
            ..stats("retrieved", &messages[1..2])
        });

        // ── Layer 3: long-term memory ─────────────────────────────────────
        let start = messages.len();
        messages.extend(input.memory.iter().map(Message::from));
        per_layer.push(stats("memory", &messages[start..]));

        // ── Layer 4: caller history ───────────────────────────────────────
        let start = messages.len();
        messages.extend(input.history.iter().map(Message::from));
        per_layer.push(stats("history", &messages[start..]));

        // ── Layer 5: current message ──────────────────────────────────────
        let start = messages.len();
        messages.push(Message::user(input.user_message).with_images(input.images.to_vec()));
        per_layer.push(stats("user", &messages[start..]));

        AssembledContext {
            metadata: AssemblyMetadata {
                persona_source,
                persona_origin: self.persona.source.clone(),
                total_tokens: token::estimate_messages_tokens(&messages),
                per_layer,
            },
            messages,
        }
    }
}

/// Render retrieval hits as a numbered context block.
pub fn format_hits(hits: &[ScoredChunk]) -> String {
    if hits.is_empty() {
        return NO_HITS.to_string();
    }
    let body = hits
        .iter()
        .enumerate()
        .map(|(i, h)| format!("[{}] {}: {}", i + 1, h.chunk.source_file, h.chunk.text))
        .collect::<Vec<_>>()
        .join("\n---\n");
    format!("Context (hits):\n{body}")
}

fn stats(name: &str, messages: &[Message]) -> LayerStats {
    LayerStats {
        name: name.into(),
        items: messages.len(),
        tokens: token::estimate_messages_tokens(messages),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
