//! The chat pipeline: resolve attachments, assemble context, call the model,
//! remember the exchange.

use crate::context::{AssembledContext, ContextAssembler};
use crate::knowledge_base::KnowledgeBase;
use atlas_config::AppConfig;
use atlas_core::error::{Error, ProviderError};
use atlas_core::memory::ConversationLog;
use atlas_core::message::{ImageAttachment, Role, Turn};
use atlas_core::persona::Persona;
use atlas_core::provider::{Provider, ProviderRequest};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A client reference to an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub path: String,
    #[serde(alias = "type", alias = "mediaType")]
    pub media_type: String,
}

/// One chat request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatInput {
    pub message: String,
    #[serde(default)]
    pub history: Vec<Turn>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

impl ChatInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

/// Model and attachment settings for the chat service.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub request_timeout: Duration,
    pub uploads_dir: PathBuf,
    pub max_attachment_bytes: u64,
}

impl ChatSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: config.default_max_tokens,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            uploads_dir: config.uploads_dir(),
            max_attachment_bytes: config.attachments.max_bytes,
        }
    }
}

pub struct ChatService {
    provider: Arc<dyn Provider>,
    knowledge: Arc<KnowledgeBase>,
    memory: Arc<dyn ConversationLog>,
    assembler: ContextAssembler,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(
        provider: Arc<dyn Provider>,
        knowledge: Arc<KnowledgeBase>,
        memory: Arc<dyn ConversationLog>,
        assembler: ContextAssembler,
        settings: ChatSettings,
    ) -> Self {
        Self {
            provider,
            knowledge,
            memory,
            assembler,
            settings,
        }
    }

    /// Wire a service from configuration.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        knowledge: Arc<KnowledgeBase>,
        memory: Arc<dyn ConversationLog>,
    ) -> Self {
        let persona = Persona::load(
            config.persona.system_prompt.as_deref(),
            config.persona_file().as_deref(),
        );
        let assembler = ContextAssembler::new(
            persona,
            config.knowledge.min_essence_chars,
            config.knowledge.top_k,
            config.memory.window,
        );
        Self::new(
            provider,
            knowledge,
            memory,
            assembler,
            ChatSettings::from_config(config),
        )
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    pub fn memory(&self) -> &Arc<dyn ConversationLog> {
        &self.memory
    }

    pub fn persona(&self) -> &Persona {
        self.assembler.persona()
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Assemble the context for `input` without calling the model.
    pub async fn build_context(&self, input: &ChatInput) -> AssembledContext {
        let images = self.resolve_attachments(&input.attachments).await;
        let history = client_history(&input.history);
        self.assembler
            .build_context(
                &self.knowledge,
                self.memory.as_ref(),
                &input.message,
                &history,
                &images,
            )
            .await
    }

    /// Run one exchange and append it to long-term memory.
    ///
    /// Nothing is remembered when the model call fails.
    pub async fn chat(&self, input: ChatInput) -> Result<ChatReply, Error> {
        let context = self.build_context(&input).await;
        debug!(
            persona_source = ?context.metadata.persona_source,
            messages = context.messages.len(),
            tokens = context.metadata.total_tokens,
            "Context assembled"
        );

        let request = ProviderRequest {
            model: self.settings.model.clone(),
            messages: context.messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let limit = self.settings.request_timeout;
        let response = tokio::time::timeout(limit, self.provider.complete(request))
            .await
            .map_err(|_| ProviderError::Timeout(limit.as_secs()))??;

        let reply = response.message.content;
        self.memory.append(input.message, reply.clone()).await;
        info!(model = %response.model, reply_chars = reply.chars().count(), "Chat completed");

        Ok(ChatReply { reply })
    }

    /// Read every acceptable attachment; anything else is dropped.
    pub async fn resolve_attachments(&self, refs: &[AttachmentRef]) -> Vec<ImageAttachment> {
        let mut images = Vec::with_capacity(refs.len());
        for r in refs {
            let resolved = match atlas_security::resolve_attachment(
                &self.settings.uploads_dir,
                &r.path,
                &r.media_type,
                self.settings.max_attachment_bytes,
            ) {
                Ok(resolved) => resolved,
                Err(e) => {
                    debug!(path = %r.path, error = %e, "Attachment dropped");
                    continue;
                }
            };
            match tokio::fs::read(&resolved.path).await {
                Ok(bytes) => images.push(ImageAttachment {
                    media_type: resolved.media_type,
                    data: BASE64.encode(bytes),
                }),
                Err(e) => warn!(path = %r.path, error = %e, "Attachment unreadable, dropped"),
            }
        }
        images
    }
}

/// Client-supplied turns, minus anything claiming the system role.
fn client_history(history: &[Turn]) -> Vec<Turn> {
    history
        .iter()
        .filter(|t| {
            let keep = t.role != Role::System;
            if !keep {
                debug!("Ignoring system turn in client history");
            }
            keep
        })
        .cloned()
        .collect()
}
