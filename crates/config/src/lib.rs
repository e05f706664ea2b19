//! Configuration loading, validation, and management for Atlas.
//!
//! Loads configuration from `~/.atlas/config.toml` (or `$ATLAS_HOME/config.toml`)
//! with environment variable overrides. Validates all settings at startup.
//! Relative paths in the config are resolved against `workspace_dir`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.atlas/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Temperature; unset means "let the model decide"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_temperature: Option<f32>,

    /// Max tokens per LLM response; unset means provider default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,

    /// Upper bound on a single model call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Directory that relative paths below are resolved against
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: String,

    /// Corpus, distillation and retrieval settings
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Long-term conversation memory
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Persona used when no usable essence exists
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Chat attachment handling
    #[serde(default)]
    pub attachments: AttachmentsConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_request_timeout() -> u64 {
    120
}
fn default_workspace_dir() -> String {
    ".".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("workspace_dir", &self.workspace_dir)
            .field("knowledge", &self.knowledge)
            .field("memory", &self.memory)
            .field("persona", &self.persona)
            .field("gateway", &self.gateway)
            .field("attachments", &self.attachments)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_token", &redact(&self.api_token))
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Directory of plain-text documents (`*.txt`)
    #[serde(default = "default_documents_dir")]
    pub documents_dir: String,

    /// Durable essence artifact
    #[serde(default = "default_essence_path")]
    pub essence_path: String,

    /// Chunk window, in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks, in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Chunks retrieved per chat request
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Hard cap on the essence length, in characters
    #[serde(default = "default_essence_budget")]
    pub essence_budget: usize,

    /// Essences at or below this length are not used as the persona base
    #[serde(default = "default_min_essence_chars")]
    pub min_essence_chars: usize,

    /// Added to a chunk's score when it matches `ranking_keywords`
    #[serde(default = "default_keyword_bonus")]
    pub keyword_bonus: f64,

    /// Case-insensitive patterns that earn the ranking bonus
    #[serde(default = "default_ranking_keywords")]
    pub ranking_keywords: Vec<String>,

    /// Case-insensitive patterns that select distilled key lines
    #[serde(default = "default_distill_keywords")]
    pub distill_keywords: Vec<String>,

    #[serde(default = "default_head_lines")]
    pub head_lines: usize,

    #[serde(default = "default_key_lines")]
    pub key_lines: usize,

    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,

    /// Re-run distillation when the process starts
    #[serde(default = "default_true")]
    pub distill_on_startup: bool,

    /// Shell command that refreshes `documents_dir` before a reload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convert_command: Option<String>,

    #[serde(default = "default_convert_timeout")]
    pub convert_timeout_secs: u64,
}

fn default_documents_dir() -> String {
    "docx_txt".into()
}
fn default_essence_path() -> String {
    "core_summary.txt".into()
}
fn default_chunk_size() -> usize {
    900
}
fn default_chunk_overlap() -> usize {
    150
}
fn default_top_k() -> usize {
    8
}
fn default_essence_budget() -> usize {
    60_000
}
fn default_min_essence_chars() -> usize {
    1_000
}
fn default_keyword_bonus() -> f64 {
    3.0
}
fn default_ranking_keywords() -> Vec<String> {
    ["piecz", "księg", "bram", "ritua", "fortec", "cieni", "nexus", "lyr", "kael"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_distill_keywords() -> Vec<String> {
    [
        "Piecz(e|ę)ć",
        "Ksi(ę|e)ga",
        "Brama",
        "Zakl(ę|e)cie",
        "Forteca",
        "Lyr",
        "Kael",
        "Nexus",
        "Cień",
        "Rytua(ł|l)",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_head_lines() -> usize {
    8
}
fn default_key_lines() -> usize {
    12
}
fn default_tail_lines() -> usize {
    6
}
fn default_convert_timeout() -> u64 {
    300
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            essence_path: default_essence_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            essence_budget: default_essence_budget(),
            min_essence_chars: default_min_essence_chars(),
            keyword_bonus: default_keyword_bonus(),
            ranking_keywords: default_ranking_keywords(),
            distill_keywords: default_distill_keywords(),
            head_lines: default_head_lines(),
            key_lines: default_key_lines(),
            tail_lines: default_tail_lines(),
            distill_on_startup: true,
            convert_command: None,
            convert_timeout_secs: default_convert_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Durable memory artifact (JSON array of `{role, content}`)
    #[serde(default = "default_memory_path")]
    pub path: String,

    /// Entries kept on disk
    #[serde(default = "default_persisted_cap")]
    pub persisted_cap: usize,

    /// Most recent entries included in each request
    #[serde(default = "default_window")]
    pub window: usize,
}

fn default_memory_path() -> String {
    "memory.json".into()
}
fn default_persisted_cap() -> usize {
    1_000
}
fn default_window() -> usize {
    60
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: default_memory_path(),
            persisted_cap: default_persisted_cap(),
            window: default_window(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Override the persona prompt entirely (skips file loading)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Persona file, e.g. `PERSONA.md`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Shared secret required on every request when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: usize,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_rate_limit() -> usize {
    60
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            api_token: None,
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentsConfig {
    /// Root that attachment paths are confined to
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,

    /// Larger files are dropped rather than inlined
    #[serde(default = "default_max_attachment_bytes")]
    pub max_bytes: u64,
}

fn default_uploads_dir() -> String {
    "uploads".into()
}
fn default_max_attachment_bytes() -> u64 {
    10 * 1024 * 1024
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
            max_bytes: default_max_attachment_bytes(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (`~/.atlas/config.toml`),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Environment overrides (highest priority):
    /// - `ATLAS_API_KEY`, then `OPENAI_API_KEY` (only when no key is configured)
    /// - `ATLAS_MODEL`, then `MODEL`
    /// - `ATLAS_API_TOKEN`, then `API_TOKEN`
    /// - `ATLAS_PORT`, then `PORT`
    pub fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = env_first(&["ATLAS_API_KEY", "OPENAI_API_KEY"]);
        }
        if let Some(model) = env_first(&["ATLAS_MODEL", "MODEL"]) {
            self.default_model = model;
        }
        if let Some(token) = env_first(&["ATLAS_API_TOKEN", "API_TOKEN"]) {
            self.gateway.api_token = Some(token);
        }
        if let Some(port) = env_first(&["ATLAS_PORT", "PORT"]).and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        match std::env::var("ATLAS_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs_home().join(".atlas"),
        }
    }

    /// Resolve a configured path against `workspace_dir`.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            Path::new(&self.workspace_dir).join(p)
        }
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.resolve_path(&self.knowledge.documents_dir)
    }

    pub fn essence_path(&self) -> PathBuf {
        self.resolve_path(&self.knowledge.essence_path)
    }

    pub fn memory_path(&self) -> PathBuf {
        self.resolve_path(&self.memory.path)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.resolve_path(&self.attachments.uploads_dir)
    }

    pub fn persona_file(&self) -> Option<PathBuf> {
        self.persona.file.as_deref().map(|f| self.resolve_path(f))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(t) = self.default_temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let k = &self.knowledge;
        if k.chunk_overlap == 0 || k.chunk_overlap >= k.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "knowledge.chunk_overlap must satisfy 0 < overlap < chunk_size (got {} / {})",
                k.chunk_overlap, k.chunk_size
            )));
        }
        if k.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.top_k must be > 0".into(),
            ));
        }
        if k.keyword_bonus < 0.0 {
            return Err(ConfigError::ValidationError(
                "knowledge.keyword_bonus must be >= 0".into(),
            ));
        }
        for pattern in k.ranking_keywords.iter().chain(&k.distill_keywords) {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigError::ValidationError(format!(
                    "invalid keyword pattern '{pattern}': {e}"
                )));
            }
        }

        if self.memory.window > self.memory.persisted_cap {
            return Err(ConfigError::ValidationError(
                "memory.window must not exceed memory.persisted_cap".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: None,
            default_max_tokens: None,
            request_timeout_secs: default_request_timeout(),
            workspace_dir: default_workspace_dir(),
            knowledge: KnowledgeConfig::default(),
            memory: MemoryConfig::default(),
            persona: PersonaConfig::default(),
            gateway: GatewayConfig::default(),
            attachments: AttachmentsConfig::default(),
            providers: HashMap::new(),
        }
    }
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|n| std::env::var(n).ok().filter(|v| !v.is_empty()))
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
