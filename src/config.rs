//! TOML configuration for the tutor.
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! working configuration that points at `./books` and `./data/index.sqlite`.
//! The OpenAI credential is never stored here; it is read from the
//! environment by [`require_api_key`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::TutorError;

/// Environment variable holding the OpenAI credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Upper bound for `server.session_ttl_secs` (ten years).
pub const MAX_SESSION_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub partitioner: PartitionerConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Directory of PDF files; one subdirectory per book is also accepted.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    /// Where the persisted vector index lives.
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            index_path: default_index_path(),
        }
    }
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("./books")
}
fn default_index_path() -> PathBuf {
    PathBuf::from("./data/index.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            base_url: default_openai_base_url(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Sampling temperature for answers.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Sampling temperature for the standalone-question rewrite.
    #[serde(default)]
    pub rephrase_temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: default_temperature(),
            rephrase_temperature: 0.0,
            timeout_secs: default_timeout_secs(),
            base_url: default_openai_base_url(),
        }
    }
}

fn default_llm_model() -> String {
    "gpt-4.1-mini".to_string()
}
fn default_temperature() -> f32 {
    0.2
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConversationConfig {
    /// `local` replays a history buffer; `continuation` threads a server-side
    /// response id.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Rewrite follow-up questions into standalone form before retrieval.
    #[serde(default = "default_true")]
    pub rewrite_questions: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            rewrite_questions: true,
        }
    }
}

fn default_strategy() -> String {
    "local".to_string()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct PartitionerConfig {
    /// `unstructured` (HTTP partition API) or `pdf-extract` (local).
    #[serde(default = "default_partitioner_provider")]
    pub provider: String,
    #[serde(default = "default_partitioner_url")]
    pub url: String,
    /// Name of the env var holding the partition API key, if any.
    #[serde(default = "default_partitioner_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_partition_strategy")]
    pub strategy: String,
    #[serde(default = "default_chunking_strategy")]
    pub chunking_strategy: String,
    #[serde(default = "default_true")]
    pub infer_table_structure: bool,
    #[serde(default = "default_partition_timeout_secs")]
    pub timeout_secs: u64,
    /// Paragraph chunk size for the local partitioner.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for PartitionerConfig {
    fn default() -> Self {
        Self {
            provider: default_partitioner_provider(),
            url: default_partitioner_url(),
            api_key_env: default_partitioner_key_env(),
            strategy: default_partition_strategy(),
            chunking_strategy: default_chunking_strategy(),
            infer_table_structure: true,
            timeout_secs: default_partition_timeout_secs(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_partitioner_provider() -> String {
    "unstructured".to_string()
}
fn default_partitioner_url() -> String {
    "http://localhost:8000/general/v0/general".to_string()
}
fn default_partitioner_key_env() -> String {
    "UNSTRUCTURED_API_KEY".to_string()
}
fn default_partition_strategy() -> String {
    "hi_res".to_string()
}
fn default_chunking_strategy() -> String {
    "by_title".to_string()
}
fn default_partition_timeout_secs() -> u64 {
    600
}
fn default_max_tokens() -> usize {
    500
}

/// Optional prompt overrides, fixed for the lifetime of the process.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PromptsConfig {
    pub system_prompt: Option<String>,
    /// Must contain `{chat_history}` and `{question}`.
    pub rephrase_template: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}
fn default_session_ttl_secs() -> u64 {
    3600
}

/// Load and validate a config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.partitioner.max_tokens == 0 {
        anyhow::bail!("partitioner.max_tokens must be > 0");
    }

    match config.embedding.provider.as_str() {
        "openai" => {}
        other => anyhow::bail!("Unknown embedding provider: '{}'. Must be openai.", other),
    }

    match config.conversation.strategy.as_str() {
        "local" | "continuation" => {}
        other => anyhow::bail!(
            "Unknown conversation strategy: '{}'. Must be local or continuation.",
            other
        ),
    }

    match config.partitioner.provider.as_str() {
        "unstructured" | "pdf-extract" => {}
        other => anyhow::bail!(
            "Unknown partitioner: '{}'. Must be unstructured or pdf-extract.",
            other
        ),
    }

    if config.server.session_ttl_secs > MAX_SESSION_TTL_SECS {
        anyhow::bail!(
            "server.session_ttl_secs must be <= {} (ten years)",
            MAX_SESSION_TTL_SECS
        );
    }

    if let Some(template) = &config.prompts.rephrase_template {
        if !template.contains("{chat_history}") || !template.contains("{question}") {
            anyhow::bail!("prompts.rephrase_template must contain {{chat_history}} and {{question}}");
        }
    }

    Ok(())
}

/// Read the OpenAI credential from the environment.
///
/// Called before any other startup work; a missing or blank key is fatal.
pub fn require_api_key() -> Result<String, TutorError> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(TutorError::MissingCredential(API_KEY_ENV)),
    }
}
