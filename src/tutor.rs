//! The tutor: one question in, one cited answer out.
//!
//! Each call to [`Tutor::ask`] runs
//!
//! ```text
//! Received ─▶ Rewritten? ─▶ Retrieved ─▶ Prompted ─▶ Answered
//!                 │              │            │
//!                 └ falls back   └────────────┴──▶ Failed
//! ```
//!
//! A rewrite failure falls back to the original question. Any failure after
//! that is caught here and turned into a user-visible reply; the
//! conversation state is only touched on success, so the session stays
//! usable.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

use crate::config::{self, Config};
use crate::conversation::ConversationState;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::TutorError;
use crate::index::{self, VectorIndex};
use crate::llm::{self, ChatBackend, ChatMessage, ChatMode, ChatRequest};
use crate::models::{ScoredChunk, Turn};
use crate::partition;
use crate::prompts;

/// Reply text when no index could be loaded or built.
pub const UNAVAILABLE_MESSAGE: &str = "Sorry, the document system is not available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Answered,
    Unavailable,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub text: String,
    pub status: ReplyStatus,
    /// The question retrieval actually ran against.
    pub search_query: String,
    pub sources: Vec<ScoredChunk>,
    /// Formatted source block, as sent to the model.
    pub context: String,
}

impl Reply {
    fn unavailable(question: &str) -> Self {
        Self {
            text: UNAVAILABLE_MESSAGE.to_string(),
            status: ReplyStatus::Unavailable,
            search_query: question.to_string(),
            sources: Vec::new(),
            context: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Received,
    Rewritten,
    Retrieved,
    Prompted,
    Answered,
    Failed,
}

#[derive(Debug, Clone)]
pub struct TutorSettings {
    pub top_k: usize,
    pub temperature: f32,
    pub rephrase_temperature: f32,
    pub rewrite_questions: bool,
    pub system_prompt: String,
    pub rephrase_template: String,
}

impl Default for TutorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl TutorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            temperature: config.llm.temperature,
            rephrase_temperature: config.llm.rephrase_temperature,
            rewrite_questions: config.conversation.rewrite_questions,
            system_prompt: config
                .prompts
                .system_prompt
                .clone()
                .unwrap_or_else(|| prompts::RAG_SYSTEM_PROMPT.to_string()),
            rephrase_template: config
                .prompts
                .rephrase_template
                .clone()
                .unwrap_or_else(|| prompts::REPHRASE_PROMPT_TEMPLATE.to_string()),
        }
    }
}

pub struct Tutor {
    index: Option<Arc<VectorIndex>>,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatBackend>,
    settings: TutorSettings,
}

impl Tutor {
    pub fn new(
        index: Option<Arc<VectorIndex>>,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatBackend>,
        settings: TutorSettings,
    ) -> Self {
        Self {
            index,
            embedder,
            chat,
            settings,
        }
    }

    /// Validate the credential, set up clients, and load or build the index.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let api_key = config::require_api_key()?;
        tracing::info!("initializing tutor");

        let embedder = embedding::create_provider(&config.embedding, &api_key)?;
        let chat = llm::create_backend(&config.llm, &api_key)?;
        tracing::info!(
            chat_model = chat.model_name(),
            embedding_model = embedder.model_name(),
            "model clients ready"
        );
        let partitioner = partition::create_partitioner(&config.partitioner)?;

        let index = index::load_or_build(
            &config.paths.index_path,
            &config.paths.source_dir,
            partitioner.as_ref(),
            embedder.as_ref(),
            config.embedding.batch_size,
        )
        .await
        .context("failed to set up the document index")?;

        if index.is_some() {
            tracing::info!("tutor is ready to chat");
        } else {
            tracing::error!("tutor initialization failed: could not set up document retriever");
        }

        Ok(Self::new(index, embedder, chat, TutorSettings::from_config(config)))
    }

    pub fn is_ready(&self) -> bool {
        self.index.is_some()
    }

    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.as_deref()
    }

    /// Retrieval only, without the chat call.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let index = self
            .index
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!(UNAVAILABLE_MESSAGE))?;
        index.query(self.embedder.as_ref(), query, k).await
    }

    /// Answer one question within `conversation`.
    pub async fn ask(&self, conversation: &mut dyn ConversationState, question: &str) -> Reply {
        enter(Stage::Received);
        let index = match &self.index {
            Some(index) => index.clone(),
            None => return Reply::unavailable(question),
        };

        let search_query = self.search_query(&*conversation, question).await;
        tracing::info!(query = %search_query, "searching for documents");

        match self
            .answer(&index, &*conversation, question, &search_query)
            .await
        {
            Ok((text, response_id, sources, context)) => {
                conversation.record(question, &text, response_id);
                enter(Stage::Answered);
                Reply {
                    text,
                    status: ReplyStatus::Answered,
                    search_query,
                    sources,
                    context,
                }
            }
            Err(e) => {
                enter(Stage::Failed);
                tracing::error!(error = %e, "failed to get response");
                Reply {
                    text: format!("An error occurred while generating the response: {}", e),
                    status: ReplyStatus::Failed,
                    search_query,
                    sources: Vec::new(),
                    context: String::new(),
                }
            }
        }
    }

    /// The standalone form of `question`, or `question` itself.
    async fn search_query(&self, conversation: &dyn ConversationState, question: &str) -> String {
        let history = conversation.replay();
        if !self.settings.rewrite_questions || history.is_empty() {
            return question.to_string();
        }

        match self.rewrite(history, question).await {
            Ok(rewritten) => {
                enter(Stage::Rewritten);
                rewritten
            }
            Err(e) => {
                tracing::warn!(error = %e, "using original question");
                question.to_string()
            }
        }
    }

    async fn rewrite(&self, history: &[Turn], question: &str) -> Result<String, TutorError> {
        let prompt = prompts::render_rephrase(&self.settings.rephrase_template, history, question);
        let request = ChatRequest {
            messages: vec![ChatMessage::user(prompt)],
            temperature: self.settings.rephrase_temperature,
            mode: ChatMode::Stateless,
        };
        let response = self
            .chat
            .complete(request)
            .await
            .map_err(|e| TutorError::Rewrite(format!("{:#}", e)))?;
        let rewritten = response.text.trim();
        if rewritten.is_empty() {
            return Err(TutorError::Rewrite("empty rewrite".to_string()));
        }
        Ok(rewritten.to_string())
    }

    async fn answer(
        &self,
        index: &VectorIndex,
        conversation: &dyn ConversationState,
        question: &str,
        search_query: &str,
    ) -> Result<(String, Option<String>, Vec<ScoredChunk>, String), TutorError> {
        let sources = index
            .query(self.embedder.as_ref(), search_query, self.settings.top_k)
            .await
            .map_err(|e| TutorError::Answer(format!("{:#}", e)))?;
        enter(Stage::Retrieved);

        let context = prompts::format_context(&sources);
        let messages = assemble_messages(
            &self.settings.system_prompt,
            conversation.replay(),
            &context,
            question,
        );
        enter(Stage::Prompted);

        let response = self
            .chat
            .complete(ChatRequest {
                messages,
                temperature: self.settings.temperature,
                mode: conversation.chat_mode(),
            })
            .await
            .map_err(|e| TutorError::Answer(format!("{:#}", e)))?;

        Ok((response.text, response.response_id, sources, context))
    }
}

/// System prompt, replayed history, then the context-bearing user turn.
pub fn assemble_messages(
    system_prompt: &str,
    history: &[Turn],
    context: &str,
    question: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(history.iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(prompts::build_user_turn(context, question)));
    messages
}

fn enter(stage: Stage) {
    tracing::debug!(?stage, "ask");
}
