//! Chat completion backends.
//!
//! [`ChatBackend`] hides which remote endpoint serves a request:
//!
//! | [`ChatMode`] | Endpoint | History |
//! |--------------|----------|---------|
//! | `Stateless` | `POST {base_url}/chat/completions` | replayed by the caller |
//! | `Threaded` | `POST {base_url}/responses` | kept server-side via `previous_response_id` |
//!
//! Requests are not retried; the HTTP client timeout is `llm.timeout_secs`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::models::{Role, Turn};

/// A message sent to the chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User.as_str().to_string(),
            content: content.into(),
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        }
    }
}

/// How conversational context reaches the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMode {
    /// Every call carries its full history.
    Stateless,
    /// The server resumes from `previous` (if any) and returns a new id.
    Threaded { previous: Option<String> },
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub mode: ChatMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub text: String,
    /// Continuation token for the next threaded call.
    pub response_id: Option<String>,
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse>;
}

// ============ OpenAI ============

pub struct OpenAIChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build chat HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
        })
    }

    async fn post(&self, endpoint: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to call {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChatBackend for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        match &request.mode {
            ChatMode::Stateless => {
                let body = serde_json::json!({
                    "model": self.model,
                    "messages": request.messages,
                    "temperature": request.temperature,
                });
                let json = self.post("chat/completions", &body).await?;
                parse_chat_completion(&json)
            }
            ChatMode::Threaded { previous } => {
                let mut body = serde_json::json!({
                    "model": self.model,
                    "input": request.messages,
                    "temperature": request.temperature,
                });
                if let Some(id) = previous {
                    body["previous_response_id"] = serde_json::Value::String(id.clone());
                }
                let json = self.post("responses", &body).await?;
                parse_responses_output(&json)
            }
        }
    }
}

/// Extract `choices[0].message.content`.
fn parse_chat_completion(json: &serde_json::Value) -> Result<ChatResponse> {
    let text = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))?;
    Ok(ChatResponse {
        text: text.to_string(),
        response_id: None,
    })
}

/// Concatenate every `output_text` part of the Responses API `output` array.
fn parse_responses_output(json: &serde_json::Value) -> Result<ChatResponse> {
    let id = json
        .get("id")
        .and_then(|i| i.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid responses payload: missing id"))?;
    let output = json
        .get("output")
        .and_then(|o| o.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid responses payload: missing output array"))?;

    let mut text = String::new();
    for item in output.iter().filter(|i| i["type"] == "message") {
        for part in item["content"].as_array().into_iter().flatten() {
            if part["type"] == "output_text" {
                if let Some(t) = part["text"].as_str() {
                    text.push_str(t);
                }
            }
        }
    }

    if text.is_empty() {
        bail!("Invalid responses payload: no output_text");
    }

    Ok(ChatResponse {
        text,
        response_id: Some(id.to_string()),
    })
}

pub fn create_backend(config: &LlmConfig, api_key: &str) -> Result<Arc<dyn ChatBackend>> {
    Ok(Arc::new(OpenAIChat::new(config, api_key)?))
}
