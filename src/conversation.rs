//! Conversation state strategies.
//!
//! Both strategies sit behind [`ConversationState`] and are chosen once by
//! `conversation.strategy`:
//!
//! - **[`LocalBuffer`]** (`local`): keeps every turn and replays it into
//!   each chat call. The buffer is unbounded.
//! - **[`ServerThread`]** (`continuation`): keeps only the last response id;
//!   the chat service reconstructs history.

use anyhow::{bail, Result};

use crate::llm::ChatMode;
use crate::models::Turn;

pub trait ConversationState: Send + Sync {
    /// Strategy name as written in config.
    fn strategy(&self) -> &'static str;

    /// Turns to replay before the current question. Empty when history is
    /// held server-side.
    fn replay(&self) -> &[Turn];

    /// How the next chat call should carry context.
    fn chat_mode(&self) -> ChatMode;

    /// Record a completed exchange.
    fn record(&mut self, question: &str, answer: &str, response_id: Option<String>);

    /// Completed exchanges so far.
    fn exchanges(&self) -> usize;

    /// Forget everything.
    fn reset(&mut self);
}

#[derive(Debug, Default)]
pub struct LocalBuffer {
    turns: Vec<Turn>,
}

impl LocalBuffer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationState for LocalBuffer {
    fn strategy(&self) -> &'static str {
        "local"
    }

    fn replay(&self) -> &[Turn] {
        &self.turns
    }

    fn chat_mode(&self) -> ChatMode {
        ChatMode::Stateless
    }

    fn record(&mut self, question: &str, answer: &str, _response_id: Option<String>) {
        self.turns.push(Turn::user(question));
        self.turns.push(Turn::assistant(answer));
    }

    fn exchanges(&self) -> usize {
        self.turns.len() / 2
    }

    fn reset(&mut self) {
        self.turns.clear();
    }
}

#[derive(Debug, Default)]
pub struct ServerThread {
    previous_response_id: Option<String>,
    exchanges: usize,
}

impl ServerThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_response_id(&self) -> Option<&str> {
        self.previous_response_id.as_deref()
    }
}

impl ConversationState for ServerThread {
    fn strategy(&self) -> &'static str {
        "continuation"
    }

    fn replay(&self) -> &[Turn] {
        &[]
    }

    fn chat_mode(&self) -> ChatMode {
        ChatMode::Threaded {
            previous: self.previous_response_id.clone(),
        }
    }

    fn record(&mut self, _question: &str, _answer: &str, response_id: Option<String>) {
        if response_id.is_none() {
            tracing::warn!("chat response carried no continuation id; next turn starts a new thread");
        }
        self.previous_response_id = response_id;
        self.exchanges += 1;
    }

    fn exchanges(&self) -> usize {
        self.exchanges
    }

    fn reset(&mut self) {
        self.previous_response_id = None;
        self.exchanges = 0;
    }
}

/// Create a fresh conversation for the configured strategy.
pub fn create_conversation(strategy: &str) -> Result<Box<dyn ConversationState>> {
    match strategy {
        "local" => Ok(Box::new(LocalBuffer::new())),
        "continuation" => Ok(Box::new(ServerThread::new())),
        other => bail!("Unknown conversation strategy: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_local_buffer_appends_in_order() {
        let mut conv = LocalBuffer::new();
        conv.record("q1", "a1", None);
        conv.record("q2", "a2", Some("ignored".to_string()));
        let roles: Vec<Role> = conv.replay().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(conv.replay()[2].content, "q2");
        assert_eq!(conv.exchanges(), 2);
        assert_eq!(conv.chat_mode(), ChatMode::Stateless);
    }

    #[test]
    fn test_server_thread_tracks_latest_id() {
        let mut conv = ServerThread::new();
        assert_eq!(conv.chat_mode(), ChatMode::Threaded { previous: None });
        conv.record("q1", "a1", Some("resp_1".to_string()));
        conv.record("q2", "a2", Some("resp_2".to_string()));
        assert!(conv.replay().is_empty());
        assert_eq!(
            conv.chat_mode(),
            ChatMode::Threaded {
                previous: Some("resp_2".to_string())
            }
        );
        assert_eq!(conv.exchanges(), 2);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut local = LocalBuffer::new();
        local.record("q", "a", None);
        local.reset();
        assert!(local.replay().is_empty());

        let mut thread = ServerThread::new();
        thread.record("q", "a", Some("resp".to_string()));
        thread.reset();
        assert_eq!(thread.previous_response_id(), None);
    }

    #[test]
    fn test_create_conversation_by_name() {
        assert_eq!(create_conversation("local").unwrap().strategy(), "local");
        assert_eq!(
            create_conversation("continuation").unwrap().strategy(),
            "continuation"
        );
        assert!(create_conversation("window").is_err());
    }
}
