//! Web chat sessions.
//!
//! Each browser tab owns one [`Session`], keyed by a random UUID. The store
//! hands out `Arc<Mutex<Session>>` so a session's questions are answered one
//! at a time while different sessions proceed concurrently.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::MAX_SESSION_TTL_SECS;
use crate::conversation::{self, ConversationState};
use crate::models::{ScoredChunk, Turn};
use crate::tutor::{Reply, Tutor};

pub struct Session {
    pub id: Uuid,
    conversation: Box<dyn ConversationState>,
    /// Everything shown in the chat pane, including failed replies.
    transcript: Vec<Turn>,
    /// Excerpts retrieved for the most recent answered question.
    sources: Vec<ScoredChunk>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub strategy: &'static str,
    pub transcript: Vec<Turn>,
    pub sources: Vec<ScoredChunk>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    fn new(conversation: Box<dyn ConversationState>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            conversation,
            transcript: Vec::new(),
            sources: Vec::new(),
            created_at: now,
            last_active: now,
        }
    }

    pub async fn ask(&mut self, tutor: &Tutor, question: &str) -> Reply {
        self.last_active = Utc::now();
        let reply = tutor.ask(self.conversation.as_mut(), question).await;

        self.transcript.push(Turn::user(question));
        self.transcript.push(Turn::assistant(reply.text.clone()));
        if !reply.sources.is_empty() {
            self.sources = reply.sources.clone();
        }
        self.last_active = Utc::now();
        reply
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            strategy: self.conversation.strategy(),
            transcript: self.transcript.clone(),
            sources: self.sources.clone(),
            created_at: self.created_at,
            last_active: self.last_active,
        }
    }
}

pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>,
    strategy: String,
    ttl: chrono::Duration,
}

impl SessionStore {
    pub fn new(strategy: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            strategy: strategy.into(),
            ttl: chrono::Duration::seconds(ttl_secs.min(MAX_SESSION_TTL_SECS) as i64),
        }
    }

    /// Start a new session, evicting idle ones first.
    pub async fn create(&self) -> Result<Arc<Mutex<Session>>> {
        self.evict_idle(Utc::now()).await;

        let session = Session::new(conversation::create_conversation(&self.strategy)?);
        let id = session.id;
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, handle.clone());
        tracing::info!(session = %id, "session created");
        Ok(handle)
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!(session = %id, "session closed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop sessions idle since before `now - ttl`. A session that is busy
    /// answering is never evicted. Returns how many were dropped.
    pub async fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now.checked_sub_signed(self.ttl).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => session.last_active >= cutoff,
            Err(_) => true,
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, "evicted idle sessions");
        }
        evicted
    }
}
