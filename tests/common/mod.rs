//! In-memory stand-ins for the remote services.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use vidyasetu::embedding::EmbeddingProvider;
use vidyasetu::llm::{ChatBackend, ChatMode, ChatRequest, ChatResponse};
use vidyasetu::partition::{Element, Partitioner};
use vidyasetu::tutor::{Tutor, TutorSettings};

const VOCAB: [&str; 4] = ["river", "empire", "trade", "writing"];

/// Embeds text as keyword counts plus a constant bias dimension.
pub struct KeywordEmbedder {
    fail: AtomicBool,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_from_now(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn dims(&self) -> usize {
        VOCAB.len() + 1
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("embedding service unreachable");
        }
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let mut v: Vec<f32> = VOCAB
                    .iter()
                    .map(|w| lower.matches(w).count() as f32)
                    .collect();
                v.push(0.1);
                v
            })
            .collect())
    }
}

/// Replays queued outcomes and records every request.
///
/// Once the queue is empty it answers `answer-N` with id `resp_N`.
pub struct ScriptedChat {
    script: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn then_reply(&self, text: &str) -> &Self {
        self.script.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn then_fail(&self, message: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedChat {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        let threaded = matches!(request.mode, ChatMode::Threaded { .. });
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        let next = self.script.lock().unwrap().pop_front();
        let text = match next {
            Some(Ok(text)) => text,
            Some(Err(message)) => bail!("{}", message),
            None => format!("answer-{}", n),
        };
        Ok(ChatResponse {
            text,
            response_id: threaded.then(|| format!("resp_{}", n)),
        })
    }
}

/// Returns canned elements keyed by file name; unknown files fail.
pub struct StaticPartitioner {
    files: HashMap<String, Vec<Element>>,
}

impl StaticPartitioner {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
        }
    }

    pub fn with_file(mut self, name: &str, elements: Vec<(&str, Option<u32>)>) -> Self {
        self.files.insert(
            name.to_string(),
            elements
                .into_iter()
                .map(|(text, page)| Element {
                    text: text.to_string(),
                    page_number: page,
                    kind: Some("NarrativeText".to_string()),
                })
                .collect(),
        );
        self
    }
}

#[async_trait]
impl Partitioner for StaticPartitioner {
    fn name(&self) -> &str {
        "static"
    }

    async fn partition(&self, path: &Path) -> Result<Vec<Element>> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match self.files.get(&name) {
            Some(elements) => Ok(elements.clone()),
            None => bail!("unreadable PDF: {}", name),
        }
    }
}

/// Write empty placeholder PDFs; the partitioner never reads them.
pub fn touch_pdfs(dir: &Path, names: &[&str]) {
    for name in names {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"%PDF-1.4").unwrap();
    }
}

/// The two-page chapter used across scenarios: page 1 yields two chunks,
/// page 2 one.
pub fn history_chapter() -> StaticPartitioner {
    StaticPartitioner::new().with_file(
        "chapter1.pdf",
        vec![
            ("The river valleys fed the first cities.", Some(1)),
            ("", Some(1)),
            ("An empire rose on river trade and tribute.", Some(1)),
            ("Writing began as a record of trade.", Some(2)),
        ],
    )
}

pub fn tutor_with(
    index: Option<Arc<vidyasetu::index::VectorIndex>>,
    embedder: Arc<KeywordEmbedder>,
    chat: Arc<ScriptedChat>,
) -> Tutor {
    Tutor::new(index, embedder, chat, TutorSettings::default())
}
