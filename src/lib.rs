//! # VidyaSetu
//!
//! A conversational tutor that answers questions from a fixed library of PDF
//! textbooks, citing the book, file, and page each answer draws on.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  PDF books  │──▶│ Partition +  │──▶│ VectorIndex  │
//! │ source_dir  │   │    Embed     │   │  (SQLite)    │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                            │
//!                    ┌───────────────────────┤
//!                    ▼                       ▼
//!              ┌──────────┐  rewrite   ┌──────────┐
//!              │  Tutor   │◀──────────▶│ Chat API │
//!              └────┬─────┘  answer    └──────────┘
//!                   │
//!         ┌─────────┴─────────┐
//!         ▼                   ▼
//!   ┌──────────┐        ┌──────────┐
//!   │   REPL   │        │ Web chat │
//!   └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! mkdir -p books/"Themes in World History" && cp chapter*.pdf books/"Themes in World History"/
//! vidyasetu index build          # partition, embed, and persist
//! vidyasetu chat                 # terminal chat
//! vidyasetu serve                # browser chat on 127.0.0.1:8501
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Domain error taxonomy |
//! | [`models`] | Core data types |
//! | [`partition`] | PDF partitioning (Unstructured API or local text extraction) |
//! | [`chunk`] | Paragraph splitting for locally extracted text |
//! | [`ingest`] | Source directory walk and provenance tagging |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Flat cosine vector index and its persistence |
//! | [`db`] | SQLite connection for the index file |
//! | [`llm`] | Chat backends (stateless and threaded) |
//! | [`conversation`] | Conversation state strategies |
//! | [`prompts`] | Prompt text and context formatting |
//! | [`tutor`] | Question answering pipeline |
//! | [`session`] | Web chat sessions |
//! | [`shell`] | Terminal chat loop |
//! | [`server`] | Web chat HTTP server |
//! | [`search`] | Retrieval-only command |
//! | [`index_cmd`] | Index build and info commands |
//! | [`logging`] | tracing subscriber setup |

pub mod chunk;
pub mod config;
pub mod conversation;
pub mod db;
pub mod embedding;
pub mod error;
pub mod index;
pub mod index_cmd;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod models;
pub mod partition;
pub mod prompts;
pub mod search;
pub mod server;
pub mod session;
pub mod shell;
pub mod tutor;
