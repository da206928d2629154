//! Domain error taxonomy.
//!
//! Most functions return `anyhow::Result`; these variants mark the failure
//! classes the tutor treats differently. Only [`TutorError::MissingCredential`]
//! aborts the process. The others are logged and either skipped, degraded to
//! the "unavailable" reply, or turned into a user-visible error string.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    /// Startup credential absent.
    #[error("FATAL: {0} environment variable not set. Please create a .env file.")]
    MissingCredential(&'static str),

    /// One source file could not be partitioned.
    #[error("failed to process {path}: {reason}")]
    IngestionFailed { path: PathBuf, reason: String },

    /// Nothing to index.
    #[error("no documents were extracted; cannot create vector index")]
    EmptyCorpus,

    /// The standalone-question rewrite did not produce usable text.
    #[error("question rewrite failed: {0}")]
    Rewrite(String),

    /// Embedding, retrieval, or chat completion failed during `ask`.
    #[error("{0}")]
    Answer(String),
}
