//! Flat vector index over embedded chunks, persisted as a SQLite file.
//!
//! The index is built once from a full document set and is read-only
//! afterwards. Queries are brute-force cosine similarity over every stored
//! vector. Results are ordered by descending similarity; equal scores keep
//! insertion order, so the chunk ingested first ranks first.
//!
//! # Persistence
//!
//! ```text
//! index_meta(key, value)        model, dims, built_at, fingerprint, chunk_count
//! chunks(position, text, book_title, source_file, page_number,
//!        element_kind, hash, embedding BLOB)
//! ```
//!
//! [`VectorIndex::save`] writes to a sibling temp file and renames it over
//! the target, so an interrupted save never leaves a half-written index at
//! the configured path.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::Row;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::TutorError;
use crate::ingest;
use crate::models::{Chunk, EmbeddedChunk, ScoredChunk};
use crate::partition::Partitioner;

/// Build-time facts stored alongside the vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMeta {
    pub model: String,
    pub dims: usize,
    pub built_at: DateTime<Utc>,
    /// SHA-256 over every chunk's text hash, book, file, and page, in
    /// insertion order.
    pub fingerprint: String,
}

pub struct VectorIndex {
    meta: IndexMeta,
    entries: Vec<EmbeddedChunk>,
}

impl VectorIndex {
    /// Embed `chunks` and build an index. An empty chunk set is an error.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(TutorError::EmptyCorpus.into());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedding::embed_batched(embedder, &texts, batch_size).await?;

        let entries: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
            .collect();

        let meta = IndexMeta {
            model: embedder.model_name().to_string(),
            dims: embedder.dims(),
            built_at: Utc::now(),
            fingerprint: fingerprint(&entries),
        };

        Ok(Self { meta, entries })
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    /// Chunk counts per book title.
    pub fn books(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for chunk in self.chunks() {
            *counts.entry(chunk.book_title.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Top-`k` chunks nearest to `query_vec`.
    pub fn query_vector(&self, query_vec: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, e)| {
                let sim = embedding::cosine_similarity(query_vec, &e.vector);
                (pos, if sim.is_nan() { f32::NEG_INFINITY } else { sim })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(pos, score)| ScoredChunk {
                chunk: self.entries[pos].chunk.clone(),
                score,
            })
            .collect()
    }

    /// Embed `text` and return the top-`k` chunks.
    pub async fn query(
        &self,
        embedder: &dyn EmbeddingProvider,
        text: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let query_vec = embedding::embed_query(embedder, text).await?;
        Ok(self.query_vector(&query_vec, k))
    }

    /// Persist to `path`, replacing any existing index there.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let tmp = temp_path(path);
        remove_if_exists(&tmp)?;

        let pool = db::connect(&tmp, true).await?;
        db::create_schema(&pool).await?;

        let mut tx = pool.begin().await?;
        for (pos, entry) in self.entries.iter().enumerate() {
            let c = &entry.chunk;
            sqlx::query(
                "INSERT INTO chunks (position, text, book_title, source_file, page_number, element_kind, hash, embedding) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(pos as i64)
            .bind(&c.text)
            .bind(&c.book_title)
            .bind(&c.source_file)
            .bind(c.page_number.map(i64::from))
            .bind(&c.element_kind)
            .bind(text_hash(&c.text))
            .bind(embedding::vec_to_blob(&entry.vector))
            .execute(&mut *tx)
            .await?;
        }

        let meta_rows = [
            ("model", self.meta.model.clone()),
            ("dims", self.meta.dims.to_string()),
            ("built_at", self.meta.built_at.to_rfc3339()),
            ("fingerprint", self.meta.fingerprint.clone()),
            ("chunk_count", self.entries.len().to_string()),
        ];
        for (key, value) in meta_rows {
            sqlx::query("INSERT INTO index_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        pool.close().await;

        remove_if_exists(path)?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("failed to move index into place at {}", path.display()))?;
        Ok(())
    }

    /// Load a persisted index. Returns `Ok(None)` if nothing exists at `path`.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let pool = db::connect(path, false).await?;

        let meta_rows = sqlx::query("SELECT key, value FROM index_meta")
            .fetch_all(&pool)
            .await
            .with_context(|| format!("{} is not a vector index", path.display()))?;
        let mut meta_map = BTreeMap::new();
        for row in &meta_rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            meta_map.insert(key, value);
        }

        let get = |key: &str| {
            meta_map
                .get(key)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("index metadata is missing '{}'", key))
        };
        let dims: usize = get("dims")?.parse().context("invalid dims in index metadata")?;
        let built_at = DateTime::parse_from_rfc3339(&get("built_at")?)
            .context("invalid built_at in index metadata")?
            .with_timezone(&Utc);
        let stored_fingerprint = get("fingerprint")?;

        let rows = sqlx::query(
            "SELECT text, book_title, source_file, page_number, element_kind, embedding FROM chunks ORDER BY position",
        )
        .fetch_all(&pool)
        .await?;
        pool.close().await;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.try_get("embedding")?;
            let vector = embedding::blob_to_vec(&blob);
            if vector.len() != dims {
                bail!(
                    "index vector has {} dimensions, metadata says {}",
                    vector.len(),
                    dims
                );
            }
            let page_number: Option<i64> = row.try_get("page_number")?;
            entries.push(EmbeddedChunk {
                chunk: Chunk {
                    text: row.try_get("text")?,
                    book_title: row.try_get("book_title")?,
                    source_file: row.try_get("source_file")?,
                    page_number: page_number.and_then(|p| u32::try_from(p).ok()),
                    element_kind: row.try_get("element_kind")?,
                },
                vector,
            });
        }

        let computed = fingerprint(&entries);
        if computed != stored_fingerprint {
            tracing::warn!(
                path = %path.display(),
                "index fingerprint mismatch; the file may be damaged, rebuild with `index build --force`"
            );
        }

        Ok(Some(Self {
            meta: IndexMeta {
                model: get("model")?,
                dims,
                built_at,
                fingerprint: stored_fingerprint,
            },
            entries,
        }))
    }
}

/// Load the persisted index, or ingest `source_dir` and build one.
///
/// Returns `Ok(None)` when there is nothing to index; the tutor then runs
/// without a retriever.
pub async fn load_or_build(
    index_path: &Path,
    source_dir: &Path,
    partitioner: &dyn Partitioner,
    embedder: &dyn EmbeddingProvider,
    batch_size: usize,
) -> Result<Option<Arc<VectorIndex>>> {
    if let Some(index) = VectorIndex::load(index_path).await? {
        tracing::info!(
            path = %index_path.display(),
            chunks = index.len(),
            "loaded existing vector index"
        );
        check_compatible(&index, embedder);
        return Ok(Some(Arc::new(index)));
    }

    tracing::info!("no saved vector index found, creating a new one");
    let chunks = ingest::ingest_directory(source_dir, partitioner).await?;
    if chunks.is_empty() {
        tracing::error!("{}", TutorError::EmptyCorpus);
        return Ok(None);
    }

    tracing::info!(path = %index_path.display(), chunks = chunks.len(), "creating vector index");
    let index = VectorIndex::build(chunks, embedder, batch_size).await?;
    index.save(index_path).await?;
    tracing::info!("new vector index created and saved");
    Ok(Some(Arc::new(index)))
}

fn check_compatible(index: &VectorIndex, embedder: &dyn EmbeddingProvider) {
    if index.meta.dims != embedder.dims() {
        tracing::warn!(
            index_dims = index.meta.dims,
            embedder_dims = embedder.dims(),
            "index was built with a different embedding size; queries will not match"
        );
    } else if index.meta.model != embedder.model_name() {
        tracing::warn!(
            index_model = %index.meta.model,
            embedder_model = embedder.model_name(),
            "index was built with a different embedding model"
        );
    }
}

fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn fingerprint(entries: &[EmbeddedChunk]) -> String {
    let mut hasher = Sha256::new();
    for e in entries {
        hasher.update(text_hash(&e.chunk.text).as_bytes());
        // Length prefixes keep adjacent fields from running together.
        for field in [&e.chunk.book_title, &e.chunk.source_file] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        match e.chunk.page_number {
            Some(page) => {
                hasher.update([1u8]);
                hasher.update(page.to_le_bytes());
            }
            None => hasher.update([0u8]),
        }
    }
    format!("{:x}", hasher.finalize())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}
