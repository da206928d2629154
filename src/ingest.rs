//! Document ingestion: source directory → partitioner → provenance-tagged chunks.
//!
//! Ingestion is best-effort. A file that fails to partition, or a directory
//! entry the walk cannot read, is logged and skipped; the run continues with
//! the remaining files.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::TutorError;
use crate::models::Chunk;
use crate::partition::Partitioner;

/// Totals for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_found: usize,
    pub files_failed: usize,
    pub chunks: usize,
}

/// Ingest every PDF under `source_dir`.
///
/// A missing or empty directory is created (for first-run setup) and an
/// empty sequence is returned with a warning.
pub async fn ingest_directory(source_dir: &Path, partitioner: &dyn Partitioner) -> Result<Vec<Chunk>> {
    let (chunks, _) = ingest_with_report(source_dir, partitioner).await?;
    Ok(chunks)
}

pub async fn ingest_with_report(
    source_dir: &Path,
    partitioner: &dyn Partitioner,
) -> Result<(Vec<Chunk>, IngestReport)> {
    let (files, unreadable) = if source_dir.is_dir() {
        find_pdf_files(source_dir)?
    } else {
        (Vec::new(), 0)
    };

    if files.is_empty() {
        tracing::warn!(
            dir = %source_dir.display(),
            unreadable,
            "source directory is empty or not found; add PDF files to it to continue"
        );
        std::fs::create_dir_all(source_dir)?;
        let report = IngestReport {
            files_found: unreadable,
            files_failed: unreadable,
            chunks: 0,
        };
        return Ok((Vec::new(), report));
    }

    let root_title = book_title_for(
        &source_dir
            .canonicalize()
            .unwrap_or_else(|_| source_dir.to_path_buf()),
    );
    tracing::info!(
        book = %root_title,
        files = files.len(),
        partitioner = partitioner.name(),
        "processing source directory"
    );

    let mut report = IngestReport {
        files_found: files.len() + unreadable,
        files_failed: unreadable,
        chunks: 0,
    };
    let mut chunks = Vec::new();

    for path in &files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let book_title = match path.parent() {
            Some(parent) if parent != source_dir => book_title_for(parent),
            _ => root_title.clone(),
        };

        tracing::info!(file = %file_name, book = %book_title, "reading chapter");

        let elements = match partitioner.partition(path).await {
            Ok(elements) => elements,
            Err(e) => {
                let err = TutorError::IngestionFailed {
                    path: path.clone(),
                    reason: format!("{:#}", e),
                };
                tracing::error!("{}", err);
                report.files_failed += 1;
                continue;
            }
        };

        let before = chunks.len();
        chunks.extend(
            elements
                .into_iter()
                .filter(|el| !el.text.trim().is_empty())
                .map(|el| Chunk {
                    text: el.text,
                    book_title: book_title.clone(),
                    source_file: file_name.clone(),
                    page_number: el.page_number,
                    element_kind: el.kind,
                }),
        );
        tracing::debug!(file = %file_name, chunks = chunks.len() - before, "partitioned");
    }

    report.chunks = chunks.len();
    tracing::info!(
        files = report.files_found,
        failed = report.files_failed,
        chunks = report.chunks,
        "source processing complete"
    );

    Ok((chunks, report))
}

/// PDF files under `root`, sorted by relative path, plus the number of
/// PDF-named entries the walk could not read.
///
/// Walk errors (dangling symlinks, unreadable directories, link loops) are
/// logged and skipped.
fn find_pdf_files(root: &Path) -> Result<(Vec<PathBuf>, usize)> {
    let include = build_globset(&["**/*.pdf"])?;
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    let mut unreadable = 0;

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let names_pdf = e.path().is_some_and(|p| {
                    let relative = p.strip_prefix(root).unwrap_or(p);
                    include.is_match(relative.to_string_lossy().to_lowercase())
                });
                if names_pdf {
                    unreadable += 1;
                }
                tracing::warn!(error = %e, "skipping unreadable entry in source directory");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();
        if include.is_match(rel_str.to_lowercase()) {
            files.push((rel_str, path.to_path_buf()));
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok((files.into_iter().map(|(_, p)| p).collect(), unreadable))
}

fn book_title_for(dir: &Path) -> String {
    dir.components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .last()
        .unwrap_or_else(|| dir.display().to_string())
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
