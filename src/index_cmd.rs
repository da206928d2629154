//! `index build` and `index info` commands.

use anyhow::Result;

use crate::config::{self, Config};
use crate::embedding;
use crate::index::VectorIndex;
use crate::ingest;
use crate::partition;

/// Ingest the source directory and write a fresh index.
///
/// An existing index is left alone unless `force` is set.
pub async fn run_build(config: &Config, force: bool) -> Result<()> {
    let index_path = &config.paths.index_path;
    if index_path.exists() && !force {
        println!(
            "Index already exists at {}. Use --force to rebuild it.",
            index_path.display()
        );
        return Ok(());
    }

    let api_key = config::require_api_key()?;
    let embedder = embedding::create_provider(&config.embedding, &api_key)?;
    let partitioner = partition::create_partitioner(&config.partitioner)?;

    let (chunks, report) =
        ingest::ingest_with_report(&config.paths.source_dir, partitioner.as_ref()).await?;

    println!("Ingestion complete:");
    println!("  PDFs found:   {}", report.files_found);
    println!("  PDFs failed:  {}", report.files_failed);
    println!("  Chunks:       {}", report.chunks);

    if chunks.is_empty() {
        println!();
        println!(
            "No documents were extracted. Add PDF files to {} and try again.",
            config.paths.source_dir.display()
        );
        return Ok(());
    }

    let index = VectorIndex::build(chunks, embedder.as_ref(), config.embedding.batch_size).await?;
    index.save(index_path).await?;

    println!();
    println!(
        "Index written to {} ({} chunks, {} dims).",
        index_path.display(),
        index.len(),
        index.meta().dims
    );
    Ok(())
}

/// Print metadata and per-book chunk counts of the persisted index.
pub async fn run_info(config: &Config) -> Result<()> {
    let index_path = &config.paths.index_path;
    let index = match VectorIndex::load(index_path).await? {
        Some(index) => index,
        None => {
            println!(
                "No index at {}. Run `vidyasetu index build` first.",
                index_path.display()
            );
            return Ok(());
        }
    };

    let size = std::fs::metadata(index_path).map(|m| m.len()).unwrap_or(0);
    let meta = index.meta();

    println!("VidyaSetu Index");
    println!("===============");
    println!();
    println!("  Path:        {}", index_path.display());
    println!("  Size:        {}", format_bytes(size));
    println!("  Model:       {}", meta.model);
    println!("  Dimensions:  {}", meta.dims);
    println!("  Built:       {}", meta.built_at.format("%Y-%m-%d %H:%M UTC"));
    println!("  Chunks:      {}", index.len());

    let books = index.books();
    if !books.is_empty() {
        println!();
        println!("  By book:");
        println!("  {:<48} {:>8}", "BOOK", "CHUNKS");
        println!("  {}", "-".repeat(57));
        for (book, count) in &books {
            println!("  {:<48} {:>8}", book, count);
        }
    }
    println!();

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
