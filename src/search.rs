//! `search` command: retrieval without the chat call.

use anyhow::Result;

use crate::tutor::Tutor;

/// Print the top `limit` chunks for `query` with their provenance.
pub async fn run_search(tutor: &Tutor, query: &str, limit: usize) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let hits = tutor.retrieve(query, limit).await?;
    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} / {} (page {})",
            i + 1,
            hit.score,
            hit.chunk.book_title,
            hit.chunk.source_file,
            hit.chunk.page_label()
        );
        println!("    {}", snippet(&hit.chunk.text, 200));
        println!();
    }

    Ok(())
}

/// First `max_chars` characters of `text` on one line.
fn snippet(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
