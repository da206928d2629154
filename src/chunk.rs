//! Paragraph-boundary text splitter.
//!
//! Used by the local partitioner, which gets one flat string per page and
//! needs to cut it into retrieval-sized pieces. Pieces are joined paragraphs
//! (`\n\n` separated) up to `max_tokens`; a paragraph longer than the limit
//! is hard-split at the last newline or space before the boundary.

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split `text` into pieces of at most `max_tokens` (approximate).
///
/// Whitespace-only input yields no pieces.
pub fn split_paragraphs(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;
    let mut pieces = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current.is_empty() {
            trimmed.len()
        } else {
            current.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }

        if trimmed.len() > max_chars {
            hard_split(trimmed, max_chars, &mut pieces);
        } else {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(trimmed);
        }
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

fn hard_split(mut remaining: &str, max_chars: usize, out: &mut Vec<String>) {
    while !remaining.is_empty() {
        let mut split_at = remaining.len().min(max_chars);
        while !remaining.is_char_boundary(split_at) {
            split_at -= 1;
        }
        let actual = if split_at < remaining.len() {
            remaining[..split_at]
                .rfind('\n')
                .or_else(|| remaining[..split_at].rfind(' '))
                .map(|pos| pos + 1)
                .filter(|pos| *pos > 0)
                .unwrap_or(split_at)
        } else {
            split_at
        };
        // Guard against a zero-width step on a leading multibyte char.
        let actual = if actual == 0 {
            remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len())
        } else {
            actual
        };
        let piece = remaining[..actual].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[actual..];
    }
}
