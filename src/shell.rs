//! Interactive terminal chat.

use anyhow::Result;
use std::io::{BufRead, Write};

use crate::conversation::ConversationState;
use crate::tutor::{ReplyStatus, Tutor};

const BANNER: &str = "\n--- VidyaSetu Tutor ---\n\
     Ask a question about your documents. Type 'exit' or 'quit' to end the chat.";

fn is_exit(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

/// Read questions from `input` until `exit`, `quit`, or EOF, writing answers
/// to `output`. Returns the number of questions asked.
pub async fn run_repl<R: BufRead, W: Write>(
    tutor: &Tutor,
    conversation: &mut dyn ConversationState,
    mut input: R,
    mut output: W,
    show_sources: bool,
) -> Result<usize> {
    writeln!(output, "{}", BANNER)?;
    let mut asked = 0;

    loop {
        write!(output, "\nYou: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break;
        }
        if is_exit(&line) {
            writeln!(output, "Goodbye!")?;
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }

        let reply = tutor.ask(conversation, question).await;
        asked += 1;

        if show_sources && reply.status == ReplyStatus::Answered {
            writeln!(output, "\nRetrieved sources:")?;
            for (i, hit) in reply.sources.iter().enumerate() {
                writeln!(
                    output,
                    "  {}. {} / {} (page {}) score={:.3}",
                    i + 1,
                    hit.chunk.book_title,
                    hit.chunk.source_file,
                    hit.chunk.page_label(),
                    hit.score
                )?;
            }
        }
        writeln!(output, "\nVidyaSetu AI: {}", reply.text)?;
    }

    Ok(asked)
}
