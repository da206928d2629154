//! Prompt text and formatting.

use crate::models::{Role, ScoredChunk, Turn};

pub const RAG_SYSTEM_PROMPT: &str = r#"Act as an AI tutor. When a student asks a question, use the provided context to guide your response.

- First, analyze the student's question in relation to the provided context. Identify key points in the context that are relevant to the question.
- Next, reason step-by-step, connecting information from the context to construct a clear, logical explanation or solution.
- Only then, present a concise, student-friendly answer addressing the original question directly.
- If you cannot find enough information in the context to fully answer the question, state which part is missing and suggest where the student might look or ask for clarification.

**Output format:**
Respond in clear, instructional English. Provide the answer with all source references used at the end.

**(For more complex questions, expand the answer in paragraphs, bullet points or tables as needed.)**

**Key Reminders:**
- Only use information from the given context.
- The question can depend on the conversation so far; interpret it accordingly.
- Maintain the flow of the conversation.
- Avoid redundancy.
- If the question is unclear or needs clarification, ask politely.
- Specify which content is drawn from which page.

---

**Reminder:**
Your main objective is to use the provided context to answer student questions with a clear answer."#;

pub const REPHRASE_PROMPT_TEMPLATE: &str = r#"Given the following conversation and a follow-up question, rephrase the follow-up question to be a standalone question that can be understood without the conversation. Keep names, dates, and terms from the conversation that the question refers to. Return only the standalone question.

Chat History:
{chat_history}

Follow-up Question: {question}

Standalone Question:"#;

/// Render retrieved chunks as the cited context block.
pub fn format_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| {
            format!(
                "Source: (Book: {}, File: {}, Page: {})\nContent: {}",
                hit.chunk.book_title,
                hit.chunk.source_file,
                hit.chunk.page_label(),
                hit.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The final user turn: context block followed by the student's question.
pub fn build_user_turn(context: &str, question: &str) -> String {
    format!(
        "Based on the context below, answer my question.\n\n---CONTEXT---\n{}\n\n---QUESTION---\n{}",
        context, question
    )
}

/// History as `Human:`/`AI:` lines for the rephrase template.
pub fn format_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| {
            let speaker = match t.role {
                Role::User => "Human",
                Role::Assistant => "AI",
            };
            format!("{}: {}", speaker, t.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fill the rephrase template. Placeholders are only recognised in the
/// template itself, never inside the substituted history or question.
pub fn render_rephrase(template: &str, history: &[Turn], question: &str) -> String {
    let history = format_history(history);
    template
        .split("{chat_history}")
        .map(|segment| segment.replace("{question}", question))
        .collect::<Vec<_>>()
        .join(&history)
}
