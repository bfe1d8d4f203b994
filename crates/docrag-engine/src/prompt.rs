//! Prompt construction and the fixed answer strings.

use crate::retrieval::RetrievedChunk;

/// What the model is told to say when the context lacks the answer.
pub const REFUSAL: &str = "I cannot find this information in the provided context.";

/// Returned when retrieval finds nothing for the question.
pub const NO_RESULTS_ANSWER: &str =
    "I couldn't find any relevant information in the knowledge base to answer your question.";

pub fn degraded_answer(error: &dyn std::fmt::Display) -> String {
    format!("I apologize, but I encountered an error while processing your question: {error}")
}

/// Numbered context blocks in retrieval order.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| format!("Context {}:\n{}\n", i + 1, c.chunk.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    format!(
        "You are a precise and reliable assistant. Answer the user's question strictly based on the provided \
         context and also explain your answer. Do not include any information that is not in the context. \
         If the answer cannot be found, say: '{REFUSAL}'\n\n\
         Avoid speculation.\n\n\
         Context:\n{context}\n\n\
         Question:\n{question}\n\n\
         Answer:",
        context = format_context(chunks),
    )
}

/// Citation for a chunk: `"{title} - Page {n}"`, or just the title.
pub fn source_label(title: &str, page: Option<u32>) -> String {
    match page {
        Some(page) => format!("{title} - Page {page}"),
        None => title.to_string(),
    }
}

/// Drop repeated labels, keeping the first occurrence of each.
pub fn dedup_sources(labels: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    labels.into_iter().filter(|l| seen.insert(l.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_core::types::{Chunk, PageChunk};

    fn retrieved(content: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk::new("doc", 0, PageChunk { content: content.to_string(), page: None }),
            score: 0.5,
        }
    }

    #[test]
    fn contexts_are_numbered_in_order() {
        let ctx = format_context(&[retrieved("alpha"), retrieved("beta")]);
        assert_eq!(ctx, "Context 1:\nalpha\n\nContext 2:\nbeta\n");
    }

    #[test]
    fn prompt_carries_rules_context_and_question() {
        let prompt = build_prompt("What is beta?", &[retrieved("beta is second")]);
        assert!(prompt.contains("strictly based on the provided context"));
        assert!(prompt.contains(REFUSAL));
        assert!(prompt.contains("Avoid speculation."));
        assert!(prompt.contains("Context 1:\nbeta is second"));
        assert!(prompt.ends_with("Question:\nWhat is beta?\n\nAnswer:"));
    }

    #[test]
    fn labels_and_dedup() {
        assert_eq!(source_label("Manual", Some(3)), "Manual - Page 3");
        assert_eq!(source_label("Notes", None), "Notes");
        let deduped = dedup_sources(vec!["B".to_string(), "A".to_string(), "B".to_string()]);
        assert_eq!(deduped, vec!["B", "A"]);
    }

    #[test]
    fn degraded_answer_names_the_error() {
        assert_eq!(
            degraded_answer(&"connection refused"),
            "I apologize, but I encountered an error while processing your question: connection refused"
        );
    }
}
