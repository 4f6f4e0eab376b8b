//! Prompt template for grounded answers

use crate::types::Chunk;

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Join chunk texts with blank lines
    pub fn build_context(chunks: &[Chunk]) -> String {
        chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Build the full RAG prompt
    pub fn build_prompt(question: &str, context: &str) -> String {
        format!(
            r#"You are a careful assistant that answers questions using only the documents provided below.

INSTRUCTIONS:
1. Use ONLY the information in the context. Do not rely on outside knowledge.
2. If the context does not contain enough information to answer, say so explicitly instead of guessing.
3. Answer in the same language as the question.
4. When the question requires a derivation or calculation, walk through it step by step and explain each step, rather than giving only the final result.

CONTEXT:
{context}

QUESTION: {question}

ANSWER:"#,
            context = context,
            question = question
        )
    }
}
