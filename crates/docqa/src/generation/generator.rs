//! Answer generation over a pluggable backend

use std::sync::Arc;

use crate::providers::GenerationBackend;
use crate::types::Chunk;

use super::prompt::PromptBuilder;

/// Fills the prompt template and calls the generation backend
///
/// Backend failures never escape: they are logged and replaced by
/// [`AnswerGenerator::UNAVAILABLE`].
#[derive(Clone)]
pub struct AnswerGenerator {
    backend: Arc<dyn GenerationBackend>,
}

impl AnswerGenerator {
    /// Placeholder returned when the backend fails
    pub const UNAVAILABLE: &'static str =
        "Sorry, the answer service is temporarily unavailable. Please try again later.";

    /// Create a generator over `backend`
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Backend in use
    pub fn backend(&self) -> &dyn GenerationBackend {
        self.backend.as_ref()
    }

    /// Answer `question` from `context`
    pub async fn generate(&self, question: &str, context: &[Chunk]) -> String {
        let context = PromptBuilder::build_context(context);
        let prompt = PromptBuilder::build_prompt(question, &context);

        match self.backend.generate(&prompt).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::error!(
                    "Generation failed ({} / {}): {}",
                    self.backend.name(),
                    self.backend.model(),
                    e
                );
                Self::UNAVAILABLE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingBackend {
        fail: bool,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerationBackend for RecordingBackend {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().push(prompt.to_string());
            if self.fail {
                Err(Error::Timeout("generation".to_string()))
            } else {
                Ok("  Twenty days.\n".to_string())
            }
        }

        fn name(&self) -> &str {
            "recording"
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    fn chunk(text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            start_offset: 0,
            end_offset: text.len(),
            file_name: "policy.txt".to_string(),
            doc_id: 7,
        }
    }

    #[tokio::test]
    async fn test_prompt_carries_question_and_context() {
        let backend = Arc::new(RecordingBackend::default());
        let generator = AnswerGenerator::new(backend.clone());

        let answer = generator
            .generate("How many leave days?", &[chunk("Staff get 20 days."), chunk("Carry-over is 5.")])
            .await;

        assert_eq!(answer, "Twenty days.");
        let prompts = backend.prompts.lock();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Staff get 20 days.\n\nCarry-over is 5."));
        assert!(prompts[0].contains("How many leave days?"));
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_placeholder() {
        let generator = AnswerGenerator::new(Arc::new(RecordingBackend {
            fail: true,
            ..Default::default()
        }));

        let answer = generator.generate("q", &[chunk("c")]).await;
        assert_eq!(answer, AnswerGenerator::UNAVAILABLE);
    }
}
