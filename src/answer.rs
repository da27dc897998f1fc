//! Question answering over retrieved context.
//!
//! Two prompt shapes, chosen by whether retrieval found relevant passages:
//! grounded (context block first, then the question) or fallback (the model
//! is told explicitly that no supporting material was found, so it can say
//! so rather than hallucinate a source). The generated text is returned
//! verbatim.

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::generate::GenerationClient;
use crate::retrieve::{ContextPassage, Retriever};

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions about documents. \
     Answer based on the provided context. If the context does not contain \
     the answer, say so plainly instead of guessing.";

/// An answer plus the passages it was grounded on (empty for fallback).
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub passages: Vec<ContextPassage>,
}

pub struct AnswerEngine {
    retriever: Retriever,
    generator: Arc<dyn GenerationClient>,
}

impl AnswerEngine {
    pub fn new(retriever: Retriever, generator: Arc<dyn GenerationClient>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    /// Retrieve context for `question` and generate an answer.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let passages = self.retriever.retrieve(question, None, None).await?;

        let user_prompt = if passages.is_empty() {
            info!("no relevant context found; using fallback prompt");
            fallback_prompt(question)
        } else {
            info!(passages = passages.len(), "answering with retrieved context");
            grounded_prompt(&passages, question)
        };

        let text = self.generator.complete(SYSTEM_PROMPT, &user_prompt).await?;
        Ok(Answer { text, passages })
    }
}

fn grounded_prompt(passages: &[ContextPassage], question: &str) -> String {
    let context = passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Context:\n{}\n\nQuestion: {}\n\nAnswer the question using the context above.",
        context, question
    )
}

fn fallback_prompt(question: &str) -> String {
    format!(
        "No supporting material was found in the document collection for \
         this question.\n\nQuestion: {}\n\nIf you cannot answer without \
         supporting material, say so.",
        question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingClient;
    use crate::index::{MemoryIndex, RecordMetadata, VectorIndex, VectorRecord};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedQueryEmbedder {
        vector: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingClient for FixedQueryEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }

        fn dims(&self) -> usize {
            self.vector.len()
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| self.vector.clone()).collect())
        }
    }

    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl GenerationClient for RecordingGenerator {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), user_prompt.to_string()));
            Ok("generated answer".to_string())
        }
    }

    fn retriever_with(index: Arc<MemoryIndex>) -> Retriever {
        Retriever::new(
            index,
            Arc::new(FixedQueryEmbedder {
                vector: vec![1.0, 0.0],
            }),
            5,
            0.7,
        )
    }

    #[tokio::test]
    async fn grounded_prompt_has_context_before_question() {
        let index = Arc::new(MemoryIndex::new());
        index
            .upsert(&[VectorRecord {
                id: "doc.txt-chunk-0".to_string(),
                vector: vec![1.0, 0.0],
                metadata: RecordMetadata {
                    text: "warranty lasts two years".to_string(),
                    source: "doc.txt".to_string(),
                    ordinal: 0,
                },
            }])
            .await
            .unwrap();

        let generator = Arc::new(RecordingGenerator::default());
        let engine = AnswerEngine::new(retriever_with(index), generator.clone());

        let answer = engine.answer("how long is the warranty?").await.unwrap();
        assert_eq!(answer.text, "generated answer");
        assert_eq!(answer.passages.len(), 1);

        let prompts = generator.prompts.lock().unwrap();
        let (_, user_prompt) = &prompts[0];
        let context_pos = user_prompt.find("warranty lasts two years").unwrap();
        let question_pos = user_prompt.find("how long is the warranty?").unwrap();
        assert!(context_pos < question_pos);
    }

    #[tokio::test]
    async fn empty_retrieval_uses_fallback_prompt() {
        let generator = Arc::new(RecordingGenerator::default());
        let engine = AnswerEngine::new(
            retriever_with(Arc::new(MemoryIndex::new())),
            generator.clone(),
        );

        let answer = engine.answer("what color is the sky?").await.unwrap();
        assert!(answer.passages.is_empty());

        let prompts = generator.prompts.lock().unwrap();
        let (_, user_prompt) = &prompts[0];
        assert!(user_prompt.contains("No supporting material"));
        assert!(user_prompt.contains("what color is the sky?"));
    }

    #[tokio::test]
    async fn answer_text_is_verbatim() {
        let generator = Arc::new(RecordingGenerator::default());
        let engine = AnswerEngine::new(
            retriever_with(Arc::new(MemoryIndex::new())),
            generator,
        );
        let answer = engine.answer("anything").await.unwrap();
        assert_eq!(answer.text, "generated answer");
    }
}
