//! Similarity search with relevance gating.
//!
//! The read path: embed the query with the same model used at ingestion,
//! take the top-k nearest chunks, then drop everything at or below the
//! relevance threshold. Returning nothing is a meaningful outcome — it is
//! how the answer path knows the corpus has no support for a question.

use std::sync::Arc;

use tracing::debug;

use crate::embedding::{embed_query, EmbeddingClient};
use crate::error::Result;
use crate::index::VectorIndex;

/// A retrieved chunk, relevance-gated and ready for prompt assembly.
#[derive(Debug, Clone)]
pub struct ContextPassage {
    pub text: String,
    pub score: f32,
    pub source: String,
}

pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingClient>,
    top_k: usize,
    min_score: f32,
}

impl Retriever {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingClient>,
        top_k: usize,
        min_score: f32,
    ) -> Self {
        Self {
            index,
            embedder,
            top_k,
            min_score,
        }
    }

    /// Retrieve the most relevant passages for `query`.
    ///
    /// `top_k` and `min_score` override the configured defaults for this
    /// call only. The gate is strict: a passage scoring exactly at the
    /// threshold is excluded. Descending score order is preserved.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
        min_score: Option<f32>,
    ) -> Result<Vec<ContextPassage>> {
        let top_k = top_k.unwrap_or(self.top_k);
        let min_score = min_score.unwrap_or(self.min_score);

        let vector = embed_query(self.embedder.as_ref(), query).await?;
        let matches = self.index.query(&vector, top_k).await?;

        let passages: Vec<ContextPassage> = matches
            .into_iter()
            .filter(|m| m.score > min_score)
            .map(|m| ContextPassage {
                text: m.metadata.text,
                score: m.score,
                source: m.metadata.source,
            })
            .collect();

        debug!(
            top_k,
            min_score,
            kept = passages.len(),
            "retrieval complete"
        );
        Ok(passages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::index::{MemoryIndex, RecordMetadata, VectorRecord};
    use async_trait::async_trait;

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

    fn record(id: &str, vector: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            vector,
            metadata: RecordMetadata {
                text: format!("text of {}", id),
                source: "doc.txt".to_string(),
                ordinal: 0,
            },
        }
    }

    async fn seeded_index() -> Arc<MemoryIndex> {
        let index = Arc::new(MemoryIndex::new());
        // Scores against query [1, 0]: 1.0, ~0.8, 0.0
        index
            .upsert(&[
                record("doc.txt-chunk-0", vec![1.0, 0.0]),
                record("doc.txt-chunk-1", vec![0.8, 0.6]),
                record("doc.txt-chunk-2", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn gates_below_threshold() {
        let index = seeded_index().await;
        let retriever = Retriever::new(
            index,
            Arc::new(FixedQueryEmbedder {
                vector: vec![1.0, 0.0],
            }),
            5,
            0.7,
        );

        let passages = retriever.retrieve("anything", None, None).await.unwrap();
        assert_eq!(passages.len(), 2);
        assert!(passages[0].score >= passages[1].score);
        assert!(passages.iter().all(|p| p.score > 0.7));
    }

    #[tokio::test]
    async fn threshold_is_strict() {
        let index = Arc::new(MemoryIndex::new());
        index
            .upsert(&[record("doc.txt-chunk-0", vec![1.0, 0.0])])
            .await
            .unwrap();
        let retriever = Retriever::new(
            index,
            Arc::new(FixedQueryEmbedder {
                vector: vec![1.0, 0.0],
            }),
            5,
            0.7,
        );

        // Exact score 1.0 against min_score 1.0 is excluded
        let passages = retriever
            .retrieve("anything", None, Some(1.0))
            .await
            .unwrap();
        assert!(passages.is_empty());
    }

    #[tokio::test]
    async fn overrides_apply_per_call() {
        let index = seeded_index().await;
        let retriever = Retriever::new(
            index,
            Arc::new(FixedQueryEmbedder {
                vector: vec![1.0, 0.0],
            }),
            5,
            0.7,
        );

        let passages = retriever
            .retrieve("anything", Some(1), Some(0.0))
            .await
            .unwrap();
        assert_eq!(passages.len(), 1);
        assert!((passages[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn empty_index_yields_empty() {
        let retriever = Retriever::new(
            Arc::new(MemoryIndex::new()),
            Arc::new(FixedQueryEmbedder {
                vector: vec![1.0, 0.0],
            }),
            5,
            0.7,
        );
        let passages = retriever.retrieve("anything", None, None).await.unwrap();
        assert!(passages.is_empty());
    }
}
