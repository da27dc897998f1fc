//! Vector index abstraction and in-memory backend.
//!
//! The [`VectorIndex`] trait defines the storage and similarity-search
//! operations the pipeline needs, enabling pluggable backends (SQLite for
//! the CLI deployment, in-memory for tests).
//!
//! Records are keyed by deterministic chunk id, so upsert semantics make
//! re-ingestion an in-place overwrite. Metadata carries the chunk text,
//! source filename, and ordinal — enough for filter deletes and for
//! assembling retrieval context without a second lookup.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};

/// The persisted unit of the vector index.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Deterministic chunk id (`"{filename}-chunk-{ordinal}"`).
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// Metadata stored alongside each vector.
#[derive(Debug, Clone)]
pub struct RecordMetadata {
    pub text: String,
    /// Source document filename.
    pub source: String,
    /// Chunk ordinal within the source document, zero-based.
    pub ordinal: usize,
}

/// A similarity-search hit, in descending score order.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub id: String,
    /// Cosine similarity; higher is more relevant.
    pub score: f32,
    pub metadata: RecordMetadata,
}

/// Predicate for metadata-filter deletes.
///
/// Matches records whose `source` equals the given filename, optionally
/// restricted to ordinals `>= min_ordinal` (the stale-tail sweep after a
/// document shrinks on re-ingestion).
#[derive(Debug, Clone)]
pub struct DeleteFilter {
    pub source: String,
    pub min_ordinal: Option<usize>,
}

impl DeleteFilter {
    pub fn source(filename: &str) -> Self {
        Self {
            source: filename.to_string(),
            min_ordinal: None,
        }
    }

    pub fn stale_tail(filename: &str, from_ordinal: usize) -> Self {
        Self {
            source: filename.to_string(),
            min_ordinal: Some(from_ordinal),
        }
    }

    fn matches(&self, metadata: &RecordMetadata) -> bool {
        metadata.source == self.source
            && self.min_ordinal.map_or(true, |min| metadata.ordinal >= min)
    }
}

/// Index-wide counters.
#[derive(Debug, Clone, Copy)]
pub struct IndexStats {
    pub record_count: u64,
}

/// Storage and similarity search over embeddings plus metadata.
///
/// Dimensionality is fixed per deployment: every stored vector and every
/// query vector must have the embedding client's output dimensionality.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotent one-time setup (create the backing table/collection).
    async fn ensure_ready(&self) -> Result<()>;

    /// Insert-or-overwrite records by id.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Top-`k` cosine similarity search, descending score, deterministic
    /// tie-break on id. A query vector whose length differs from the stored
    /// records is an error, not an empty result.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>>;

    /// Delete records by id. Missing ids are success.
    async fn delete(&self, ids: &[String]) -> Result<u64>;

    /// Delete records matching a metadata predicate. Returns removed count;
    /// zero matches is success.
    async fn delete_by_filter(&self, filter: &DeleteFilter) -> Result<u64>;

    /// Delete every record. An already-empty index is success.
    async fn delete_all(&self) -> Result<u64>;

    async fn stats(&self) -> Result<IndexStats>;
}

// ============ In-Memory Index ============

/// Brute-force in-memory index for tests: cosine over every stored vector.
#[derive(Default)]
pub struct MemoryIndex {
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err<T>(e: std::sync::PoisonError<T>) -> Error {
    Error::VectorIndex(e.to_string())
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut stored = self.records.write().map_err(lock_err)?;
        for record in records {
            if let Some(existing) = stored.values().next() {
                if existing.vector.len() != record.vector.len() {
                    return Err(Error::VectorIndex(format!(
                        "dimensionality mismatch: index holds {}-dim vectors, got {}",
                        existing.vector.len(),
                        record.vector.len()
                    )));
                }
            }
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        let stored = self.records.read().map_err(lock_err)?;
        if let Some(existing) = stored.values().next() {
            if existing.vector.len() != vector.len() {
                return Err(Error::VectorIndex(format!(
                    "dimensionality mismatch: index holds {}-dim vectors, query has {}",
                    existing.vector.len(),
                    vector.len()
                )));
            }
        }
        let mut matches: Vec<QueryMatch> = stored
            .values()
            .map(|record| QueryMatch {
                id: record.id.clone(),
                score: cosine_similarity(vector, &record.vector),
                metadata: record.metadata.clone(),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete(&self, ids: &[String]) -> Result<u64> {
        let mut stored = self.records.write().map_err(lock_err)?;
        let mut removed = 0u64;
        for id in ids {
            if stored.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn delete_by_filter(&self, filter: &DeleteFilter) -> Result<u64> {
        let mut stored = self.records.write().map_err(lock_err)?;
        let before = stored.len();
        stored.retain(|_, record| !filter.matches(&record.metadata));
        Ok((before - stored.len()) as u64)
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut stored = self.records.write().map_err(lock_err)?;
        let removed = stored.len() as u64;
        stored.clear();
        Ok(removed)
    }

    async fn stats(&self) -> Result<IndexStats> {
        let stored = self.records.read().map_err(lock_err)?;
        Ok(IndexStats {
            record_count: stored.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, source: &str, ordinal: usize, vector: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            vector,
            metadata: RecordMetadata {
                text: format!("text of {}", id),
                source: source.to_string(),
                ordinal,
            },
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let index = MemoryIndex::new();
        index
            .upsert(&[record("a-chunk-0", "a", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(&[record("a-chunk-0", "a", 0, vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(index.stats().await.unwrap().record_count, 1);
        let matches = index.query(&[0.0, 1.0], 1).await.unwrap();
        assert!((matches[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn query_orders_descending() {
        let index = MemoryIndex::new();
        index
            .upsert(&[
                record("a-chunk-0", "a", 0, vec![1.0, 0.0]),
                record("a-chunk-1", "a", 1, vec![0.8, 0.6]),
                record("a-chunk-2", "a", 2, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(matches.len(), 3);
        assert!(matches[0].score >= matches[1].score);
        assert!(matches[1].score >= matches[2].score);
        assert_eq!(matches[0].id, "a-chunk-0");
    }

    #[tokio::test]
    async fn dimension_mismatch_rejected() {
        let index = MemoryIndex::new();
        index
            .upsert(&[record("a-chunk-0", "a", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        let err = index
            .upsert(&[record("b-chunk-0", "b", 0, vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VectorIndex(_)));
    }

    #[tokio::test]
    async fn query_dimension_mismatch_rejected() {
        let index = MemoryIndex::new();
        index
            .upsert(&[record("doc.txt-chunk-0", "doc.txt", 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        // A wrong-width query is a typed error, never zero-score matches
        let err = index.query(&[1.0, 0.0, 0.0], 5).await.unwrap_err();
        assert!(matches!(err, Error::VectorIndex(_)));

        // Matching width still works
        assert_eq!(index.query(&[1.0, 0.0], 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn filter_delete_by_source_and_tail() {
        let index = MemoryIndex::new();
        index
            .upsert(&[
                record("a-chunk-0", "a", 0, vec![1.0, 0.0]),
                record("a-chunk-1", "a", 1, vec![1.0, 0.0]),
                record("a-chunk-2", "a", 2, vec![1.0, 0.0]),
                record("b-chunk-0", "b", 0, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        // Stale-tail sweep: keep ordinals < 2 for "a"
        let removed = index
            .delete_by_filter(&DeleteFilter::stale_tail("a", 2))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(index.stats().await.unwrap().record_count, 3);

        // Full source delete
        let removed = index
            .delete_by_filter(&DeleteFilter::source("a"))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        // Absent source converges to zero, not error
        let removed = index
            .delete_by_filter(&DeleteFilter::source("a"))
            .await
            .unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn delete_all_twice_is_success() {
        let index = MemoryIndex::new();
        index
            .upsert(&[record("a-chunk-0", "a", 0, vec![1.0])])
            .await
            .unwrap();
        assert_eq!(index.delete_all().await.unwrap(), 1);
        assert_eq!(index.delete_all().await.unwrap(), 0);
    }
}
