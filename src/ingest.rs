//! Document ingestion pipeline.
//!
//! Orchestrates the write path: store original bytes, extract text, chunk,
//! embed, and upsert into the vector index. Chunk ids are deterministic
//! (`"{filename}-chunk-{ordinal}"`), so re-ingesting a document overwrites
//! its records in place rather than accumulating duplicates.
//!
//! Concurrent ingestion of *different* documents is safe; ingestion of the
//! *same* filename is serialized through a per-filename lock so two writers
//! cannot interleave batches for one document.
//!
//! # Failure model
//!
//! Embedding happens before any index write, so an embedding failure leaves
//! the index untouched. Upsert batches commit sequentially; if batch `k`
//! fails, batches `1..k-1` stay committed and the error reports exactly how
//! far ingestion got. Re-running the same ingest converges to a complete,
//! correct state. The stale-tail sweep (removing ordinals past the end of a
//! document that shrank) runs only after every batch succeeded.

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chunk::{chunk_id, chunk_text};
use crate::config::{Config, MAX_UPSERT_BATCH};
use crate::embedding::EmbeddingClient;
use crate::error::{Error, Result};
use crate::extract::{extract_text, DocumentFormat};
use crate::index::{DeleteFilter, IndexStats, RecordMetadata, VectorIndex, VectorRecord};
use crate::store::{ObjectStore, StoredObject};

/// Outcome of a successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub filename: String,
    pub chunk_count: usize,
    pub batches: usize,
    /// SHA-256 of the original document bytes.
    pub content_hash: String,
}

/// The ingestion/deletion orchestrator.
///
/// Owns no storage itself; everything goes through the [`ObjectStore`],
/// [`VectorIndex`], and [`EmbeddingClient`] collaborators.
pub struct Pipeline {
    store: Arc<dyn ObjectStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingClient>,
    chunk_size: usize,
    embed_batch_size: usize,
    upsert_batch_size: usize,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingClient>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            chunk_size: config.chunking.chunk_size,
            embed_batch_size: config.embedding.batch_size,
            upsert_batch_size: config.indexing.upsert_batch_size.min(MAX_UPSERT_BATCH),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Idempotent setup of both backends.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.store.ensure_ready().await?;
        self.index.ensure_ready().await
    }

    /// Ingest a document: store, extract, chunk, embed, upsert.
    ///
    /// Re-ingesting an existing filename replaces its records. A document
    /// that yields no text is valid: its stored bytes are kept and any
    /// previously indexed chunks are removed.
    pub async fn ingest(&self, filename: &str, bytes: &[u8]) -> Result<IngestReport> {
        validate_filename(filename)?;
        let format = DocumentFormat::from_filename(filename)?;

        let lock = self.lock_for(filename).await;
        let result = {
            let _guard = lock.lock().await;
            self.ingest_locked(filename, bytes, format).await
        };
        drop(lock);
        self.prune_lock(filename).await;
        result
    }

    async fn ingest_locked(
        &self,
        filename: &str,
        bytes: &[u8],
        format: DocumentFormat,
    ) -> Result<IngestReport> {
        info!(filename, size = bytes.len(), "ingesting document");

        self.store.put(filename, bytes).await?;

        let text = extract_text(bytes, format)?;
        let chunks = chunk_text(&text, self.chunk_size)?;

        if chunks.is_empty() {
            warn!(filename, "document yielded no text; clearing indexed chunks");
            self.index
                .delete_by_filter(&DeleteFilter::source(filename))
                .await?;
            return Ok(IngestReport {
                filename: filename.to_string(),
                chunk_count: 0,
                batches: 0,
                content_hash: content_hash(bytes),
            });
        }

        // Embed everything before touching the index, so embedding failures
        // leave the index unchanged.
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.embed_batch_size) {
            vectors.extend(self.embedder.embed(batch).await?);
        }

        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(ordinal, (text, vector))| VectorRecord {
                id: chunk_id(filename, ordinal),
                vector,
                metadata: RecordMetadata {
                    text: text.clone(),
                    source: filename.to_string(),
                    ordinal,
                },
            })
            .collect();

        let batches: Vec<&[VectorRecord]> = records.chunks(self.upsert_batch_size).collect();
        let total_batches = batches.len();
        let mut committed_chunks = 0usize;

        for (batch_index, batch) in batches.iter().enumerate() {
            if let Err(e) = self.index.upsert(batch).await {
                return Err(Error::PartialIngestion {
                    filename: filename.to_string(),
                    committed_batches: batch_index,
                    committed_chunks,
                    failed_batch: batch_index + 1,
                    total_batches,
                    reason: e.to_string(),
                });
            }
            committed_chunks += batch.len();
            debug!(
                filename,
                batch = batch_index + 1,
                total_batches,
                "upserted batch"
            );
        }

        // Document may have shrunk since last ingestion; drop ordinals past
        // the new end. Only safe after every batch committed.
        let swept = self
            .index
            .delete_by_filter(&DeleteFilter::stale_tail(filename, records.len()))
            .await?;
        if swept > 0 {
            info!(filename, swept, "removed stale chunks from prior version");
        }

        info!(
            filename,
            chunks = records.len(),
            batches = total_batches,
            "ingestion complete"
        );

        Ok(IngestReport {
            filename: filename.to_string(),
            chunk_count: records.len(),
            batches: total_batches,
            content_hash: content_hash(bytes),
        })
    }

    /// Remove a document's stored bytes and indexed chunks.
    ///
    /// Converges: deleting an unknown filename succeeds with zero removals.
    pub async fn delete_document(&self, filename: &str) -> Result<u64> {
        let lock = self.lock_for(filename).await;
        let result = {
            let _guard = lock.lock().await;
            self.delete_locked(filename).await
        };
        drop(lock);
        self.prune_lock(filename).await;
        result
    }

    async fn delete_locked(&self, filename: &str) -> Result<u64> {
        self.store.delete(filename).await?;
        let removed = self
            .index
            .delete_by_filter(&DeleteFilter::source(filename))
            .await?;
        info!(filename, removed, "deleted document");
        Ok(removed)
    }

    /// Remove every document and every indexed chunk.
    pub async fn reset_all(&self) -> Result<u64> {
        let removed = self.index.delete_all().await?;
        self.store.clear().await?;
        info!(removed, "reset complete");
        Ok(removed)
    }

    /// Enumerate stored documents.
    pub async fn documents(&self) -> Result<Vec<StoredObject>> {
        self.store.list().await
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        self.index.stats().await
    }

    async fn lock_for(&self, filename: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(filename.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop a filename's lock entry once no caller holds it, so the map does
    /// not grow with every distinct filename ever seen.
    async fn prune_lock(&self, filename: &str) {
        let mut locks = self.locks.lock().await;
        if let Some(entry) = locks.get(filename) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(filename);
            }
        }
    }

    #[cfg(test)]
    async fn lock_entries(&self) -> usize {
        self.locks.lock().await.len()
    }
}

fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty() {
        return Err(Error::UnsupportedFormat("empty filename".into()));
    }
    if filename.contains('/') || filename.contains('\\') {
        return Err(Error::UnsupportedFormat(format!(
            "filename must not contain path separators: {}",
            filename
        )));
    }
    Ok(())
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
