//! Error taxonomy for the ingestion and retrieval pipeline.
//!
//! Every fallible pipeline stage surfaces one of these variants; nothing is
//! silently swallowed. Deletion and reset treat "target already absent" as
//! success and never reach this enum for that case.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The uploaded filename is not in the supported-format allow-list.
    /// User-facing, not retryable.
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// The byte stream is not a valid instance of its declared format.
    /// Individual undecodable pages are skipped, not reported here.
    #[error("text extraction failed: {0}")]
    Extraction(String),

    /// Programmer/deployment error, fatal at startup.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The embedding collaborator call failed after its own retries.
    #[error("embedding request failed: {0}")]
    Embedding(String),

    /// The generation collaborator call failed after its own retries.
    #[error("generation request failed: {0}")]
    Generation(String),

    /// A vector index operation failed.
    #[error("vector index error: {0}")]
    VectorIndex(String),

    /// An object store operation failed.
    #[error("object store error: {0}")]
    ObjectStore(String),

    /// An upsert batch failed after earlier batches were already committed.
    /// There is no pipeline-wide rollback; the caller decides whether to
    /// re-ingest or accept partial indexing.
    #[error(
        "partial ingestion of '{filename}': batch {failed_batch} of {total_batches} failed \
         ({committed_chunks} chunks in {committed_batches} batches committed): {reason}"
    )]
    PartialIngestion {
        filename: String,
        committed_batches: usize,
        committed_chunks: usize,
        failed_batch: usize,
        total_batches: usize,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
