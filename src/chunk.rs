//! Fixed-width text chunker.
//!
//! Splits document text into segments of at most `size` characters, left to
//! right, with no overlap and no boundary look-ahead. The policy is
//! deliberately simple: embedding cost and retrieval granularity depend only
//! on chunk count and length uniformity, so a pure length-based cut is
//! deterministic and trivially idempotent across re-ingestion.
//!
//! Chunk identity is derived from `(filename, ordinal)` — the invariant that
//! makes re-indexing an in-place overwrite and targeted deletion possible.

use crate::error::{Error, Result};

/// Split text into chunks of at most `size` characters.
///
/// Deterministic and total: the same input always yields the same chunks in
/// the same order, and concatenating the chunks reconstructs the input
/// exactly. The last chunk may be shorter than `size`. Empty text yields an
/// empty vector.
///
/// Counts Unicode scalar values, not bytes, so multi-byte text never splits
/// inside a character.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] if `size` is zero.
pub fn chunk_text(text: &str, size: usize) -> Result<Vec<String>> {
    if size == 0 {
        return Err(Error::InvalidConfiguration(
            "chunk size must be > 0".into(),
        ));
    }

    if text.is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    Ok(chars
        .chunks(size)
        .map(|piece| piece.iter().collect())
        .collect())
}

/// Deterministic chunk id: `"{filename}-chunk-{ordinal}"`, zero-based.
///
/// Stable across re-ingestion, so upserting under the same id naturally
/// supersedes the prior version's record.
pub fn chunk_id(filename: &str, ordinal: usize) -> String {
    format!("{}-chunk-{}", filename, ordinal)
}
