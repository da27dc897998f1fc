//! SQLite-backed [`VectorIndex`] for the CLI deployment.
//!
//! Embeddings are stored as little-endian f32 BLOBs in a single `vectors`
//! table keyed by chunk id. Similarity search loads candidate vectors and
//! ranks them by cosine in process — fine for corpora in the tens of
//! thousands of chunks this tool targets.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{Error, Result};
use crate::index::{
    DeleteFilter, IndexStats, QueryMatch, RecordMetadata, VectorIndex, VectorRecord,
};

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn table_exists(&self) -> Result<bool> {
        sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='vectors'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn stored_dims(&self) -> Result<Option<i64>> {
        sqlx::query_scalar("SELECT dims FROM vectors LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }
}

fn db_err(e: sqlx::Error) -> Error {
    Error::VectorIndex(e.to_string())
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn ensure_ready(&self) -> Result<()> {
        // Explicit exists-check rather than create-and-catch
        if self.table_exists().await? {
            return Ok(());
        }

        sqlx::query(
            r#"
            CREATE TABLE vectors (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                ordinal INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dims INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query("CREATE INDEX idx_vectors_source ON vectors(source)")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        if let Some(dims) = self.stored_dims().await? {
            for record in records {
                if record.vector.len() as i64 != dims {
                    return Err(Error::VectorIndex(format!(
                        "dimensionality mismatch: index holds {}-dim vectors, got {}",
                        dims,
                        record.vector.len()
                    )));
                }
            }
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO vectors (id, source, ordinal, text, embedding, dims)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source = excluded.source,
                    ordinal = excluded.ordinal,
                    text = excluded.text,
                    embedding = excluded.embedding,
                    dims = excluded.dims
                "#,
            )
            .bind(&record.id)
            .bind(&record.metadata.source)
            .bind(record.metadata.ordinal as i64)
            .bind(&record.metadata.text)
            .bind(vec_to_blob(&record.vector))
            .bind(record.vector.len() as i64)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        if let Some(dims) = self.stored_dims().await? {
            if vector.len() as i64 != dims {
                return Err(Error::VectorIndex(format!(
                    "dimensionality mismatch: index holds {}-dim vectors, query has {}",
                    dims,
                    vector.len()
                )));
            }
        }

        let rows = sqlx::query("SELECT id, source, ordinal, text, embedding FROM vectors")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let mut matches: Vec<QueryMatch> = rows
            .iter()
            .map(|row| {
                let embedding = blob_to_vec(row.get::<Vec<u8>, _>("embedding").as_slice());
                QueryMatch {
                    id: row.get("id"),
                    score: cosine_similarity(vector, &embedding),
                    metadata: RecordMetadata {
                        text: row.get("text"),
                        source: row.get("source"),
                        ordinal: row.get::<i64, _>("ordinal") as usize,
                    },
                }
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
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut removed = 0u64;
        for id in ids {
            let result = sqlx::query("DELETE FROM vectors WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            removed += result.rows_affected();
        }
        tx.commit().await.map_err(db_err)?;
        Ok(removed)
    }

    async fn delete_by_filter(&self, filter: &DeleteFilter) -> Result<u64> {
        let result = match filter.min_ordinal {
            Some(min) => sqlx::query("DELETE FROM vectors WHERE source = ? AND ordinal >= ?")
                .bind(&filter.source)
                .bind(min as i64)
                .execute(&self.pool)
                .await
                .map_err(db_err)?,
            None => sqlx::query("DELETE FROM vectors WHERE source = ?")
                .bind(&filter.source)
                .execute(&self.pool)
                .await
                .map_err(db_err)?,
        };
        Ok(result.rows_affected())
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM vectors")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(IndexStats {
            record_count: count as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn test_index() -> (tempfile::TempDir, SqliteIndex) {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = db::connect(&tmp.path().join("index.sqlite")).await.unwrap();
        let index = SqliteIndex::new(pool);
        index.ensure_ready().await.unwrap();
        (tmp, index)
    }

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
    async fn ensure_ready_is_idempotent() {
        let (_tmp, index) = test_index().await;
        index.ensure_ready().await.unwrap();
        index.ensure_ready().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_query_roundtrip() {
        let (_tmp, index) = test_index().await;
        index
            .upsert(&[
                record("doc.txt-chunk-0", "doc.txt", 0, vec![1.0, 0.0]),
                record("doc.txt-chunk-1", "doc.txt", 1, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.0], 10).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "doc.txt-chunk-0");
        assert!((matches[0].score - 1.0).abs() < 1e-6);
        assert_eq!(matches[0].metadata.source, "doc.txt");
        assert_eq!(matches[0].metadata.ordinal, 0);
    }

    #[tokio::test]
    async fn upsert_same_id_replaces() {
        let (_tmp, index) = test_index().await;
        index
            .upsert(&[record("doc.txt-chunk-0", "doc.txt", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(&[record("doc.txt-chunk-0", "doc.txt", 0, vec![0.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(index.stats().await.unwrap().record_count, 1);
    }

    #[tokio::test]
    async fn filter_delete_and_reset() {
        let (_tmp, index) = test_index().await;
        index
            .upsert(&[
                record("a.txt-chunk-0", "a.txt", 0, vec![1.0]),
                record("a.txt-chunk-1", "a.txt", 1, vec![1.0]),
                record("b.txt-chunk-0", "b.txt", 0, vec![1.0]),
            ])
            .await
            .unwrap();

        let removed = index
            .delete_by_filter(&DeleteFilter::stale_tail("a.txt", 1))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let removed = index
            .delete_by_filter(&DeleteFilter::source("a.txt"))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        assert_eq!(index.delete_all().await.unwrap(), 1);
        assert_eq!(index.delete_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dimension_mismatch_rejected() {
        let (_tmp, index) = test_index().await;
        index
            .upsert(&[record("a.txt-chunk-0", "a.txt", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        let err = index
            .upsert(&[record("b.txt-chunk-0", "b.txt", 0, vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VectorIndex(_)));
    }

    #[tokio::test]
    async fn query_dimension_mismatch_rejected() {
        let (_tmp, index) = test_index().await;
        index
            .upsert(&[record("doc.txt-chunk-0", "doc.txt", 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        let err = index.query(&[1.0, 0.0, 0.0], 5).await.unwrap_err();
        assert!(matches!(err, Error::VectorIndex(_)));

        // An empty index accepts any query width
        index.delete_all().await.unwrap();
        assert!(index.query(&[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());
    }
}
