//! Persistent vector index
//!
//! Documents and their embeddings live in `index.sqlite3` inside the long
//! tier directory. Search is exact: every document of the collection is
//! scored by cosine distance to the query, which is plenty for a personal
//! assistant's corpus.

use std::path::Path;
use std::sync::Arc;

use rusqlite::params;
use serde_json::{Map, Value};

use super::embeddings::{Embedder, cosine_similarity};
use super::migrations;
use super::types::{Collection, Document, QueryHit};
use crate::db::{self, ConnectionPool, format_timestamp, run_blocking};
use crate::{MemoryError, MemoryResult};

/// File name of the index inside the long tier directory
pub const INDEX_FILE: &str = "index.sqlite3";

/// Vector index over named collections
pub struct VectorIndex {
    pool: Arc<ConnectionPool>,
    embedder: Arc<dyn Embedder>,
}

impl VectorIndex {
    /// Open (or create) the index under `dir`
    pub async fn open(dir: &Path, embedder: Arc<dyn Embedder>) -> MemoryResult<Self> {
        std::fs::create_dir_all(dir)?;
        let pool = ConnectionPool::open(dir.join(INDEX_FILE))?;
        run_blocking(&pool, |conn| migrations::run_migrations(conn)).await?;

        tracing::debug!(path = %pool.path().display(), model = embedder.model_name(), "Opened vector index");
        Ok(Self { pool, embedder })
    }

    /// The embedder used for documents and queries
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Get or create a collection.
    ///
    /// Fails when the collection already exists with a different model or
    /// dimension, since its stored vectors would not be comparable.
    pub async fn ensure_collection(&self, collection: Collection) -> MemoryResult<()> {
        let name = collection.as_str();
        let model = self.embedder.model_name().to_string();
        let dimension = self.embedder.dimension() as i64;
        let created_at = format_timestamp(db::now());

        let (stored_model, stored_dimension): (String, i64) = run_blocking(&self.pool, {
            let model = model.clone();
            move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO collections (name, model, dimension, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![name, model, dimension, created_at],
                )?;
                Ok(conn.query_row(
                    "SELECT model, dimension FROM collections WHERE name = ?1",
                    params![name],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?)
            }
        })
        .await?;

        if stored_model != model || stored_dimension != dimension {
            return Err(MemoryError::unavailable(
                format!("long_term.{name}"),
                format!(
                    "collection was built with {stored_model} ({stored_dimension} dims), current embedder is {model} ({dimension} dims)"
                ),
            ));
        }

        Ok(())
    }

    /// Embed and store a document
    pub async fn add(&self, collection: Collection, document: Document) -> MemoryResult<()> {
        let embedding = self.embed_checked(&document.text).await?;
        let blob = encode_embedding(&embedding);
        let metadata = serde_json::to_string(&document.metadata)?;

        run_blocking(&self.pool, move |conn| {
            conn.execute(
                "INSERT INTO documents (collection, id, text, metadata, embedding) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![collection.as_str(), document.id, document.text, metadata, blob],
            )?;
            Ok(())
        })
        .await
    }

    /// The `n_results` documents closest to `query_text`, nearest first.
    /// Equal distances keep insertion order.
    pub async fn query(&self, collection: Collection, query_text: &str, n_results: usize) -> MemoryResult<Vec<QueryHit>> {
        if n_results == 0 {
            return Ok(Vec::new());
        }

        let query = self.embed_checked(query_text).await?;

        run_blocking(&self.pool, move |conn| {
            let mut stmt =
                conn.prepare("SELECT id, text, metadata, embedding FROM documents WHERE collection = ?1 ORDER BY seq")?;

            let rows = stmt.query_map(params![collection.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })?;

            let mut hits = Vec::new();
            for row in rows {
                let (id, text, metadata, blob) = row?;

                let Some(embedding) = decode_embedding(&blob).filter(|e| e.len() == query.len()) else {
                    tracing::error!(collection = %collection, id = %id, "Skipping document with a malformed embedding");
                    continue;
                };

                hits.push(QueryHit {
                    distance: Some(1.0 - cosine_similarity(&query, &embedding)),
                    document: Document {
                        metadata: parse_metadata(&metadata, &id),
                        id,
                        text,
                    },
                });
            }

            // sort_by is stable, so ties stay in insertion order
            hits.sort_by(|a, b| {
                a.distance
                    .unwrap_or(f32::INFINITY)
                    .total_cmp(&b.distance.unwrap_or(f32::INFINITY))
            });
            hits.truncate(n_results);
            Ok(hits)
        })
        .await
    }

    /// Documents in a collection
    pub async fn count(&self, collection: Collection) -> MemoryResult<u64> {
        let count: i64 = run_blocking(&self.pool, move |conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection.as_str()],
                |row| row.get(0),
            )?)
        })
        .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Check that the index file answers queries
    pub async fn ping(&self) -> bool {
        run_blocking(&self.pool, |conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM collections", [], |row| row.get::<_, i64>(0))?)
        })
        .await
        .is_ok()
    }

    async fn embed_checked(&self, text: &str) -> MemoryResult<Vec<f32>> {
        let embedding = self.embedder.embed(text).await?;
        if embedding.len() != self.embedder.dimension() {
            return Err(MemoryError::embedding(format!(
                "{} returned {} dimensions, expected {}",
                self.embedder.model_name(),
                embedding.len(),
                self.embedder.dimension()
            )));
        }
        Ok(embedding)
    }
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|value| value.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }

    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

fn parse_metadata(raw: &str, id: &str) -> Map<String, Value> {
    match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            tracing::error!(id = %id, "Document metadata is not a JSON object, ignoring it");
            Map::new()
        }
    }
}
