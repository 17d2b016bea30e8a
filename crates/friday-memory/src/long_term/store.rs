//! Long Tier Store Implementation
//!
//! Optional-safe wrapper around [`VectorIndex`]. When the index could not be
//! opened every call is a no-op returning an empty result.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::embeddings::Embedder;
use super::index::VectorIndex;
use super::types::{Collection, Document, QueryHit};
use crate::capability::{Capability, TierState};

/// Long tier store
pub struct LongTermStore {
    index: Capability<VectorIndex>,
    collections: BTreeSet<Collection>,
}

impl LongTermStore {
    /// Open the index under `dir` and get-or-create every collection.
    ///
    /// Never fails: an index that cannot be opened yields a degraded store,
    /// and a collection that cannot be prepared is left out.
    pub async fn open(dir: &Path, embedder: Arc<dyn Embedder>) -> Self {
        let index = match VectorIndex::open(dir, embedder).await {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "Long-term memory unavailable");
                return Self::unavailable(e.to_string());
            }
        };

        let mut collections = BTreeSet::new();
        for collection in Collection::ALL {
            match index.ensure_collection(collection).await {
                Ok(()) => {
                    collections.insert(collection);
                }
                Err(e) => {
                    tracing::warn!(collection = %collection, error = %e, "Long-term collection unavailable");
                }
            }
        }

        if collections.is_empty() {
            return Self::unavailable("no collection could be prepared");
        }

        tracing::info!(path = %dir.display(), collections = collections.len(), "Long-term memory initialized");
        Self {
            index: Capability::Available(index),
            collections,
        }
    }

    /// A store with no backing index
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            index: Capability::degraded(reason),
            collections: BTreeSet::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.index.is_available()
    }

    pub fn state(&self) -> TierState {
        self.index.state()
    }

    /// Why the tier is degraded, if it is
    pub fn degraded_reason(&self) -> Option<&str> {
        self.index.reason()
    }

    pub fn is_collection_available(&self, collection: Collection) -> bool {
        self.is_available() && self.collections.contains(&collection)
    }

    /// Collections that accept reads and writes
    pub fn available_collections(&self) -> Vec<Collection> {
        self.collections.iter().copied().collect()
    }

    fn index_for(&self, collection: Collection) -> Option<&VectorIndex> {
        self.index.get().filter(|_| self.collections.contains(&collection))
    }

    /// Add a document; false when the tier or collection is unavailable or the write fails
    pub async fn add_document(&self, collection: Collection, id: &str, text: &str, metadata: Map<String, Value>) -> bool {
        let Some(index) = self.index_for(collection) else {
            tracing::debug!(collection = %collection, "Long-term collection unavailable, document not stored");
            return false;
        };

        let document = Document {
            id: id.to_string(),
            text: text.to_string(),
            metadata,
        };

        match index.add(collection, document).await {
            Ok(()) => {
                tracing::debug!(collection = %collection, id = %id, "Document stored in long-term memory");
                true
            }
            Err(e) => {
                tracing::error!(collection = %collection, id = %id, error = %e, "Error storing long-term document");
                false
            }
        }
    }

    /// Nearest documents to `query_text`; empty when unavailable
    pub async fn query(&self, collection: Collection, query_text: &str, n_results: usize) -> Vec<QueryHit> {
        let Some(index) = self.index_for(collection) else {
            return Vec::new();
        };

        match index.query(collection, query_text, n_results).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::error!(collection = %collection, error = %e, "Error querying long-term memory");
                Vec::new()
            }
        }
    }

    /// Documents in a collection; 0 when unavailable
    pub async fn count(&self, collection: Collection) -> u64 {
        let Some(index) = self.index_for(collection) else {
            return 0;
        };

        match index.count(collection).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(collection = %collection, error = %e, "Could not count long-term documents");
                0
            }
        }
    }

    /// Check that the index answers queries
    pub async fn ping(&self) -> bool {
        match self.index.get() {
            Some(index) => index.ping().await,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::long_term::embeddings::HashingEmbedder;
    use serde_json::json;

    async fn open_store(dir: &tempfile::TempDir) -> LongTermStore {
        LongTermStore::open(dir.path(), Arc::new(HashingEmbedder::default())).await
    }

    #[tokio::test]
    async fn test_open_prepares_all_collections() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        assert!(store.is_available());
        assert_eq!(store.state(), TierState::Available);
        assert_eq!(store.available_collections(), Collection::ALL.to_vec());
        assert!(store.ping().await);
        assert!(dir.path().join(crate::long_term::INDEX_FILE).exists());
    }

    #[tokio::test]
    async fn test_add_query_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let mut metadata = Map::new();
        metadata.insert("category".into(), json!("AI"));
        assert!(
            store
                .add_document(Collection::Knowledge, "k1", "Mixtral is a mixture-of-experts model", metadata)
                .await
        );
        assert!(
            store
                .add_document(Collection::Knowledge, "k2", "Paris is the capital of France", Map::new())
                .await
        );

        let hits = store.query(Collection::Knowledge, "Mixtral", 5).await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.id, "k1");
        assert_eq!(hits[0].document.metadata.get("category"), Some(&json!("AI")));
        assert_eq!(store.count(Collection::Knowledge).await, 2);
        assert_eq!(store.count(Collection::Persona).await, 0);
    }

    #[tokio::test]
    async fn test_unwritable_path_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let store = LongTermStore::open(&blocker.join("long_term"), Arc::new(HashingEmbedder::default())).await;

        assert!(!store.is_available());
        assert!(store.degraded_reason().is_some());
        assert!(!store.add_document(Collection::Knowledge, "x", "text", Map::new()).await);
        assert!(store.query(Collection::Knowledge, "text", 3).await.is_empty());
        assert_eq!(store.count(Collection::Knowledge).await, 0);
        assert!(!store.ping().await);
    }

    #[tokio::test]
    async fn test_explicitly_unavailable() {
        let store = LongTermStore::unavailable("vector engine not installed");
        assert_eq!(store.state(), TierState::Degraded);
        assert_eq!(store.degraded_reason(), Some("vector engine not installed"));
        assert!(store.available_collections().is_empty());
        assert!(!store.is_collection_available(Collection::Persona));
    }
}
