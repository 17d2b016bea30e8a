//! Memory System Facade
//!
//! Single owner of the three tiers. Callers (request routing, intent
//! analysis, knowledge ingestion) only ever talk to [`MemorySystem`].
//! No method returns an error: a failing tier is logged and the call
//! answers with an empty, absent or `false` result.

mod status;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::capability::Capability;
use crate::config::MemoryConfig;
use crate::db::{self, format_timestamp};
use crate::long_term::{Collection, Embedder, LongTermStore, QueryHit, SearchHit, default_embedder};
use crate::mid_term::{Interaction, InteractionInput, MidTermStore, NewSessionSummary, SessionSummary};
use crate::short_term::ShortTermStore;

pub use status::{
    CleanupReport, CollectionStatus, ConnectivityReport, LongTermStatus, MemoryStatus, MidTermStatus, ShortTermStatus,
};

/// Three-tier memory system
///
/// # Example
///
/// ```rust,no_run
/// use std::path::Path;
///
/// use friday_memory::MemorySystem;
/// use serde_json::json;
///
/// async fn example() {
///     let memory = MemorySystem::open(Some(Path::new("configs/memory_config.json"))).await;
///
///     memory.store_interaction(json!({ "user_input": "hi", "friday_response": "hello" })).await;
///     let recent = memory.get_recent_interactions(5).await;
///
///     memory.store_knowledge("Mixtral is a mixture-of-experts model", None).await;
///     let hits = memory.semantic_search("Mixtral", 3).await;
/// }
/// ```
pub struct MemorySystem {
    config: MemoryConfig,
    short_term: ShortTermStore,
    mid_term: Capability<MidTermStore>,
    long_term: LongTermStore,
}

impl MemorySystem {
    /// Load configuration from `config_path` (writing defaults on first run)
    /// and initialize every tier
    pub async fn open(config_path: Option<&Path>) -> Self {
        Self::with_config(MemoryConfig::load(config_path)).await
    }

    /// Initialize every tier from an already-loaded configuration
    pub async fn with_config(config: MemoryConfig) -> Self {
        Self::with_embedder(config, default_embedder()).await
    }

    /// Initialize every tier, embedding long tier documents with `embedder`
    pub async fn with_embedder(config: MemoryConfig, embedder: Arc<dyn Embedder>) -> Self {
        if let Err(e) = config.ensure_directories() {
            tracing::warn!(error = %e, "Could not create memory data directories");
        }

        let short_term = ShortTermStore::connect(&config.short_term).await;
        let mid_term = open_mid_term(&config.mid_term.db_path).await;
        let long_term = LongTermStore::open(&config.long_term.db_path, embedder).await;

        Self::from_parts(config, short_term, mid_term, long_term)
    }

    /// Assemble a system from individually constructed tiers
    pub fn from_parts(
        config: MemoryConfig,
        short_term: ShortTermStore,
        mid_term: Capability<MidTermStore>,
        long_term: LongTermStore,
    ) -> Self {
        tracing::info!(
            short_term = %short_term.state(),
            mid_term = %mid_term.state(),
            long_term = %long_term.state(),
            "Memory system initialized"
        );

        Self {
            config,
            short_term,
            mid_term,
            long_term,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn short_term(&self) -> &ShortTermStore {
        &self.short_term
    }

    /// The mid tier store, when it opened
    pub fn mid_term(&self) -> Option<&MidTermStore> {
        self.mid_term.get()
    }

    pub fn long_term(&self) -> &LongTermStore {
        &self.long_term
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Short-term
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a value in the fast tier; `ttl` defaults to the configured one
    pub async fn store_short_term<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<u64>) -> bool {
        self.short_term.store(key, value, ttl).await
    }

    /// Read a value from the fast tier
    pub async fn get_short_term(&self, key: &str) -> Option<Value> {
        self.short_term.get(key).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Interactions
    // ─────────────────────────────────────────────────────────────────────────

    /// Record an interaction.
    ///
    /// The mid tier write is authoritative: the returned id is `None` unless
    /// it succeeded. The record is also mirrored into the long tier
    /// `interactions` collection on a best-effort basis.
    pub async fn store_interaction(&self, data: impl Into<InteractionInput>) -> Option<String> {
        let interaction = data.into().into_interaction(db::now());

        let recorded = match self.mid_term.get() {
            Some(mid_term) => match mid_term.insert(&interaction).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(id = %interaction.id, error = %e, "Error storing interaction in mid-term memory");
                    false
                }
            },
            None => {
                tracing::warn!(id = %interaction.id, "Mid-term memory unavailable, interaction not recorded");
                false
            }
        };

        self.mirror_interaction(&interaction).await;

        recorded.then_some(interaction.id)
    }

    /// Record a message from the user
    pub async fn store_user_message(&self, text: &str, conversation_id: Option<&str>) -> Option<String> {
        let input = InteractionInput::user(text).in_conversation(conversation_id.map(str::to_string));
        self.store_interaction(input).await
    }

    /// Record a reply from the assistant
    pub async fn store_friday_message(&self, text: &str, conversation_id: Option<&str>) -> Option<String> {
        let input = InteractionInput::friday(text).in_conversation(conversation_id.map(str::to_string));
        self.store_interaction(input).await
    }

    async fn mirror_interaction(&self, interaction: &Interaction) {
        if !self.long_term.is_collection_available(Collection::Interactions) {
            return;
        }

        let mut metadata = base_metadata(&format_timestamp(interaction.timestamp), "interaction");
        match &interaction.metadata {
            Some(Value::Object(extra)) => {
                metadata.extend(extra.clone());
            }
            Some(Value::String(extra)) => {
                metadata.insert("additional".into(), Value::String(extra.clone()));
            }
            Some(Value::Null) | None => {}
            Some(other) => {
                metadata.insert("additional".into(), Value::String(other.to_string()));
            }
        }

        self.long_term
            .add_document(Collection::Interactions, &interaction.id, &interaction.transcript(), metadata)
            .await;
    }

    /// Most recent interactions, newest first
    pub async fn get_recent_interactions(&self, count: usize) -> Vec<Interaction> {
        let Some(mid_term) = self.mid_term.get() else {
            return Vec::new();
        };

        match mid_term.list_recent_interactions(count).await {
            Ok(interactions) => interactions,
            Err(e) => {
                tracing::error!(error = %e, "Error retrieving recent interactions");
                Vec::new()
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Preferences
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or overwrite a user preference
    pub async fn store_user_preference<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let Some(mid_term) = self.mid_term.get() else {
            tracing::warn!(key = %key, "Mid-term memory unavailable, preference not stored");
            return false;
        };

        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Could not serialize preference");
                return false;
            }
        };

        match mid_term.upsert_preference(key, &value).await {
            Ok(()) => {
                tracing::debug!(key = %key, "User preference stored");
                true
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Error storing user preference");
                false
            }
        }
    }

    /// A preference, or `default` when unset or unreadable
    pub async fn get_user_preference(&self, key: &str, default: Value) -> Value {
        let Some(mid_term) = self.mid_term.get() else {
            return default;
        };

        match mid_term.get_preference(key).await {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Error retrieving user preference");
                default
            }
        }
    }

    /// Every stored preference
    pub async fn get_user_profile(&self) -> Map<String, Value> {
        let Some(mid_term) = self.mid_term.get() else {
            return Map::new();
        };

        match mid_term.get_all_preferences().await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::error!(error = %e, "Error retrieving user profile");
                Map::new()
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session summaries
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a session summary, returning its id
    pub async fn store_session_summary(&self, summary: NewSessionSummary) -> Option<String> {
        let mid_term = self.mid_term.get()?;

        match mid_term.insert_session_summary(summary).await {
            Ok(stored) => Some(stored.id),
            Err(e) => {
                tracing::error!(error = %e, "Error storing session summary");
                None
            }
        }
    }

    /// Most recent session summaries, newest first
    pub async fn get_session_summaries(&self, limit: usize) -> Vec<SessionSummary> {
        let Some(mid_term) = self.mid_term.get() else {
            return Vec::new();
        };

        match mid_term.list_session_summaries(limit).await {
            Ok(summaries) => summaries,
            Err(e) => {
                tracing::error!(error = %e, "Error retrieving session summaries");
                Vec::new()
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Long-term
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a piece of knowledge, returning its id
    pub async fn store_knowledge(&self, text: &str, metadata: Option<Map<String, Value>>) -> Option<String> {
        self.store_document(Collection::Knowledge, "knowledge", text, metadata).await
    }

    /// Store a fact about the assistant's persona, returning its id
    pub async fn store_persona(&self, text: &str, metadata: Option<Map<String, Value>>) -> Option<String> {
        self.store_document(Collection::Persona, "persona", text, metadata).await
    }

    async fn store_document(
        &self,
        collection: Collection,
        kind: &str,
        text: &str,
        extra: Option<Map<String, Value>>,
    ) -> Option<String> {
        if !self.long_term.is_collection_available(collection) {
            tracing::warn!(collection = %collection, "Long-term memory not available for storing {kind}");
            return None;
        }

        let id = Uuid::new_v4().to_string();
        let mut metadata = base_metadata(&format_timestamp(db::now()), kind);
        if let Some(extra) = extra {
            metadata.extend(extra);
        }

        self.long_term
            .add_document(collection, &id, text, metadata)
            .await
            .then_some(id)
    }

    /// Search the knowledge collection, nearest first
    pub async fn search_knowledge(&self, query: &str, n_results: usize) -> Vec<QueryHit> {
        if !self.long_term.is_collection_available(Collection::Knowledge) {
            tracing::warn!("Long-term memory not available for searching knowledge");
            return Vec::new();
        }

        let hits = self.long_term.query(Collection::Knowledge, query, n_results).await;
        tracing::debug!(query = %query, results = hits.len(), "Knowledge search finished");
        hits
    }

    /// Search every available collection, up to `n_results` per collection,
    /// merged nearest first
    pub async fn semantic_search(&self, query: &str, n_results: usize) -> Vec<SearchHit> {
        if !self.long_term.is_available() {
            tracing::warn!("Long-term memory not available for semantic search");
            return Vec::new();
        }

        let mut hits = Vec::new();
        for collection in self.long_term.available_collections() {
            hits.extend(
                self.long_term
                    .query(collection, query, n_results)
                    .await
                    .into_iter()
                    .map(|hit| SearchHit::from_query_hit(hit, collection)),
            );
        }

        let hits = merge_by_distance(hits);
        tracing::debug!(query = %query, results = hits.len(), "Semantic search finished");
        hits
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Remove interactions older than the configured retention period
    pub async fn cleanup_expired_data(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        if let Some(mid_term) = self.mid_term.get() {
            match mid_term.cleanup_expired(self.config.mid_term.retention_days).await {
                Ok(removed) => report.mid_term = removed as u64,
                Err(e) => tracing::error!(error = %e, "Error cleaning mid-term memory"),
            }
        }

        report
    }

    /// Availability and counts for every tier
    pub async fn get_memory_status(&self) -> MemoryStatus {
        let short_term = ShortTermStatus {
            state: self.short_term.state(),
            available: self.short_term.is_cache_available(),
            fallback_available: true,
            cache_keys: self.short_term.cache_key_count().await.unwrap_or(0),
            fallback_keys: self.short_term.fallback_len().await,
        };

        let mid_counts = match self.mid_term.get() {
            Some(mid_term) => mid_term.counts().await,
            None => Default::default(),
        };
        let mid_term = MidTermStatus {
            state: self.mid_term.state(),
            available: self.mid_term.is_available(),
            interactions: mid_counts.interactions,
            sessions: mid_counts.sessions,
            preferences: mid_counts.preferences,
        };

        let long_term = LongTermStatus {
            state: self.long_term.state(),
            available: self.long_term.is_available(),
            knowledge: self.collection_status(Collection::Knowledge).await,
            interactions: self.collection_status(Collection::Interactions).await,
            persona: self.collection_status(Collection::Persona).await,
        };

        MemoryStatus {
            short_term,
            mid_term,
            long_term,
        }
    }

    async fn collection_status(&self, collection: Collection) -> CollectionStatus {
        CollectionStatus {
            available: self.long_term.is_collection_available(collection),
            count: self.long_term.count(collection).await,
        }
    }

    /// Check each backend right now without changing any tier's state
    pub async fn test_connectivity(&self) -> ConnectivityReport {
        let mid_term = match self.mid_term.get() {
            Some(mid_term) => mid_term.ping().await,
            None => false,
        };

        let report = ConnectivityReport {
            short_term: self.short_term.ping().await,
            mid_term,
            long_term: self.long_term.ping().await,
        };

        tracing::info!(
            short_term = report.short_term,
            mid_term = report.mid_term,
            long_term = report.long_term,
            "Memory connectivity checked"
        );
        report
    }
}

async fn open_mid_term(path: &Path) -> Capability<MidTermStore> {
    let opened = match MidTermStore::open(path) {
        Ok(store) => store.create_schema().await.map(|()| store),
        Err(e) => Err(e),
    };

    match &opened {
        Ok(_) => tracing::info!(path = %path.display(), "Mid-term memory initialized"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Mid-term memory unavailable"),
    }
    Capability::from(opened)
}

fn base_metadata(timestamp: &str, kind: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("timestamp".into(), Value::String(timestamp.to_string()));
    metadata.insert("type".into(), Value::String(kind.to_string()));
    metadata
}

/// Order hits by ascending distance. The sort is stable and hits without a
/// distance go last, so equal or missing distances keep their input order.
pub fn merge_by_distance(mut hits: Vec<SearchHit>) -> Vec<SearchHit> {
    hits.sort_by(|a, b| match (a.distance, b.distance) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    hits
}
