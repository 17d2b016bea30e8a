//! Friday Memory - Three-Tier Memory System
//!
//! Persistent memory for the Friday assistant, split across three tiers:
//!
//! - **short_term** - TTL key/value cache (Redis, with an in-process fallback map)
//! - **mid_term** - Durable structured records: interactions, preferences,
//!   session summaries (SQLite)
//! - **long_term** - Semantic search over knowledge, interactions and persona
//!   collections (embedded vector index)
//!
//! Every backend is optional. A tier whose backend is unreachable at startup
//! runs degraded for the lifetime of the process, and the [`MemorySystem`]
//! facade answers with empty results instead of errors.
//!
//! # Features
//!
//! - `embeddings` - embed documents with a local all-MiniLM-L6-v2 model via
//!   `fastembed` instead of the built-in feature-hashing embedder
//!
//! # Example
//!
//! ```rust,no_run
//! use friday_memory::{MemoryConfig, MemorySystem};
//!
//! async fn example() {
//!     let memory = MemorySystem::with_config(MemoryConfig::default().with_data_dir("/tmp/friday")).await;
//!
//!     memory.store_user_message("Remind me to water the plants", None).await;
//!     memory.store_user_preference("units", "metric").await;
//!
//!     let status = memory.get_memory_status().await;
//!     println!("{}", serde_json::to_string_pretty(&status).unwrap());
//! }
//! ```

pub mod capability;
pub mod config;
pub mod db;
pub mod error;
pub mod long_term;
pub mod mid_term;
pub mod short_term;
pub mod system;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports
// ─────────────────────────────────────────────────────────────────────────────

pub use capability::{Capability, TierState};
pub use config::{
    ConfigValidationError, DEFAULT_CONFIG_PATH, LongTermConfig, MAX_RETENTION_DAYS, MemoryConfig, MidTermConfig,
    ShortTermConfig,
};
pub use error::{MemoryError, MemoryResult};
pub use long_term::{Collection, Document, Embedder, HashingEmbedder, LongTermStore, QueryHit, SearchHit};
pub use mid_term::{
    ExplicitInteraction, Interaction, InteractionInput, MidTermStore, NewSessionSummary, Preference, Role,
    SessionSummary,
};
pub use short_term::ShortTermStore;
pub use system::{
    CleanupReport, CollectionStatus, ConnectivityReport, LongTermStatus, MemoryStatus, MemorySystem, MidTermStatus,
    ShortTermStatus, merge_by_distance,
};
