//! Long tier: persistent semantic memory
//!
//! A vector index with three collections (knowledge, interactions, persona)
//! supporting nearest-neighbour text search. The tier is optional: if the
//! index cannot be opened the rest of the system keeps working without
//! semantic search.

mod index;
mod store;
mod types;

pub mod embeddings;
pub mod migrations;

pub use embeddings::{Embedder, HashingEmbedder, cosine_similarity, default_embedder};
#[cfg(feature = "embeddings")]
pub use embeddings::FastEmbedder;
pub use index::{INDEX_FILE, VectorIndex};
pub use store::LongTermStore;
pub use types::{Collection, Document, QueryHit, SearchHit};
