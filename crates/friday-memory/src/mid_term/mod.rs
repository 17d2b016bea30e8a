//! Mid tier: durable structured records
//!
//! Interactions, user preferences and session summaries in a single SQLite
//! file. Each blocking job runs on its own pooled connection, so concurrent
//! callers never share a connection handle.

mod store;
mod types;

pub mod migrations;

pub use store::MidTermStore;
pub use types::{
    ExplicitInteraction, Interaction, InteractionInput, MidTermCounts, MidTermTable, NewSessionSummary, Preference,
    Role, SessionSummary,
};
