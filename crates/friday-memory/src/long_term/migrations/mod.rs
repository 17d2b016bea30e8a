//! Vector index migrations

use rusqlite::Connection;

use crate::MemoryResult;

/// Vector index tables SQL (001)
pub const VECTOR_INDEX_SQL: &str = include_str!("001_vector_index.sql");

/// Run all vector index migrations
pub fn run_migrations(conn: &Connection) -> MemoryResult<()> {
    conn.execute_batch(VECTOR_INDEX_SQL)?;
    Ok(())
}
