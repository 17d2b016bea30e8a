//! Mid tier database migrations
//!
//! SQL migrations are embedded as strings and executed by `create_schema`.
//! Every statement is idempotent, so they run on each startup.

use rusqlite::Connection;

use crate::MemoryResult;

/// Mid tier tables SQL (001)
pub const MID_TERM_TABLES_SQL: &str = include_str!("001_mid_term_tables.sql");

/// Run all mid tier migrations
pub fn run_migrations(conn: &Connection) -> MemoryResult<()> {
    conn.execute_batch(MID_TERM_TABLES_SQL)?;
    Ok(())
}
