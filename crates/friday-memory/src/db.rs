//! SQLite plumbing shared by the mid and long tiers.
//!
//! SQLite connections must not be shared between concurrent execution
//! contexts. Every blocking job checks a connection out of a per-file pool,
//! owns it for the duration of the job and hands it back on drop. Connections
//! are opened lazily, so the pool grows to the peak number of concurrent jobs.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::Connection;

use crate::MemoryResult;

/// Idle connections kept per pool; extra connections are closed on return
const MAX_IDLE_CONNECTIONS: usize = 8;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool of connections to a single SQLite file
#[derive(Debug)]
pub struct ConnectionPool {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
}

impl ConnectionPool {
    /// Open a pool for `path`.
    ///
    /// One connection is opened eagerly so an unusable path is reported here
    /// rather than on first use.
    pub fn open(path: impl Into<PathBuf>) -> MemoryResult<Arc<Self>> {
        let path = path.into();
        let conn = Self::connect(&path)?;

        Ok(Arc::new(Self {
            path,
            idle: Mutex::new(vec![conn]),
        }))
    }

    fn connect(path: &Path) -> MemoryResult<Connection> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        // WAL lets readers on other connections proceed during a write
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        tracing::debug!(path = %path.display(), "Opened SQLite connection");
        Ok(conn)
    }

    /// Take a connection for exclusive use by the caller
    pub fn checkout(self: &Arc<Self>) -> MemoryResult<PooledConnection> {
        let idle = match self.idle.lock() {
            Ok(mut idle) => idle.pop(),
            Err(_) => None,
        };

        let conn = match idle {
            Some(conn) => conn,
            None => Self::connect(&self.path)?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(self),
        })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of connections currently parked in the pool
    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    fn give_back(&self, conn: Connection) {
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < MAX_IDLE_CONNECTIONS {
                idle.push(conn);
            }
        }
    }
}

/// A connection checked out of a [`ConnectionPool`]
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<ConnectionPool>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .unwrap_or_else(|| unreachable!("connection is only taken on drop"))
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn
            .as_mut()
            .unwrap_or_else(|| unreachable!("connection is only taken on drop"))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.give_back(conn);
        }
    }
}

/// Run `job` on the blocking thread pool with its own pooled connection
pub async fn run_blocking<T, F>(pool: &Arc<ConnectionPool>, job: F) -> MemoryResult<T>
where
    F: FnOnce(&mut Connection) -> MemoryResult<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = Arc::clone(pool);
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.checkout()?;
        job(&mut conn)
    })
    .await?
}

/// Canonical timestamp text: UTC, microsecond precision, lexically ordered
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time at the precision timestamps are stored with
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Parse ISO-8601 text written by this crate or by older writers
/// (offset-qualified or naive local-less forms).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
