//! Mid Tier Store Implementation
//!
//! SQLite-backed storage for interactions, preferences and session summaries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use rusqlite::{OptionalExtension, params};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::migrations;
use super::types::*;
use crate::db::{self, ConnectionPool, format_timestamp, parse_timestamp, run_blocking};
use crate::{MemoryError, MemoryResult};

/// Durable store for structured records
pub struct MidTermStore {
    pool: Arc<ConnectionPool>,
}

impl MidTermStore {
    /// Open (or create) the database file
    pub fn open(path: impl Into<PathBuf>) -> MemoryResult<Self> {
        let pool = ConnectionPool::open(path)?;
        Ok(Self { pool })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        self.pool.path()
    }

    /// Create tables and indexes if they do not exist
    pub async fn create_schema(&self) -> MemoryResult<()> {
        run_blocking(&self.pool, |conn| migrations::run_migrations(conn)).await?;
        tracing::debug!(path = %self.path().display(), "Mid-term tables created/verified");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Interactions
    // ─────────────────────────────────────────────────────────────────────────

    /// Normalize and store an interaction
    pub async fn insert_interaction(&self, input: impl Into<InteractionInput>) -> MemoryResult<Interaction> {
        let interaction = input.into().into_interaction(db::now());
        self.insert(&interaction).await?;
        Ok(interaction)
    }

    /// Store an already-normalized interaction
    pub async fn insert(&self, interaction: &Interaction) -> MemoryResult<()> {
        let record = interaction.clone();

        run_blocking(&self.pool, move |conn| {
            conn.execute(
                "INSERT INTO interactions (id, timestamp, user_input, friday_response, context, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    &record.id,
                    format_timestamp(record.timestamp),
                    &record.user_input,
                    &record.friday_response,
                    json_text(record.context.as_ref())?,
                    json_text(record.metadata.as_ref())?,
                ],
            )?;
            Ok(())
        })
        .await?;

        tracing::debug!(id = %interaction.id, "Interaction stored in mid-term memory");
        Ok(())
    }

    /// Most recent interactions, newest first
    pub async fn list_recent_interactions(&self, limit: usize) -> MemoryResult<Vec<Interaction>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = run_blocking(&self.pool, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, user_input, friday_response, context, metadata
                 FROM interactions
                 ORDER BY timestamp DESC, rowid DESC
                 LIMIT ?1",
            )?;

            let rows = stmt
                .query_map(params![limit], |row| {
                    Ok(InteractionRow {
                        id: row.get(0)?,
                        timestamp: row.get(1)?,
                        user_input: row.get(2)?,
                        friday_response: row.get(3)?,
                        context: row.get(4)?,
                        metadata: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await?;

        Ok(rows.into_iter().map(InteractionRow::into_interaction).collect())
    }

    /// Delete interactions older than `retention_days`, returning how many were removed
    pub async fn cleanup_expired(&self, retention_days: u32) -> MemoryResult<usize> {
        let cutoff = Duration::try_days(i64::from(retention_days)).and_then(|age| Utc::now().checked_sub_signed(age));
        let Some(cutoff) = cutoff else {
            tracing::warn!(retention_days, "Retention period reaches before the earliest timestamp, nothing to clean up");
            return Ok(0);
        };
        let cutoff_text = format_timestamp(cutoff);

        let removed = run_blocking(&self.pool, move |conn| {
            Ok(conn.execute("DELETE FROM interactions WHERE timestamp < ?1", params![cutoff_text])?)
        })
        .await?;

        tracing::info!(removed, retention_days, "Cleaned up expired interactions");
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Preferences
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or overwrite a preference
    pub async fn upsert_preference(&self, key: &str, value: &Value) -> MemoryResult<()> {
        let key = key.to_string();
        let value = serde_json::to_string(value)?;
        let now = format_timestamp(db::now());

        run_blocking(&self.pool, move |conn| {
            conn.execute(
                "INSERT INTO user_preferences (key, value, last_updated) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, last_updated = excluded.last_updated",
                params![key, value, now],
            )?;
            Ok(())
        })
        .await
    }

    /// A single preference value, if set
    pub async fn get_preference(&self, key: &str) -> MemoryResult<Option<Value>> {
        let lookup = key.to_string();

        let raw: Option<String> = run_blocking(&self.pool, move |conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM user_preferences WHERE key = ?1",
                    params![lookup],
                    |row| row.get(0),
                )
                .optional()?)
        })
        .await?;

        raw.map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| MemoryError::malformed("preference", format!("{key}: {e}")))
        })
        .transpose()
    }

    /// Every preference, ordered by key. Values that fail to parse are skipped.
    pub async fn list_preferences(&self) -> MemoryResult<Vec<Preference>> {
        let rows: Vec<(String, String, String)> = run_blocking(&self.pool, |conn| {
            let mut stmt = conn.prepare("SELECT key, value, last_updated FROM user_preferences ORDER BY key")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await?;

        let mut preferences = Vec::with_capacity(rows.len());
        for (key, raw, last_updated) in rows {
            match serde_json::from_str(&raw) {
                Ok(value) => preferences.push(Preference {
                    last_updated: timestamp_or_epoch(&last_updated),
                    key,
                    value,
                }),
                Err(e) => tracing::error!(key = %key, error = %e, "Skipping malformed preference"),
            }
        }
        Ok(preferences)
    }

    /// Every preference as a key → value map
    pub async fn get_all_preferences(&self) -> MemoryResult<Map<String, Value>> {
        Ok(self
            .list_preferences()
            .await?
            .into_iter()
            .map(|pref| (pref.key, pref.value))
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session summaries
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a session summary
    pub async fn insert_session_summary(&self, input: NewSessionSummary) -> MemoryResult<SessionSummary> {
        let summary = SessionSummary {
            id: Uuid::new_v4().to_string(),
            start_time: input.start_time.trunc_subsecs(6),
            end_time: input.end_time.map(|end| end.trunc_subsecs(6)),
            summary: input.summary,
            metadata: input.metadata,
        };
        let record = summary.clone();

        run_blocking(&self.pool, move |conn| {
            conn.execute(
                "INSERT INTO session_summaries (id, start_time, end_time, summary, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    &record.id,
                    format_timestamp(record.start_time),
                    record.end_time.map(format_timestamp),
                    &record.summary,
                    json_text(record.metadata.as_ref())?,
                ],
            )?;
            Ok(())
        })
        .await?;

        tracing::debug!(id = %summary.id, "Session summary stored");
        Ok(summary)
    }

    /// Most recent session summaries by start time, newest first
    pub async fn list_session_summaries(&self, limit: usize) -> MemoryResult<Vec<SessionSummary>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows: Vec<(String, String, Option<String>, Option<String>, Option<String>)> =
            run_blocking(&self.pool, move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, start_time, end_time, summary, metadata
                     FROM session_summaries
                     ORDER BY start_time DESC, rowid DESC
                     LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map(params![limit], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, start_time, end_time, summary, metadata)| SessionSummary {
                start_time: timestamp_or_epoch(&start_time),
                end_time: end_time.as_deref().map(timestamp_or_epoch),
                metadata: json_column(metadata, "metadata", &id),
                summary,
                id,
            })
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Health
    // ─────────────────────────────────────────────────────────────────────────

    /// Rows in a table
    pub async fn count_rows(&self, table: MidTermTable) -> MemoryResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.as_str());

        let count: i64 = run_blocking(&self.pool, move |conn| {
            Ok(conn.query_row(&sql, [], |row| row.get(0))?)
        })
        .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Row counts for every table; a failing count reads as 0
    pub async fn counts(&self) -> MidTermCounts {
        let mut counts = MidTermCounts::default();

        for table in MidTermTable::ALL {
            let count = match self.count_rows(table).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::warn!(table = table.as_str(), error = %e, "Could not count mid-term rows");
                    0
                }
            };

            match table {
                MidTermTable::Interactions => counts.interactions = count,
                MidTermTable::SessionSummaries => counts.sessions = count,
                MidTermTable::UserPreferences => counts.preferences = count,
            }
        }

        counts
    }

    /// Check that the database answers queries
    pub async fn ping(&self) -> bool {
        run_blocking(&self.pool, |conn| {
            Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?)
        })
        .await
        .is_ok()
    }
}

/// Raw interaction row, decoded outside the blocking closure
struct InteractionRow {
    id: String,
    timestamp: String,
    user_input: String,
    friday_response: String,
    context: Option<String>,
    metadata: Option<String>,
}

impl InteractionRow {
    fn into_interaction(self) -> Interaction {
        Interaction {
            timestamp: timestamp_or_epoch(&self.timestamp),
            context: json_column(self.context, "context", &self.id),
            metadata: json_column(self.metadata, "metadata", &self.id),
            user_input: self.user_input,
            friday_response: self.friday_response,
            id: self.id,
        }
    }
}

fn json_text(value: Option<&Value>) -> MemoryResult<Option<String>> {
    Ok(value.map(serde_json::to_string).transpose()?)
}

/// Decode a JSON column, keeping unparseable text as a string value
fn json_column(raw: Option<String>, column: &str, id: &str) -> Option<Value> {
    let raw = raw?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(id = %id, column, error = %e, "Stored JSON column is malformed, returning raw text");
            Some(Value::String(raw))
        }
    }
}

fn timestamp_or_epoch(raw: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|| {
        tracing::error!(timestamp = %raw, "Stored timestamp is malformed");
        DateTime::<Utc>::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use tokio_test::assert_ok;

    async fn open_store(dir: &tempfile::TempDir) -> MidTermStore {
        let store = MidTermStore::open(dir.path().join("mid_term.db")).unwrap();
        store.create_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        assert_ok!(store.create_schema().await);
        assert_ok!(store.create_schema().await);
        assert!(store.ping().await);
        assert_eq!(store.counts().await, MidTermCounts::default());
    }

    #[tokio::test]
    async fn test_insert_and_list_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let mut inserted = Vec::new();
        for i in 0..5 {
            let record = store.insert_interaction(format!("message {i}")).await.unwrap();
            inserted.push(record.id);
        }

        let ids: HashSet<_> = inserted.iter().collect();
        assert_eq!(ids.len(), 5);

        let recent = store.list_recent_interactions(5).await.unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].id, inserted[4]);
        assert_eq!(recent[0].user_input, "message 4");
        assert!(recent.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

        let returned: Vec<_> = recent.iter().rev().map(|r| r.id.clone()).collect();
        assert_eq!(returned, inserted);
    }

    #[tokio::test]
    async fn test_list_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        for i in 0..3 {
            store.insert_interaction(format!("m{i}")).await.unwrap();
        }

        assert_eq!(store.list_recent_interactions(2).await.unwrap().len(), 2);
        assert!(store.list_recent_interactions(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_columns_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let input = ExplicitInteraction {
            context: Some(json!({ "topic": "music" })),
            metadata: Some(json!({ "source": "voice" })),
            ..ExplicitInteraction::exchange("play jazz", "Playing jazz.")
        };
        let stored = store.insert_interaction(input).await.unwrap();

        let recent = store.list_recent_interactions(1).await.unwrap();
        assert_eq!(recent[0].id, stored.id);
        assert_eq!(recent[0].context, Some(json!({ "topic": "music" })));
        assert_eq!(recent[0].metadata, Some(json!({ "source": "voice" })));
        assert_eq!(recent[0].friday_response, "Playing jazz.");
    }

    #[tokio::test]
    async fn test_duplicate_id_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let input = ExplicitInteraction {
            id: Some("fixed".into()),
            user_input: "once".into(),
            ..Default::default()
        };
        store.insert_interaction(input.clone()).await.unwrap();
        assert!(store.insert_interaction(input).await.is_err());
    }

    #[tokio::test]
    async fn test_preference_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.upsert_preference("k", &json!("v1")).await.unwrap();
        store.upsert_preference("k", &json!("v2")).await.unwrap();

        assert_eq!(store.get_preference("k").await.unwrap(), Some(json!("v2")));
        assert_eq!(store.count_rows(MidTermTable::UserPreferences).await.unwrap(), 1);
        assert_eq!(store.get_preference("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_preference_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store.upsert_preference("theme", &json!({ "mode": "dark" })).await.unwrap();

        run_blocking(&store.pool, |conn| {
            conn.execute(
                "INSERT INTO user_preferences (key, value, last_updated) VALUES ('broken', '{nope', '2026-01-01T00:00:00Z')",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        let err = store.get_preference("broken").await.unwrap_err();
        assert!(err.is_malformed());

        let all = store.get_all_preferences().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("theme"), Some(&json!({ "mode": "dark" })));
    }

    #[tokio::test]
    async fn test_cleanup_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let now = Utc::now();

        let recent = ExplicitInteraction {
            id: Some("recent".into()),
            timestamp: Some(now - Duration::days(29)),
            user_input: "keep me".into(),
            ..Default::default()
        };
        let stale = ExplicitInteraction {
            id: Some("stale".into()),
            timestamp: Some(now - Duration::days(31)),
            user_input: "drop me".into(),
            ..Default::default()
        };
        store.insert_interaction(recent).await.unwrap();
        store.insert_interaction(stale).await.unwrap();

        assert_eq!(store.cleanup_expired(30).await.unwrap(), 1);

        let left = store.list_recent_interactions(10).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, "recent");
    }

    #[tokio::test]
    async fn test_cleanup_with_unrepresentable_retention() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let ancient = ExplicitInteraction {
            id: Some("ancient".into()),
            timestamp: Some(Utc::now() - Duration::days(365 * 400)),
            user_input: "still here".into(),
            ..Default::default()
        };
        assert_ok!(store.insert_interaction(ancient).await);
        assert_ok!(store.insert_interaction("today").await);

        assert_eq!(store.cleanup_expired(u32::MAX).await.unwrap(), 0);
        assert_eq!(store.cleanup_expired(100_000_000).await.unwrap(), 0);
        assert_eq!(store.count_rows(MidTermTable::Interactions).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_session_summaries() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let now = Utc::now();

        store
            .insert_session_summary(NewSessionSummary::new(now - Duration::hours(2), "morning planning"))
            .await
            .unwrap();
        let latest = store
            .insert_session_summary(
                NewSessionSummary::new(now - Duration::hours(1), "debugging session")
                    .ended_at(now)
                    .with_metadata(json!({ "turns": 12 })),
            )
            .await
            .unwrap();

        let summaries = store.list_session_summaries(10).await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0], latest);
        assert_eq!(summaries[1].summary.as_deref(), Some("morning planning"));
        assert_eq!(summaries[1].end_time, None);
        assert_eq!(store.counts().await.sessions, 2);
    }

    #[tokio::test]
    async fn test_concurrent_inserts() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(open_store(&dir).await);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.insert_interaction(format!("parallel {i}")).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.count_rows(MidTermTable::Interactions).await.unwrap(), 8);
    }
}
