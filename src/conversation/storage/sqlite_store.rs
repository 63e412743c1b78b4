//! `SQLite` conversation store, used when no hosted database is configured.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;
use tracing::info;

use crate::conversation::core::errors::{PersistenceError, PersistenceResult};
use crate::conversation::core::ids::SessionId;
use crate::conversation::storage::record::ConversationRecord;
use crate::conversation::storage::store::{ConversationStore, StoreFuture};

/// Raw row: id, messages, summary, evaluation, `created_at` ms, `ended_at` ms.
type RawRow = (String, String, Option<String>, Option<String>, i64, Option<i64>);

/// `SQLite` implementation of the conversation store.
pub struct SqliteConversationStore {
    conn: Connection,
    table: String,
}

impl SqliteConversationStore {
    /// Open (or create) the database file and table.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn open(path: &Path, table: &str) -> PersistenceResult<Self> {
        let conn = Connection::open(path).await?;
        Self::with_connection(conn, table).await
    }

    /// Create a store backed by a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn open_in_memory(table: &str) -> PersistenceResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::with_connection(conn, table).await
    }

    async fn with_connection(conn: Connection, table: &str) -> PersistenceResult<Self> {
        let table = table.to_string();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    session_id TEXT PRIMARY KEY,
                    messages TEXT NOT NULL,
                    summary TEXT,
                    evaluation TEXT,
                    created_at INTEGER NOT NULL,
                    ended_at INTEGER
                );
                CREATE INDEX IF NOT EXISTS idx_{table_name}_created
                    ON {table_name} (created_at DESC);"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, table })
    }
}

impl ConversationStore for SqliteConversationStore {
    fn upsert(&self, record: ConversationRecord) -> StoreFuture<'_, PersistenceResult<()>> {
        Box::pin(async move {
            let table = self.table.clone();
            let session_id = record.session_id.to_string();
            let messages = serde_json::to_string(&record.turns)?;
            let evaluation = record
                .evaluation
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            let summary = record.summary;
            let created_at = record.created_at.timestamp_millis();
            let ended_at = record.ended_at.map(|ts| ts.timestamp_millis());

            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} (session_id, messages, summary, evaluation, created_at, ended_at)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                             ON CONFLICT(session_id) DO UPDATE SET
                                messages = excluded.messages,
                                summary = excluded.summary,
                                evaluation = excluded.evaluation,
                                created_at = excluded.created_at,
                                ended_at = excluded.ended_at"
                        ),
                        rusqlite::params![session_id, messages, summary, evaluation, created_at, ended_at],
                    )?;
                    Ok(())
                })
                .await?;

            info!("Stored conversation {}", record.session_id);
            Ok(())
        })
    }

    fn get(
        &self,
        session_id: SessionId,
    ) -> StoreFuture<'_, PersistenceResult<Option<ConversationRecord>>> {
        Box::pin(async move {
            let table = self.table.clone();
            let session = session_id.to_string();
            let row = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            &format!(
                                "SELECT session_id, messages, summary, evaluation, created_at, ended_at
                                 FROM {table} WHERE session_id = ?1"
                            ),
                            rusqlite::params![session],
                            read_row,
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            row.map(decode_row).transpose()
        })
    }

    fn list_recent(
        &self,
        limit: usize,
    ) -> StoreFuture<'_, PersistenceResult<Vec<ConversationRecord>>> {
        Box::pin(async move {
            let table = self.table.clone();
            let limit = i64::try_from(limit)
                .map_err(|_| PersistenceError::InvalidRecord("limit exceeds i64".to_string()))?;
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT session_id, messages, summary, evaluation, created_at, ended_at
                         FROM {table}
                         ORDER BY created_at DESC
                         LIMIT ?1"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![limit], read_row)?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter().map(decode_row).collect()
        })
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_row(row: RawRow) -> PersistenceResult<ConversationRecord> {
    let (session_id, messages, summary, evaluation, created_at, ended_at) = row;
    let session_id = session_id
        .parse()
        .map_err(|err| PersistenceError::InvalidRecord(format!("invalid session id: {err}")))?;
    let evaluation = match evaluation {
        Some(payload) => Some(serde_json::from_str(&payload)?),
        None => None,
    };

    Ok(ConversationRecord {
        session_id,
        turns: serde_json::from_str(&messages)?,
        summary,
        evaluation,
        created_at: from_millis(created_at)?,
        ended_at: ended_at.map(from_millis).transpose()?,
    })
}

fn from_millis(ms: i64) -> PersistenceResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| PersistenceError::InvalidRecord("invalid timestamp".to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::conversation::core::evaluation::Evaluation;
    use crate::conversation::core::turn::Turn;

    fn record(created_at: DateTime<Utc>) -> ConversationRecord {
        ConversationRecord {
            session_id: SessionId::new(),
            turns: vec![Turn::user("Hi, I'm Alex"), Turn::agent("Welcome, Alex")],
            summary: None,
            evaluation: None,
            created_at,
            ended_at: None,
        }
    }

    fn millis(ts: DateTime<Utc>) -> DateTime<Utc> {
        from_millis(ts.timestamp_millis()).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let store = SqliteConversationStore::open_in_memory("conversations").await.unwrap();
        let mut rec = record(millis(Utc::now()));
        rec.summary = Some("Alex works in logistics.".to_string());
        rec.evaluation = Some(Evaluation::parse(r#"{"co_founder_potential":7}"#).unwrap());
        rec.ended_at = Some(rec.created_at);

        store.upsert(rec.clone()).await.unwrap();
        let loaded = store.get(rec.session_id).await.unwrap().unwrap();

        assert_eq!(loaded.session_id, rec.session_id);
        assert_eq!(loaded.turns, rec.turns);
        assert_eq!(loaded.summary, rec.summary);
        assert_eq!(loaded.evaluation, rec.evaluation);
        assert_eq!(loaded.created_at, rec.created_at);
        assert_eq!(loaded.ended_at, rec.ended_at);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_session() {
        let store = SqliteConversationStore::open_in_memory("conversations").await.unwrap();
        let mut rec = record(millis(Utc::now()));
        store.upsert(rec.clone()).await.unwrap();

        rec.summary = Some("second write".to_string());
        store.upsert(rec.clone()).await.unwrap();

        let all = store.list_recent(10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].summary.as_deref(), Some("second write"));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = SqliteConversationStore::open_in_memory("conversations").await.unwrap();
        assert!(store.get(SessionId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_recent_orders_and_limits() {
        let store = SqliteConversationStore::open_in_memory("conversations").await.unwrap();
        let now = millis(Utc::now());
        let older = record(now - Duration::hours(2));
        let middle = record(now - Duration::hours(1));
        let newest = record(now);
        for rec in [&middle, &newest, &older] {
            store.upsert(rec.clone()).await.unwrap();
        }

        let listed = store.list_recent(2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].session_id, newest.session_id);
        assert_eq!(listed[1].session_id, middle.session_id);
    }
}
