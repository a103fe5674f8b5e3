//! SQLite chat store implementation.
//!
//! Implements `ChatStore` from `chatloom-core` using sqlx with split
//! read/write pools: raw queries, a private Row struct, reads on the reader
//! pool and writes on the writer pool. State and params are stored as JSON
//! text so param lookups can use plain substring matching.

use chatloom_core::store::ChatStore;
use chatloom_types::chat::{ChatId, ChatKind, ChatRecord, SenderProfile};
use chatloom_types::error::StorageError;
use chatloom_types::state::{Params, State};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatStore`.
pub struct SqliteChatStore {
    pool: DatabasePool,
}

impl SqliteChatStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain ChatRecord.
struct ChatRow {
    id: i64,
    chat_id: i64,
    kind: String,
    abandoned: i64,
    user_id: i64,
    user_name: String,
    first_name: String,
    last_name: String,
    open_time: String,
    last_time: String,
    state: String,
    params: String,
}

impl ChatRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            kind: row.try_get("kind")?,
            abandoned: row.try_get("abandoned")?,
            user_id: row.try_get("user_id")?,
            user_name: row.try_get("user_name")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            open_time: row.try_get("open_time")?,
            last_time: row.try_get("last_time")?,
            state: row.try_get("state")?,
            params: row.try_get("params")?,
        })
    }

    fn into_record(self) -> Result<ChatRecord, StorageError> {
        let kind: ChatKind = self.kind.parse().map_err(StorageError::Query)?;
        let state: State = serde_json::from_str(&self.state)
            .map_err(|e| StorageError::Query(format!("invalid state json: {e}")))?;
        let params: Params = serde_json::from_str(&self.params)
            .map_err(|e| StorageError::Query(format!("invalid params json: {e}")))?;

        Ok(ChatRecord {
            primary_id: Some(self.id),
            chat_id: ChatId(self.chat_id),
            kind,
            abandoned: self.abandoned != 0,
            profile: SenderProfile {
                user_id: self.user_id,
                user_name: self.user_name,
                first_name: self.first_name,
                last_name: self.last_name,
            },
            open_time: parse_datetime(&self.open_time)?,
            last_time: parse_datetime(&self.last_time)?,
            state,
            params,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn state_json(record: &ChatRecord) -> Result<String, StorageError> {
    serde_json::to_string(&record.state)
        .map_err(|e| StorageError::Query(format!("state serialization: {e}")))
}

fn params_json(record: &ChatRecord) -> Result<String, StorageError> {
    serde_json::to_string(&record.params)
        .map_err(|e| StorageError::Query(format!("params serialization: {e}")))
}

fn query_err(e: sqlx::Error) -> StorageError {
    StorageError::Query(e.to_string())
}

impl ChatStore for SqliteChatStore {
    async fn init(&self) -> Result<Vec<ChatId>, StorageError> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT chat_id FROM chats ORDER BY id")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;
        Ok(rows.into_iter().map(|(id,)| ChatId(id)).collect())
    }

    async fn exists(&self, record: &ChatRecord) -> Result<bool, StorageError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM chats WHERE chat_id = ?")
            .bind(record.chat_id.0)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        Ok(row.is_some())
    }

    async fn insert(&self, record: &mut ChatRecord) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"INSERT INTO chats (chat_id, kind, abandoned, user_id, user_name, first_name, last_name, open_time, last_time, state, params)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.chat_id.0)
        .bind(record.kind.to_string())
        .bind(record.abandoned as i64)
        .bind(record.profile.user_id)
        .bind(&record.profile.user_name)
        .bind(&record.profile.first_name)
        .bind(&record.profile.last_name)
        .bind(format_datetime(&record.open_time))
        .bind(format_datetime(&record.last_time))
        .bind(state_json(record)?)
        .bind(params_json(record)?)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StorageError::Conflict(format!("chat {} already stored", record.chat_id))
            }
            other => query_err(other),
        })?;

        record.primary_id = Some(result.last_insert_rowid());
        Ok(())
    }

    async fn update(&self, record: &ChatRecord) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"UPDATE chats
               SET kind = ?, abandoned = ?, user_id = ?, user_name = ?, first_name = ?,
                   last_name = ?, open_time = ?, last_time = ?, state = ?, params = ?
               WHERE chat_id = ?"#,
        )
        .bind(record.kind.to_string())
        .bind(record.abandoned as i64)
        .bind(record.profile.user_id)
        .bind(&record.profile.user_name)
        .bind(&record.profile.first_name)
        .bind(&record.profile.last_name)
        .bind(format_datetime(&record.open_time))
        .bind(format_datetime(&record.last_time))
        .bind(state_json(record)?)
        .bind(params_json(record)?)
        .bind(record.chat_id.0)
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn save(&self, record: &mut ChatRecord) -> Result<(), StorageError> {
        sqlx::query(
            r#"INSERT INTO chats (chat_id, kind, abandoned, user_id, user_name, first_name, last_name, open_time, last_time, state, params)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(chat_id) DO UPDATE SET
                   kind = excluded.kind,
                   abandoned = excluded.abandoned,
                   user_id = excluded.user_id,
                   user_name = excluded.user_name,
                   first_name = excluded.first_name,
                   last_name = excluded.last_name,
                   open_time = excluded.open_time,
                   last_time = excluded.last_time,
                   state = excluded.state,
                   params = excluded.params"#,
        )
        .bind(record.chat_id.0)
        .bind(record.kind.to_string())
        .bind(record.abandoned as i64)
        .bind(record.profile.user_id)
        .bind(&record.profile.user_name)
        .bind(&record.profile.first_name)
        .bind(&record.profile.last_name)
        .bind(format_datetime(&record.open_time))
        .bind(format_datetime(&record.last_time))
        .bind(state_json(record)?)
        .bind(params_json(record)?)
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if record.primary_id.is_none() {
            let (id,): (i64,) = sqlx::query_as("SELECT id FROM chats WHERE chat_id = ?")
                .bind(record.chat_id.0)
                .fetch_one(&self.pool.reader)
                .await
                .map_err(query_err)?;
            record.primary_id = Some(id);
        }
        Ok(())
    }

    async fn delete(&self, record: &ChatRecord) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM chats WHERE chat_id = ?")
            .bind(record.chat_id.0)
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn chat_by_primary_id(&self, primary_id: i64) -> Result<Option<ChatRecord>, StorageError> {
        let row = sqlx::query("SELECT * FROM chats WHERE id = ?")
            .bind(primary_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let chat_row = ChatRow::from_row(&row).map_err(query_err)?;
                Ok(Some(chat_row.into_record()?))
            }
            None => Ok(None),
        }
    }

    async fn chat_by_chat_id(&self, chat_id: ChatId) -> Result<Option<ChatRecord>, StorageError> {
        let row = sqlx::query("SELECT * FROM chats WHERE chat_id = ?")
            .bind(chat_id.0)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let chat_row = ChatRow::from_row(&row).map_err(query_err)?;
                Ok(Some(chat_row.into_record()?))
            }
            None => Ok(None),
        }
    }

    async fn chats_by_param(&self, fragment: &str) -> Result<Vec<ChatRecord>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM chats WHERE params LIKE '%' || ? || '%' ORDER BY id",
        )
        .bind(fragment)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let chat_row = ChatRow::from_row(row).map_err(query_err)?;
            records.push(chat_row.into_record()?);
        }
        Ok(records)
    }
}
