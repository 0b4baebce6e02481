//! SQLite implementation of the history store.

use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::message::StoredMessage;
use crate::store::HistoryStore;
use crate::types::HistoryResult;

/// History store backed by a SQLite database.
///
/// The relay is the only writer in a single-node deployment; across nodes
/// the database serializes appends on its own.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<StoredMessage, sqlx::Error> {
        let recipient: String = row.try_get("recipient")?;

        Ok(StoredMessage {
            id: row.try_get("id")?,
            room: row.try_get("room")?,
            sender: row.try_get("sender")?,
            recipient: (!recipient.is_empty()).then_some(recipient),
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, message: &StoredMessage) -> HistoryResult<()> {
        sqlx::query(
            "INSERT INTO messages (id, room, sender, recipient, content, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.room)
        .bind(&message.sender)
        .bind(message.recipient.as_deref().unwrap_or(""))
        .bind(&message.content)
        .bind(&message.created_at)
        .execute(&self.pool)
        .await?;

        debug!(id = %message.id, room = %message.room, "message appended to history");
        Ok(())
    }

    async fn recent(&self, room: &str, limit: u32) -> HistoryResult<Vec<StoredMessage>> {
        // Take the newest `limit` rows, then flip back to ascending order.
        let rows = sqlx::query(
            "SELECT id, room, sender, recipient, content, created_at FROM (
                 SELECT rowid AS seq, * FROM messages
                 WHERE room = ?
                 ORDER BY created_at DESC, seq DESC
                 LIMIT ?
             ) ORDER BY created_at ASC, seq ASC",
        )
        .bind(room)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Self::row_to_message(row).map_err(Into::into))
            .collect()
    }

    async fn between(&self, a: &str, b: &str) -> HistoryResult<Vec<StoredMessage>> {
        let rows = sqlx::query(
            "SELECT id, room, sender, recipient, content, created_at FROM messages
             WHERE (sender = ? AND recipient = ?) OR (sender = ? AND recipient = ?)
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Self::row_to_message(row).map_err(Into::into))
            .collect()
    }
}
