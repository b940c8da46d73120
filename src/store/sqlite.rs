//! SQLite Message Database
//!
//! A single-file database holding short messages, multimedia messages with
//! their parts and addresses, and the conversation table. Implements all
//! three store traits so one handle can back a whole sync session.
//!
//! Timestamps follow the provider conventions the sync engine expects:
//! `short_messages.date` and `conversations.date` are in milliseconds,
//! `multimedia_messages.date` is in seconds.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::store::{
    ConversationRow, ConversationStore, MultimediaPart, MultimediaRow, MultimediaStore,
    ShortMessageRow, ShortMessageStore, SyncWatermark,
};

/// SQLite-backed message database
#[derive(Debug)]
pub struct SqliteMessageStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMessageStore {
    /// Open (or create) the database at `db_path`
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        debug!(path = %db_path.display(), "opened message database");
        Ok(store)
    }

    /// Open a transient in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SyncError::Database(format!("lock error: {e}")))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS short_messages (
                id INTEGER PRIMARY KEY,
                thread_id INTEGER NOT NULL,
                address TEXT NOT NULL,
                body TEXT NOT NULL,
                date INTEGER NOT NULL,
                box_type INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_short_messages_date
                ON short_messages(date DESC);

            CREATE TABLE IF NOT EXISTS multimedia_messages (
                id INTEGER PRIMARY KEY,
                thread_id INTEGER NOT NULL,
                date INTEGER NOT NULL,
                box_type INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_multimedia_messages_date
                ON multimedia_messages(date DESC);

            CREATE TABLE IF NOT EXISTS multimedia_parts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                content_type TEXT NOT NULL,
                text TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_multimedia_parts_message
                ON multimedia_parts(message_id);

            CREATE TABLE IF NOT EXISTS multimedia_addresses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                address TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_multimedia_addresses_message
                ON multimedia_addresses(message_id);

            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY,
                participant_ids TEXT NOT NULL,
                message_count INTEGER NOT NULL,
                snippet TEXT NOT NULL,
                date INTEGER NOT NULL,
                read INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_conversations_date
                ON conversations(date DESC);

            CREATE TABLE IF NOT EXISTS recipients (
                id INTEGER PRIMARY KEY,
                address TEXT NOT NULL
            );",
        )?;

        Ok(())
    }

    /// Insert a short message
    pub fn insert_short_message(&self, row: &ShortMessageRow) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SyncError::Database(format!("lock error: {e}")))?;

        conn.execute(
            "INSERT OR REPLACE INTO short_messages (id, thread_id, address, body, date, box_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.id,
                row.thread_id,
                row.address,
                row.body,
                row.date,
                row.box_type
            ],
        )?;

        Ok(())
    }

    /// Insert a multimedia message along with its parts and addresses
    pub fn insert_multimedia(&self, row: &MultimediaRow) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SyncError::Database(format!("lock error: {e}")))?;

        conn.execute(
            "INSERT OR REPLACE INTO multimedia_messages (id, thread_id, date, box_type)
             VALUES (?1, ?2, ?3, ?4)",
            params![row.id, row.thread_id, row.date, row.box_type],
        )?;
        conn.execute(
            "DELETE FROM multimedia_parts WHERE message_id = ?1",
            params![row.id],
        )?;
        conn.execute(
            "DELETE FROM multimedia_addresses WHERE message_id = ?1",
            params![row.id],
        )?;

        for (seq, part) in row.parts.iter().enumerate() {
            conn.execute(
                "INSERT INTO multimedia_parts (message_id, seq, content_type, text)
                 VALUES (?1, ?2, ?3, ?4)",
                params![row.id, seq as i64, part.content_type, part.text],
            )?;
        }
        for (seq, address) in row.addresses.iter().enumerate() {
            conn.execute(
                "INSERT INTO multimedia_addresses (message_id, seq, address)
                 VALUES (?1, ?2, ?3)",
                params![row.id, seq as i64, address],
            )?;
        }

        Ok(())
    }

    /// Insert a conversation row
    pub fn insert_conversation(&self, row: &ConversationRow) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SyncError::Database(format!("lock error: {e}")))?;

        let participant_ids = row
            .participant_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(" ");

        conn.execute(
            "INSERT OR REPLACE INTO conversations
                (id, participant_ids, message_count, snippet, date, read)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.id,
                participant_ids,
                row.message_count,
                row.snippet,
                row.date,
                row.read as i32
            ],
        )?;

        Ok(())
    }

    /// Map a participant id to its canonical address
    pub fn insert_recipient(&self, participant_id: i64, address: &str) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SyncError::Database(format!("lock error: {e}")))?;

        conn.execute(
            "INSERT OR REPLACE INTO recipients (id, address) VALUES (?1, ?2)",
            params![participant_id, address],
        )?;

        Ok(())
    }
}

#[async_trait]
impl ShortMessageStore for SqliteMessageStore {
    async fn query_since(&self, watermark: SyncWatermark) -> Result<Vec<ShortMessageRow>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SyncError::Database(format!("lock error: {e}")))?;

        let mut stmt = conn.prepare(
            "SELECT id, thread_id, address, body, date, box_type
             FROM short_messages
             WHERE date > ?1
             ORDER BY date DESC",
        )?;
        let rows = stmt
            .query_map(params![watermark.since_millis()], row_to_short_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }
}

#[async_trait]
impl MultimediaStore for SqliteMessageStore {
    async fn query_since(&self, watermark: SyncWatermark) -> Result<Vec<MultimediaRow>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SyncError::Database(format!("lock error: {e}")))?;

        let mut stmt = conn.prepare(
            "SELECT id, thread_id, date, box_type
             FROM multimedia_messages
             WHERE date > ?1
             ORDER BY date DESC",
        )?;
        let heads = stmt
            .query_map(params![watermark.since_seconds()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i32>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut part_stmt = conn.prepare(
            "SELECT content_type, text FROM multimedia_parts
             WHERE message_id = ?1 ORDER BY seq",
        )?;
        let mut addr_stmt = conn.prepare(
            "SELECT address FROM multimedia_addresses
             WHERE message_id = ?1 ORDER BY seq",
        )?;

        let mut rows = Vec::with_capacity(heads.len());
        for (id, thread_id, date, box_type) in heads {
            let parts = part_stmt
                .query_map(params![id], |row| {
                    Ok(MultimediaPart {
                        content_type: row.get(0)?,
                        text: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let addresses = addr_stmt
                .query_map(params![id], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.push(MultimediaRow {
                id,
                thread_id,
                date,
                box_type,
                parts,
                addresses,
            });
        }

        Ok(rows)
    }
}

#[async_trait]
impl ConversationStore for SqliteMessageStore {
    async fn conversations_since(&self, watermark: SyncWatermark) -> Result<Vec<ConversationRow>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SyncError::Database(format!("lock error: {e}")))?;

        let mut stmt = conn.prepare(
            "SELECT id, participant_ids, message_count, snippet, date, read
             FROM conversations
             WHERE date > ?1
             ORDER BY date DESC",
        )?;
        let rows = stmt
            .query_map(params![watermark.since_millis()], row_to_conversation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    async fn recipient_address(&self, participant_id: i64) -> Result<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SyncError::Database(format!("lock error: {e}")))?;

        let address = conn
            .query_row(
                "SELECT address FROM recipients WHERE id = ?1",
                params![participant_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(address)
    }
}

/// Map a database row to a ShortMessageRow
fn row_to_short_message(row: &rusqlite::Row) -> rusqlite::Result<ShortMessageRow> {
    Ok(ShortMessageRow {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        address: row.get(2)?,
        body: row.get(3)?,
        date: row.get(4)?,
        box_type: row.get(5)?,
    })
}

/// Map a database row to a ConversationRow
fn row_to_conversation(row: &rusqlite::Row) -> rusqlite::Result<ConversationRow> {
    let participant_ids: String = row.get(1)?;
    Ok(ConversationRow {
        id: row.get(0)?,
        participant_ids: participant_ids
            .split_whitespace()
            .filter_map(|id| id.parse::<i64>().ok())
            .collect(),
        message_count: row.get(2)?,
        snippet: row.get(3)?,
        date: row.get(4)?,
        read: row.get::<_, i32>(5)? != 0,
    })
}
