//! Record Stores and the Source Adapter
//!
//! The raw message stores are external collaborators reached through the
//! async traits in this module; the engine only ever sees the normalized
//! [`MessageRecord`]s produced by [`fetch_short_messages`] and
//! [`fetch_multimedia_messages`].
//!
//! Unit quirk worth knowing: the short-message store keeps dates in epoch
//! milliseconds, the multimedia store in epoch seconds. The adapter scales
//! multimedia rows by 1000 on the way out, and [`SyncWatermark::since_seconds`]
//! presents the filter bound in the multimedia store's native unit on the way
//! in. Comparing a millisecond bound against second-valued rows would
//! silently match nothing.
//!
//! Failure policy: a store query fault degrades to an empty sequence for that
//! store only, logged as a warning. Records already fetched from the other
//! store are unaffected.

pub mod memory;
pub mod sqlite;

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::address::NormalizedAddress;
use crate::error::Result;
use crate::record::{
    multimedia_message_id, short_message_id, Direction, MessageRecord, PLACEHOLDER_IMAGE,
    PLACEHOLDER_MULTIMEDIA, PLACEHOLDER_VIDEO,
};

/// Exclusive lower time bound for one sync session
///
/// Computed once per session from a caller cursor or a configured lookback.
/// Never persisted across sessions; every sync re-derives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWatermark {
    since_ms: i64,
}

impl SyncWatermark {
    /// Watermark from an explicit epoch-millisecond bound
    pub fn new(since_ms: i64) -> Self {
        Self { since_ms }
    }

    /// Watermark reaching `lookback` behind `now_ms`
    pub fn from_lookback(now_ms: i64, lookback: Duration) -> Self {
        Self {
            since_ms: now_ms - lookback.as_millis() as i64,
        }
    }

    /// The bound in epoch milliseconds (short-message store native unit)
    pub fn since_millis(&self) -> i64 {
        self.since_ms
    }

    /// The bound in epoch seconds (multimedia store native unit)
    pub fn since_seconds(&self) -> i64 {
        self.since_ms / 1000
    }
}

/// Raw row from the short-message store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortMessageRow {
    /// Store-local row id
    pub id: i64,
    /// Conversation/thread id
    pub thread_id: i64,
    /// Counterparty address as stored
    pub address: String,
    /// Message body, possibly empty
    pub body: String,
    /// Epoch milliseconds
    pub date: i64,
    /// Store box type (see `record::BOX_TYPE_*`)
    pub box_type: i32,
}

/// One typed part of a multimedia message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultimediaPart {
    /// MIME content type of the part
    pub content_type: String,
    /// Text payload for textual parts
    pub text: Option<String>,
}

impl MultimediaPart {
    /// A `text/plain` part
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            content_type: "text/plain".to_string(),
            text: Some(text.into()),
        }
    }

    /// A non-text part carrying only its content type
    pub fn media<S: Into<String>>(content_type: S) -> Self {
        Self {
            content_type: content_type.into(),
            text: None,
        }
    }
}

/// Raw row from the multimedia store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultimediaRow {
    /// Store-local row id
    pub id: i64,
    /// Conversation/thread id
    pub thread_id: i64,
    /// Epoch seconds (store native unit)
    pub date: i64,
    /// Store box type; 1 = received
    pub box_type: i32,
    /// Typed message parts in store order
    pub parts: Vec<MultimediaPart>,
    /// Associated addresses in store order (senders and recipients mixed)
    pub addresses: Vec<String>,
}

/// Raw row from the conversation table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRow {
    /// Conversation/thread id
    pub id: i64,
    /// Participant ids; resolved to addresses via the store lookup
    pub participant_ids: Vec<i64>,
    /// Total message count
    pub message_count: i64,
    /// Most recent message content
    pub snippet: String,
    /// Epoch milliseconds of the most recent activity
    pub date: i64,
    /// Whether the conversation is fully read
    pub read: bool,
}

/// Short-message store collaborator
#[async_trait]
pub trait ShortMessageStore: Send + Sync + std::fmt::Debug {
    /// Rows strictly newer than the watermark, newest first
    async fn query_since(&self, watermark: SyncWatermark) -> Result<Vec<ShortMessageRow>>;
}

/// Multimedia store collaborator
///
/// Implementations filter with [`SyncWatermark::since_seconds`]; the store's
/// date column is seconds-valued.
#[async_trait]
pub trait MultimediaStore: Send + Sync + std::fmt::Debug {
    /// Rows strictly newer than the watermark, newest first
    async fn query_since(&self, watermark: SyncWatermark) -> Result<Vec<MultimediaRow>>;
}

/// Conversation table collaborator
#[async_trait]
pub trait ConversationStore: Send + Sync + std::fmt::Debug {
    /// Conversations with activity strictly newer than the watermark, newest
    /// first
    async fn conversations_since(&self, watermark: SyncWatermark) -> Result<Vec<ConversationRow>>;

    /// Resolve a participant id to its canonical address
    ///
    /// `Ok(None)` means the id has no mapping; `Err` is a store fault.
    async fn recipient_address(&self, participant_id: i64) -> Result<Option<String>>;
}

/// Fetch and normalize short messages newer than the watermark
///
/// A store fault degrades to an empty sequence; it never aborts the session.
pub async fn fetch_short_messages(
    store: &dyn ShortMessageStore,
    watermark: SyncWatermark,
) -> Vec<MessageRecord> {
    match store.query_since(watermark).await {
        Ok(rows) => rows.into_iter().map(short_record).collect(),
        Err(e) => {
            warn!("Short-message store query failed, degrading to empty: {}", e);
            Vec::new()
        }
    }
}

/// Fetch and normalize multimedia messages newer than the watermark
///
/// A store fault degrades to an empty sequence; it never aborts the session.
pub async fn fetch_multimedia_messages(
    store: &dyn MultimediaStore,
    watermark: SyncWatermark,
) -> Vec<MessageRecord> {
    match store.query_since(watermark).await {
        Ok(rows) => rows.into_iter().map(multimedia_record).collect(),
        Err(e) => {
            warn!("Multimedia store query failed, degrading to empty: {}", e);
            Vec::new()
        }
    }
}

fn short_record(row: ShortMessageRow) -> MessageRecord {
    MessageRecord {
        message_id: short_message_id(row.id),
        conversation_id: row.thread_id,
        timestamp: row.date,
        direction: Direction::from_box_type(row.box_type),
        content: content_or_placeholder(row.body),
        address: NormalizedAddress::new(&row.address),
        identity: None,
    }
}

fn multimedia_record(row: MultimediaRow) -> MessageRecord {
    MessageRecord {
        message_id: multimedia_message_id(row.id),
        conversation_id: row.thread_id,
        // Seconds-native store; everything downstream speaks milliseconds.
        timestamp: row.date * 1000,
        direction: Direction::from_multimedia_box_type(row.box_type),
        content: assemble_multimedia_content(&row.parts),
        address: NormalizedAddress::new(&select_sender_address(&row.addresses)),
        identity: None,
    }
}

fn content_or_placeholder(body: String) -> String {
    if body.is_empty() {
        PLACEHOLDER_MULTIMEDIA.to_string()
    } else {
        body
    }
}

/// Render multimedia parts into a single non-empty body
fn assemble_multimedia_content(parts: &[MultimediaPart]) -> String {
    let mut body = String::new();
    for part in parts {
        if part.content_type == "text/plain" {
            if let Some(text) = &part.text {
                body.push_str(text);
            }
        } else if part.content_type.starts_with("image/") {
            body.push_str(PLACEHOLDER_IMAGE);
        } else if part.content_type.starts_with("video/") {
            body.push_str(PLACEHOLDER_VIDEO);
        }
        // Other part types (audio, smil layout, vcards) contribute nothing.
    }

    content_or_placeholder(body)
}

/// Pick the sender address from a multimedia row's address list
///
/// Backward scan from the last entry: a numeric-looking address (digits after
/// dash removal) always replaces the running choice, a non-numeric one only
/// fills an empty choice. Net effect: the earliest numeric address wins, and
/// the last address is the fallback when none is numeric.
fn select_sender_address(addresses: &[String]) -> String {
    let mut chosen: Option<&String> = None;
    for address in addresses.iter().rev() {
        let digits = address.replace('-', "");
        if digits.parse::<i64>().is_ok() {
            chosen = Some(address);
        } else if chosen.is_none() {
            chosen = Some(address);
        }
    }
    chosen.cloned().unwrap_or_default()
}
